use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::info;

use vcfdb_core::{HeaderSummary, Result, VariantRecord, VcfdbError};

use crate::header::HeaderBuilder;
use crate::record::VcfRecords;

/// Forward-only stream of the records of one file.
pub type RecordStream = Box<dyn Iterator<Item = Result<VariantRecord>> + Send>;

///
/// An opened variant file.
///
pub struct DecodedSource {
    pub header: HeaderSummary,
    /// Sample names in file column order.
    pub samples: Vec<String>,
    pub records: RecordStream,
}

impl std::fmt::Debug for DecodedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedSource")
            .field("header", &self.header)
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}

///
/// Opens variant files. The header is read eagerly; records are decoded
/// lazily as the stream is consumed.
///
pub trait VariantDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<DecodedSource>;
}

///
/// Decoder for VCF text, plain or gzip/bgzf compressed (by `.gz` / `.bgz`
/// extension).
///
#[derive(Debug, Clone)]
pub struct VcfTextDecoder {
    buffer_capacity: usize,
}

impl Default for VcfTextDecoder {
    fn default() -> Self {
        VcfTextDecoder {
            buffer_capacity: 256 * 1024,
        }
    }
}

impl VcfTextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_capacity(buffer_capacity: usize) -> Self {
        VcfTextDecoder { buffer_capacity }
    }

    fn reader(&self, path: &Path) -> Result<Box<dyn BufRead + Send>> {
        let file = File::open(path).map_err(|e| {
            VcfdbError::Decode(format!("failed to open {}: {}", path.display(), e))
        })?;
        let compressed = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("gz") | Some("bgz")
        );
        if compressed {
            Ok(Box::new(BufReader::with_capacity(
                self.buffer_capacity,
                MultiGzDecoder::new(file),
            )))
        } else {
            Ok(Box::new(BufReader::with_capacity(self.buffer_capacity, file)))
        }
    }
}

impl VariantDecoder for VcfTextDecoder {
    fn open(&self, path: &Path) -> Result<DecodedSource> {
        let source = path.display().to_string();
        let mut reader = self.reader(path)?;
        let mut builder = HeaderBuilder::new();
        let mut line = String::new();
        let mut line_no = 0;

        let parsed = loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| VcfdbError::Decode(format!("{}: {}", source, e)))?;
            if read == 0 {
                return Err(VcfdbError::Decode(format!(
                    "{}: missing #CHROM header line",
                    source
                )));
            }
            line_no += 1;

            let trimmed = line.trim_end_matches(['\n', '\r']);
            let outcome = if let Some(meta) = trimmed.strip_prefix("##") {
                builder.push_meta_line(meta).map(|_| None)
            } else if trimmed.starts_with("#CHROM") {
                std::mem::take(&mut builder).finish(trimmed).map(Some)
            } else {
                Err(format!("unexpected line before #CHROM: `{}`", trimmed))
            };

            match outcome {
                Ok(Some(parsed)) => break parsed,
                Ok(None) => {}
                Err(msg) => {
                    return Err(VcfdbError::Decode(format!(
                        "{} line {}: {}",
                        source, line_no, msg
                    )));
                }
            }
        };

        info!(
            "Opened {} ({} samples, {} INFO fields)",
            source,
            parsed.samples.len(),
            parsed.summary.infos.len()
        );

        let records = VcfRecords::new(reader, source, parsed.types, line_no);
        Ok(DecodedSource {
            header: parsed.summary,
            samples: parsed.samples,
            records: Box::new(records),
        })
    }
}
