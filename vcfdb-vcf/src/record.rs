use std::io::BufRead;

use log::debug;

use vcfdb_core::{FieldValue, InfoMap, Result, SampleCall, VariantRecord, VcfdbError};

use crate::header::{FieldType, FieldTypes};

const MISSING: &str = ".";

///
/// Lazy iterator over the data lines of one VCF file.
///
/// Stops after the first error: a malformed line leaves the reader at an
/// unknown position in the file.
///
pub struct VcfRecords {
    reader: Box<dyn BufRead + Send>,
    source: String,
    types: FieldTypes,
    line_no: usize,
    buf: String,
    done: bool,
}

impl VcfRecords {
    ///
    /// # Arguments
    ///
    /// - reader: positioned right after the `#CHROM` line
    /// - source: file name used in error messages
    /// - types: declared field types of this file
    /// - line_no: number of lines already consumed by the header
    ///
    pub fn new(
        reader: Box<dyn BufRead + Send>,
        source: impl Into<String>,
        types: FieldTypes,
        line_no: usize,
    ) -> Self {
        VcfRecords {
            reader,
            source: source.into(),
            types,
            line_no,
            buf: String::new(),
            done: false,
        }
    }

    fn decode_error(&self, msg: impl std::fmt::Display) -> VcfdbError {
        VcfdbError::Decode(format!("{} line {}: {}", self.source, self.line_no, msg))
    }
}

impl Iterator for VcfRecords {
    type Item = Result<VariantRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    debug!("Finished {} after {} lines", self.source, self.line_no);
                    self.done = true;
                }
                Ok(_) => {
                    self.line_no += 1;
                    let line = self.buf.trim_end_matches(['\n', '\r']);
                    if line.is_empty() {
                        continue;
                    }
                    let parsed = parse_data_line(line, &self.types);
                    return Some(parsed.map_err(|msg| {
                        self.done = true;
                        self.decode_error(msg)
                    }));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(self.decode_error(e)));
                }
            }
        }
        None
    }
}

///
/// Parse one tab-separated data line.
///
pub fn parse_data_line(line: &str, types: &FieldTypes) -> std::result::Result<VariantRecord, String> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < 8 {
        return Err(format!("expected at least 8 columns, found {}", columns.len()));
    }

    let chrom = columns[0];
    if chrom.is_empty() {
        return Err("empty CHROM".to_string());
    }
    let pos = match columns[1].parse::<u64>() {
        Ok(pos) if pos > 0 => pos,
        _ => return Err(format!("POS `{}` is not a positive integer", columns[1])),
    };

    let mut record = VariantRecord::new(chrom, pos, columns[3]);
    record.id = (columns[2] != MISSING).then(|| columns[2].to_string());

    let mut alleles = vec![columns[3]];
    if columns[4] != MISSING {
        alleles.extend(columns[4].split(','));
    }

    record.quality = match columns[5] {
        MISSING => None,
        q => Some(q.parse::<f64>().map_err(|_| format!("invalid QUAL `{}`", q))?),
    };

    if columns[6] != MISSING {
        record.filters = columns[6].split(';').map(str::to_string).collect();
    }

    record.info = parse_info(columns[7], types);

    if columns.len() > 9 {
        let keys: Vec<&str> = columns[8].split(':').collect();
        record.samples = columns[9..]
            .iter()
            .map(|column| parse_sample(&keys, column, &alleles, types))
            .collect::<std::result::Result<_, _>>()?;
    }

    Ok(record)
}

fn parse_info(column: &str, types: &FieldTypes) -> InfoMap {
    let mut info = InfoMap::new();
    if column == MISSING {
        return info;
    }
    for entry in column.split(';').filter(|e| !e.is_empty()) {
        let declared = |key: &str| types.info.get(key).copied();
        match entry.split_once('=') {
            Some((key, raw)) => {
                info.insert(key.to_string(), parse_value(raw, declared(key)));
            }
            None => {
                let value = match declared(entry) {
                    None | Some(FieldType::Flag) => FieldValue::Flag,
                    Some(_) => FieldValue::Missing,
                };
                info.insert(entry.to_string(), value);
            }
        }
    }
    info
}

fn parse_sample(
    keys: &[&str],
    column: &str,
    alleles: &[&str],
    types: &FieldTypes,
) -> std::result::Result<SampleCall, String> {
    let mut call = SampleCall::default();
    // trailing fields may be dropped
    for (key, raw) in keys.iter().zip(column.split(':')) {
        match *key {
            "GT" => call.genotype = decode_genotype(raw, alleles)?,
            "AD" => call.allele_depths = parse_int_list(key, raw)?,
            "PL" => call.likelihoods = parse_int_list(key, raw)?,
            "DP" => call.depth = parse_int(key, raw)?,
            "GQ" => call.genotype_quality = parse_int(key, raw)?,
            _ => {
                call.extra.insert(
                    key.to_string(),
                    parse_value(raw, types.format.get(*key).copied()),
                );
            }
        }
    }
    Ok(call)
}

///
/// Turn allele indices (`0/1`, `1|2`, `./.`) into allele strings.
///
fn decode_genotype(raw: &str, alleles: &[&str]) -> std::result::Result<Vec<String>, String> {
    raw.split(['/', '|'])
        .map(|index| {
            if index == MISSING {
                return Ok(MISSING.to_string());
            }
            index
                .parse::<usize>()
                .ok()
                .and_then(|i| alleles.get(i))
                .map(|allele| allele.to_string())
                .ok_or_else(|| format!("invalid GT `{}`", raw))
        })
        .collect()
}

fn parse_int(key: &str, raw: &str) -> std::result::Result<Option<i64>, String> {
    if raw == MISSING {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| format!("invalid {} `{}`", key, raw))
}

fn parse_int_list(key: &str, raw: &str) -> std::result::Result<Option<Vec<i64>>, String> {
    if raw == MISSING {
        return Ok(None);
    }
    raw.split(',')
        .map(|v| v.parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(Some)
        .map_err(|_| format!("invalid {} `{}`", key, raw))
}

///
/// Type one INFO or FORMAT value. Comma lists become arrays; values that do
/// not fit their declared type are kept as [`FieldValue::Unrecognized`].
///
pub fn parse_value(raw: &str, declared: Option<FieldType>) -> FieldValue {
    if raw.contains(',') {
        FieldValue::Array(raw.split(',').map(|v| parse_scalar(v, declared)).collect())
    } else {
        parse_scalar(raw, declared)
    }
}

fn parse_scalar(raw: &str, declared: Option<FieldType>) -> FieldValue {
    if raw == MISSING {
        return FieldValue::Missing;
    }
    match declared {
        Some(FieldType::Integer) => raw
            .parse::<i64>()
            .map(FieldValue::Integer)
            .unwrap_or_else(|_| FieldValue::Unrecognized(raw.to_string())),
        Some(FieldType::Float) => raw
            .parse::<f64>()
            .map(FieldValue::Float)
            .unwrap_or_else(|_| FieldValue::Unrecognized(raw.to_string())),
        Some(FieldType::Flag) => FieldValue::Unrecognized(raw.to_string()),
        Some(FieldType::Character) | Some(FieldType::String) | None => {
            FieldValue::Text(raw.to_string())
        }
    }
}
