use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};

use vcfdb_core::{Result, SourceFile, VcfdbError};
use vcfdb_ledger::{CollectionState, Ledger, ensure_store};
use vcfdb_store::DocumentStore;
use vcfdb_vcf::{RecordStream, VariantDecoder};

use crate::config::ImportConfig;
use crate::pipeline::{LoadMode, Pipeline, PipelineReport};

///
/// Result of [`import_files`]. When `completed` is false the collection was
/// left inconsistent and needs a repair.
///
#[derive(Debug)]
pub struct ImportOutcome {
    pub collection: String,
    pub mode: LoadMode,
    pub report: PipelineReport,
    pub completed: bool,
}

/// The identifier a file is registered under: its base name.
pub fn file_id(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| VcfdbError::Config(format!("{} is not a file path", path.display())))
}

///
/// Import `paths` into `collection`.
///
/// Every file is opened and every name checked before the first worker
/// starts. With `append` a new collection is imported directly; without it an
/// existing collection is refused.
///
pub fn import_files(
    store: Arc<dyn DocumentStore>,
    collection: &str,
    paths: &[PathBuf],
    append: bool,
    decoder: &dyn VariantDecoder,
    config: &ImportConfig,
) -> Result<ImportOutcome> {
    config.validate()?;
    ensure_store(store.as_ref())?;
    let ledger = Ledger::new(Arc::clone(&store));

    let state = ledger.collection_state(collection)?;
    let append = match (append, state) {
        (true, CollectionState::New) => {
            info!("Collection `{}` does not exist, importing directly", collection);
            false
        }
        (false, CollectionState::Consistent) => {
            return Err(VcfdbError::LedgerState(format!(
                "collection `{}` already exists, use append mode to add files to it",
                collection
            )));
        }
        (append, _) => append,
    };

    let mut files = Vec::with_capacity(paths.len());
    let mut streams: Vec<RecordStream> = Vec::with_capacity(paths.len());
    for path in paths {
        let source = decoder.open(path)?;
        files.push(SourceFile::new(file_id(path)?, source.header, source.samples));
        streams.push(source.records);
    }

    let prior = if append {
        ledger.begin_append(collection, &files)?
    } else {
        ledger.begin_import(collection, &files)?
    };
    let mode = if append {
        LoadMode::Append {
            old_files: prior.files,
            old_samples: prior.samples,
        }
    } else {
        LoadMode::Direct
    };

    let sample_counts = files.iter().map(SourceFile::sample_count).collect();
    let pipeline = Pipeline::new(Arc::clone(&store), collection, mode, config.clone());
    let report = pipeline.run(streams, sample_counts)?;

    let completed = report.success();
    if completed {
        ledger.complete_import(collection, prior)?;
        info!(
            "Imported {} files into `{}` ({} documents, {} dropped)",
            files.len(),
            collection,
            report.imported,
            report.dropped.len()
        );
    } else {
        for failure in &report.errors {
            error!("{} stage: {}", failure.stage, failure.error);
        }
        warn!(
            "Import into `{}` did not complete; the collection needs a repair",
            collection
        );
    }

    Ok(ImportOutcome {
        collection: collection.to_string(),
        mode,
        report,
        completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("data/calls.vcf.gz", "calls.vcf.gz")]
    #[case("calls.vcf", "calls.vcf")]
    fn test_file_id_is_the_base_name(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(file_id(Path::new(path)).unwrap(), expected);
    }

    #[rstest]
    fn test_file_id_needs_a_name() {
        assert!(file_id(Path::new("/")).is_err());
    }
}
