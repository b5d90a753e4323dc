use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::info;
use serde_json::Value;

use vcfdb_core::consts::{FIELD_IDS, FIELD_SAMPLES, METADATA_CONTAINER, PER_FILE_FIELDS, RESERVED_SEPARATOR};
use vcfdb_core::{Result, SourceFile, VcfdbError};
use vcfdb_store::{DocumentStore, Filter, Update};

use crate::metadata::{CollectionMetadata, InconsistencyReason};
use crate::state::{self, CollectionState};

///
/// File and sample counts of a collection before an import started. Zero
/// for a first import.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriorCounts {
    pub files: usize,
    pub samples: usize,
}

///
/// The consistency ledger: records in the metadata container which files
/// and samples every collection holds and whether its documents match.
///
#[derive(Clone)]
pub struct Ledger {
    pub(crate) store: Arc<dyn DocumentStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Ledger { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn collection_state(&self, name: &str) -> Result<CollectionState> {
        state::collection_state(self.store.as_ref(), name)
    }

    pub(crate) fn load(&self, name: &str) -> Result<CollectionMetadata> {
        state::load_metadata(self.store.as_ref(), name)?.ok_or_else(|| {
            VcfdbError::LedgerState(format!("collection `{}` does not exist", name))
        })
    }

    pub(crate) fn save(&self, metadata: &CollectionMetadata) -> Result<()> {
        self.store
            .insert_or_replace(METADATA_CONTAINER, metadata.to_document()?)
    }

    ///
    /// Register the first import of `collection`. The metadata is written
    /// inconsistent and the container created empty.
    ///
    pub fn begin_import(&self, collection: &str, files: &[SourceFile]) -> Result<PriorCounts> {
        validate_collection_name(collection)?;
        require_files(files)?;
        let state = self.collection_state(collection)?;
        if state != CollectionState::New {
            return Err(VcfdbError::LedgerState(format!(
                "can't import into `{}`: collection is {}",
                collection, state
            )));
        }
        check_collisions(files, &[], &[])?;

        let metadata = CollectionMetadata::new_import(collection, files);
        self.store
            .insert(METADATA_CONTAINER, metadata.to_document()?)?;
        self.store.create_container(collection)?;

        info!(
            "Started import of {} files ({} samples) into `{}`",
            metadata.vcfs.len(),
            metadata.samples.len(),
            collection
        );
        Ok(PriorCounts::default())
    }

    ///
    /// Register an append of `files` to a consistent collection.
    ///
    pub fn begin_append(&self, collection: &str, files: &[SourceFile]) -> Result<PriorCounts> {
        require_files(files)?;
        let state = self.collection_state(collection)?;
        if state != CollectionState::Consistent {
            return Err(VcfdbError::LedgerState(format!(
                "can't append to `{}`: collection is {}",
                collection, state
            )));
        }

        let mut metadata = self.load(collection)?;
        let existing_samples: Vec<&str> = metadata.samples.iter().map(|s| s.name.as_str()).collect();
        let existing_files: Vec<&str> = metadata.vcfs.iter().map(String::as_str).collect();
        check_collisions(files, &existing_files, &existing_samples)?;

        let prior = PriorCounts {
            files: metadata.vcfs.len(),
            samples: metadata.samples.len(),
        };
        metadata.extend(files);
        metadata.consistent = false;
        metadata.last_inconsistency_reason =
            InconsistencyReason::Append(files.iter().map(|f| f.id.clone()).collect());
        metadata.last_edit = Utc::now();
        self.save(&metadata)?;

        info!(
            "Started append of {} files to `{}` ({} files, {} samples before)",
            files.len(),
            collection,
            prior.files,
            prior.samples
        );
        Ok(prior)
    }

    ///
    /// Finish the pending import of `collection`.
    ///
    /// After an append, documents the load did not touch still have the prior
    /// lengths; they get one `null` per new file and per new sample.
    ///
    pub fn complete_import(&self, collection: &str, prior: PriorCounts) -> Result<()> {
        let metadata = self.load(collection)?;
        if metadata.consistent {
            return Err(VcfdbError::LedgerState(format!(
                "collection `{}` has no pending import",
                collection
            )));
        }

        if prior.files > 0 {
            let new_files = metadata.vcfs.len().saturating_sub(prior.files);
            let new_samples = metadata.samples.len().saturating_sub(prior.samples);
            let mut padding = Update::new();
            for field in PER_FILE_FIELDS {
                padding = padding.push(field, vec![Value::Null; new_files]);
            }
            padding = padding.push(FIELD_SAMPLES, vec![Value::Null; new_samples]);

            let padded = self.store.update_many(
                collection,
                Filter::array_len(FIELD_IDS, prior.files),
                padding,
            )?;
            info!("Padded {} untouched documents of `{}`", padded, collection);
        }

        let update = Update::new()
            .set("consistent", true)
            .set("last_edit", serde_json::to_value(Utc::now())?);
        self.store
            .update_one(METADATA_CONTAINER, collection, update, false)?;
        info!("Collection `{}` is consistent", collection);
        Ok(())
    }
}

///
/// Collection names are non-empty and don't contain the reserved `__`.
///
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VcfdbError::Config("collection name is empty".to_string()));
    }
    if name.contains(RESERVED_SEPARATOR) {
        return Err(VcfdbError::Config(format!(
            "collection name `{}` contains `{}`, which is reserved for internal use",
            name, RESERVED_SEPARATOR
        )));
    }
    Ok(())
}

fn require_files(files: &[SourceFile]) -> Result<()> {
    if files.is_empty() {
        return Err(VcfdbError::Config("no input files".to_string()));
    }
    Ok(())
}

///
/// Reject file identifiers or sample names that repeat within the batch or
/// already exist in the collection.
///
pub fn check_collisions(
    files: &[SourceFile],
    existing_files: &[&str],
    existing_samples: &[&str],
) -> Result<()> {
    let mut seen_files: HashSet<&str> = existing_files.iter().copied().collect();
    for file in files {
        if !seen_files.insert(file.id.as_str()) {
            return Err(VcfdbError::NameCollision(format!(
                "file `{}` is given more than once or is already in the collection",
                file.id
            )));
        }
    }

    let mut seen_samples: HashSet<&str> = existing_samples.iter().copied().collect();
    for file in files {
        for sample in &file.samples {
            if !seen_samples.insert(sample.as_str()) {
                return Err(VcfdbError::NameCollision(format!(
                    "sample `{}` of `{}` is already present",
                    sample, file.id
                )));
            }
        }
    }
    Ok(())
}
