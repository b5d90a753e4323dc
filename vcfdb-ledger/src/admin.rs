use std::fmt::{self, Display};

use chrono::Utc;
use log::{info, warn};

use vcfdb_core::consts::{APP_METADATA_ID, FIELD_ID, FIELD_INFOS, FIELD_SAMPLES, METADATA_CONTAINER, PER_FILE_FIELDS, RESERVED_SEPARATOR};
use vcfdb_core::{Result, VcfdbError};
use vcfdb_store::{Filter, Update};

use crate::ledger::{Ledger, validate_collection_name};
use crate::metadata::{CollectionMetadata, InconsistencyReason};
use crate::state::{CollectionState, state_of};

/// An inconsistent collection and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadCollection {
    pub name: String,
    pub state: CollectionState,
    pub reason: String,
}

/// The repair to run on a collection; must match its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairKind {
    SpuriousMetadata,
    PendingInit,
    PendingAppend,
}

impl RepairKind {
    /// The repair for `state`, if it needs one.
    pub fn for_state(state: CollectionState) -> Option<Self> {
        match state {
            CollectionState::SpuriousMetadata => Some(RepairKind::SpuriousMetadata),
            CollectionState::PendingInit => Some(RepairKind::PendingInit),
            CollectionState::PendingAppend => Some(RepairKind::PendingAppend),
            CollectionState::New | CollectionState::Consistent => None,
        }
    }

    /// Whether the repair deletes the whole collection.
    pub fn is_destructive(&self) -> bool {
        !matches!(self, RepairKind::PendingAppend)
    }
}

impl Display for RepairKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RepairKind::SpuriousMetadata => "remove spurious metadata",
            RepairKind::PendingInit => "discard incomplete initial import",
            RepairKind::PendingAppend => "roll back incomplete append",
        };
        write!(f, "{}", label)
    }
}

impl Ledger {
    /// Names of every collection with metadata.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .find(METADATA_CONTAINER, &Filter::id_not(APP_METADATA_ID))?
            .into_iter()
            .filter_map(|doc| doc.get(FIELD_ID).and_then(|v| v.as_str()).map(str::to_string))
            .collect())
    }

    pub fn collection_details(&self, name: &str) -> Result<CollectionMetadata> {
        self.load(name)
    }

    ///
    /// Every collection that is not consistent, with the reason.
    ///
    pub fn bad_collections(&self) -> Result<Vec<BadCollection>> {
        let mut bad = Vec::new();
        for name in self.list_collections()? {
            let metadata = self.load(&name)?;
            let state = state_of(&name, Some(&metadata), self.store.container_exists(&name)?)?;
            let reason = match (state, &metadata.last_inconsistency_reason) {
                (CollectionState::Consistent | CollectionState::New, _) => continue,
                (CollectionState::SpuriousMetadata, _) => {
                    "Metadata present but the collection is missing.".to_string()
                }
                (_, InconsistencyReason::NewImport) => {
                    "Initial import operation not complete.".to_string()
                }
                (_, InconsistencyReason::Append(files)) => {
                    format!("Append import not complete ({}).", files.join(", "))
                }
            };
            bad.push(BadCollection {
                name,
                state,
                reason,
            });
        }
        Ok(bad)
    }

    /// Containers named `{name}__{suffix}`.
    fn related_containers(&self, name: &str) -> Result<Vec<String>> {
        let prefix = format!("{}{}", name, RESERVED_SEPARATOR);
        Ok(self
            .store
            .list_containers()?
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect())
    }

    ///
    /// Rename a collection together with its related containers and its
    /// metadata document.
    ///
    pub fn rename_collection(&self, old: &str, new: &str) -> Result<()> {
        validate_collection_name(new)?;
        if !self.store.container_exists(old)? {
            return Err(VcfdbError::LedgerState(format!(
                "collection `{}` does not exist",
                old
            )));
        }
        let mut metadata = self.load(old)?;
        if self.store.container_exists(new)? || self.store.get(METADATA_CONTAINER, new)?.is_some() {
            return Err(VcfdbError::LedgerState(format!(
                "target collection `{}` already exists",
                new
            )));
        }

        self.store.rename_container(old, new)?;
        for related in self.related_containers(old)? {
            let suffix = &related[old.len() + RESERVED_SEPARATOR.len()..];
            let target = format!("{}{}{}", new, RESERVED_SEPARATOR, suffix);
            self.store.rename_container(&related, &target)?;
        }

        metadata.name = new.to_string();
        metadata.last_edit = Utc::now();
        self.store
            .insert(METADATA_CONTAINER, metadata.to_document()?)?;
        self.store.delete_one(METADATA_CONTAINER, old)?;

        info!("Renamed collection `{}` to `{}`", old, new);
        Ok(())
    }

    pub fn delete_collection(&self, name: &str) -> Result<()> {
        self.load(name)?;
        self.drop_all(name)?;
        info!("Deleted collection `{}`", name);
        Ok(())
    }

    fn drop_all(&self, name: &str) -> Result<()> {
        self.store.drop_container(name)?;
        for related in self.related_containers(name)? {
            self.store.drop_container(&related)?;
        }
        self.store.delete_one(METADATA_CONTAINER, name)?;
        Ok(())
    }

    ///
    /// Bring `name` back to a consistent (or absent) state after an
    /// interrupted import.
    ///
    /// `PendingAppend` on a consistent collection is accepted and changes
    /// nothing: a completed append is never rolled back.
    ///
    pub fn repair_collection(&self, name: &str, kind: RepairKind) -> Result<()> {
        let state = self.collection_state(name)?;
        match (kind, state) {
            (RepairKind::SpuriousMetadata, CollectionState::SpuriousMetadata) => {
                self.store.delete_one(METADATA_CONTAINER, name)?;
                info!("Removed spurious metadata of `{}`", name);
            }
            (RepairKind::PendingInit, CollectionState::PendingInit) => {
                self.drop_all(name)?;
                info!("Discarded incomplete import of `{}`", name);
            }
            (
                RepairKind::PendingAppend,
                CollectionState::PendingAppend | CollectionState::Consistent,
            ) => self.roll_back_append(name)?,
            (kind, state) => {
                return Err(VcfdbError::LedgerState(format!(
                    "can't {} on `{}`: collection is {}",
                    kind, name, state
                )));
            }
        }
        Ok(())
    }

    ///
    /// Truncate every document to the files that were present before the
    /// pending append and drop the loci only that append created.
    ///
    fn roll_back_append(&self, name: &str) -> Result<()> {
        let metadata = self.load(name)?;
        let appended: &[String] = match (&metadata.last_inconsistency_reason, metadata.consistent) {
            (_, true) => &[],
            (InconsistencyReason::Append(files), false) if !files.is_empty() => files,
            _ => {
                return Err(VcfdbError::LedgerState(format!(
                    "metadata state of `{}` is incoherent: no appended files recorded",
                    name
                )));
            }
        };
        if !metadata.vcfs.ends_with(appended) {
            return Err(VcfdbError::LedgerState(format!(
                "metadata state of `{}` is incoherent: appended files are not the last files",
                name
            )));
        }

        let good_files = metadata.vcfs.len() - appended.len();
        let good_samples = metadata
            .samples
            .iter()
            .filter(|s| s.vcfid < good_files)
            .count();

        let mut truncate = Update::new();
        for field in PER_FILE_FIELDS {
            truncate = truncate.slice(field, good_files);
        }
        truncate = truncate.slice(FIELD_SAMPLES, good_samples);
        self.store.update_many(name, Filter::All, truncate)?;

        if !metadata.consistent {
            let removed = self.store.delete_many(name, Filter::all_null(FIELD_INFOS))?;
            if removed > 0 {
                warn!(
                    "Removed {} loci of `{}` that only the failed append contained",
                    removed, name
                );
            }
        }

        let update = Update::new()
            .slice("vcfs", good_files)
            .slice("headers", good_files)
            .slice("samples", good_samples)
            .set("consistent", true)
            .set("last_edit", serde_json::to_value(Utc::now())?);
        self.store
            .update_one(METADATA_CONTAINER, name, update, false)?;

        info!(
            "Rolled back `{}` to {} files and {} samples",
            name, good_files, good_samples
        );
        Ok(())
    }
}
