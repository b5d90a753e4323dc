use std::fmt::{self, Display};

use log::info;

use vcfdb_core::consts::{APP_METADATA_ID, APPLICATION_NAME, DATAMODEL_VERSION, METADATA_CONTAINER};
use vcfdb_core::{Result, VcfdbError};
use vcfdb_store::DocumentStore;

use crate::metadata::{ApplicationMetadata, CollectionMetadata, InconsistencyReason};

///
/// Whether a store belongs to this application.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    /// No containers at all.
    Empty,
    /// The sentinel is present with the current data-model version.
    Ready,
    VersionMismatch { found: String },
    /// Containers exist but the sentinel does not.
    Foreign,
}

pub fn check_store(store: &dyn DocumentStore) -> Result<StoreStatus> {
    let containers = store.list_containers()?;
    if containers.is_empty() {
        return Ok(StoreStatus::Empty);
    }
    if !containers.iter().any(|c| c == METADATA_CONTAINER) {
        return Ok(StoreStatus::Foreign);
    }

    let sentinel = match store.get(METADATA_CONTAINER, APP_METADATA_ID)? {
        Some(doc) => serde_json::from_value::<ApplicationMetadata>(doc.into()).ok(),
        None => None,
    };
    Ok(match sentinel {
        Some(app) if app.application == APPLICATION_NAME => {
            if app.version == DATAMODEL_VERSION {
                StoreStatus::Ready
            } else {
                StoreStatus::VersionMismatch { found: app.version }
            }
        }
        _ => StoreStatus::Foreign,
    })
}

/// Write the application sentinel.
pub fn init_store(store: &dyn DocumentStore) -> Result<()> {
    let sentinel = serde_json::to_value(ApplicationMetadata::current())?;
    let serde_json::Value::Object(document) = sentinel else {
        return Err(VcfdbError::Storage(
            "application metadata did not serialize to an object".to_string(),
        ));
    };
    store.insert(METADATA_CONTAINER, document)?;
    info!("Initialized store (data model version {})", DATAMODEL_VERSION);
    Ok(())
}

///
/// Initialize an empty store; accept a store already owned by this
/// application at the same data-model version.
///
pub fn ensure_store(store: &dyn DocumentStore) -> Result<()> {
    match check_store(store)? {
        StoreStatus::Ready => Ok(()),
        StoreStatus::Empty => init_store(store),
        StoreStatus::VersionMismatch { found } => Err(VcfdbError::LedgerState(format!(
            "data model version mismatch: this tool is version {} while the store is version {}",
            DATAMODEL_VERSION, found
        ))),
        StoreStatus::Foreign => Err(VcfdbError::LedgerState(
            "the store is not empty and was not created by this application".to_string(),
        )),
    }
}

///
/// Consistency state of one collection.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// Neither metadata nor container exist.
    New,
    /// The first import started and did not complete.
    PendingInit,
    Consistent,
    /// An append started and did not complete.
    PendingAppend,
    /// Metadata exists but the container does not.
    SpuriousMetadata,
}

impl Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CollectionState::New => "new",
            CollectionState::PendingInit => "pending initial import",
            CollectionState::Consistent => "consistent",
            CollectionState::PendingAppend => "pending append",
            CollectionState::SpuriousMetadata => "spurious metadata",
        };
        write!(f, "{}", label)
    }
}

pub fn load_metadata(store: &dyn DocumentStore, name: &str) -> Result<Option<CollectionMetadata>> {
    store
        .get(METADATA_CONTAINER, name)?
        .map(CollectionMetadata::from_document)
        .transpose()
}

///
/// Derive the state of `name` from its metadata and container.
///
/// A container without metadata was not created by this application and is
/// reported as an error rather than a state.
///
pub fn collection_state(store: &dyn DocumentStore, name: &str) -> Result<CollectionState> {
    let metadata = load_metadata(store, name)?;
    let container_exists = store.container_exists(name)?;
    state_of(name, metadata.as_ref(), container_exists)
}

pub(crate) fn state_of(
    name: &str,
    metadata: Option<&CollectionMetadata>,
    container_exists: bool,
) -> Result<CollectionState> {
    Ok(match (metadata, container_exists) {
        (None, false) => CollectionState::New,
        (None, true) => {
            return Err(VcfdbError::LedgerState(format!(
                "container `{}` exists without collection metadata",
                name
            )));
        }
        (Some(_), false) => CollectionState::SpuriousMetadata,
        (Some(meta), true) if meta.consistent => CollectionState::Consistent,
        (Some(meta), true) => match meta.last_inconsistency_reason {
            InconsistencyReason::NewImport => CollectionState::PendingInit,
            InconsistencyReason::Append(_) => CollectionState::PendingAppend,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use vcfdb_store::MemoryStore;

    #[rstest]
    fn test_empty_store_is_initialized() {
        let store = MemoryStore::new();
        assert_eq!(check_store(&store).unwrap(), StoreStatus::Empty);
        ensure_store(&store).unwrap();
        assert_eq!(check_store(&store).unwrap(), StoreStatus::Ready);
        ensure_store(&store).unwrap();
    }

    #[rstest]
    fn test_foreign_store_is_rejected() {
        let store = MemoryStore::new();
        store.create_container("someone_else").unwrap();
        assert_eq!(check_store(&store).unwrap(), StoreStatus::Foreign);
        assert!(ensure_store(&store).is_err());
    }

    #[rstest]
    fn test_version_mismatch() {
        let store = MemoryStore::new();
        let doc = json!({
            "_id": APP_METADATA_ID,
            "application": APPLICATION_NAME,
            "version": "0.0",
            "created": "2020-01-01T00:00:00Z",
        });
        store
            .insert(METADATA_CONTAINER, doc.as_object().unwrap().clone())
            .unwrap();
        assert_eq!(
            check_store(&store).unwrap(),
            StoreStatus::VersionMismatch {
                found: "0.0".to_string()
            }
        );
        assert!(ensure_store(&store).is_err());
    }

    #[rstest]
    fn test_container_without_metadata_is_an_error() {
        let store = MemoryStore::new();
        store.create_container("orphan").unwrap();
        assert!(collection_state(&store, "orphan").is_err());
        assert_eq!(collection_state(&store, "other").unwrap(), CollectionState::New);
    }
}
