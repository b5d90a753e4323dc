//! # Consistency ledger for vcfdb collections
//!
//! Every collection has a metadata document in the `__METADATA__` container
//! listing its files, their headers and samples, and whether the documents of
//! the collection currently agree with that list. An import flips the flag to
//! inconsistent before any document is written and back once the last one is;
//! a crash in between leaves a state that [`Ledger::repair_collection`] can
//! undo.
//!
//! ```text
//!   New ──begin_import──▶ PendingInit ──complete_import──▶ Consistent
//!                              │                             │   ▲
//!                         repair (drop)               begin_append│
//!                              ▼                             ▼   │
//!                             New                  PendingAppend ─┘ complete_import
//!                                                        │            or repair (roll back)
//! ```
//!
pub mod admin;
pub mod ledger;
pub mod metadata;
pub mod state;

pub use admin::{BadCollection, RepairKind};
pub use ledger::{Ledger, PriorCounts, check_collisions, validate_collection_name};
pub use metadata::{ApplicationMetadata, CollectionMetadata, InconsistencyReason, SampleRef};
pub use state::{CollectionState, StoreStatus, check_store, collection_state, ensure_store, init_store};
