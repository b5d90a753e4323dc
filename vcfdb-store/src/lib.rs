//! # Document store for vcfdb
//!
//! The import pipeline and the consistency ledger only talk to a store through
//! the [`DocumentStore`] trait. Every mutation is expressed as a [`StoreOp`]
//! value and handed to [`DocumentStore::execute`]; the convenience methods
//! (`insert`, `update_many`, `bulk_write`, ...) are built on top of it.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: containers held in memory behind a single lock
//! - [`JournalStore`]: a [`MemoryStore`]-like catalog persisted as an
//!   append-only journal of operations in a directory, replayed on open
//!
pub mod journal;
pub mod memory;
pub mod ops;
pub mod store;

pub use journal::JournalStore;
pub use memory::MemoryStore;
pub use ops::{Filter, StoreOp, Update, WriteOp};
pub use store::DocumentStore;
