//! # Merge-import pipeline for vcfdb
//!
//! Loads several sorted variant files into one collection, one document per
//! locus. The stages run on their own threads and talk through bounded
//! queues:
//!
//! ```text
//! parser ─┐
//! parser ─┼─> aligner ──> mergers ──> loaders ──> store
//! parser ─┘
//! ```
//!
//! [`import_files`] registers the import with the ledger, runs the
//! [`Pipeline`] and marks the collection consistent when every stage
//! succeeded.
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! use vcfdb_import::{ImportConfig, import_files};
//! use vcfdb_store::JournalStore;
//! use vcfdb_vcf::VcfTextDecoder;
//!
//! let store = Arc::new(JournalStore::open("VCF").unwrap());
//! let files = vec![PathBuf::from("a.vcf.gz"), PathBuf::from("b.vcf.gz")];
//! let outcome = import_files(
//!     store,
//!     "calls",
//!     &files,
//!     false,
//!     &VcfTextDecoder::default(),
//!     &ImportConfig::default(),
//! )
//! .unwrap();
//! assert!(outcome.completed);
//! ```
pub mod aligner;
pub mod config;
pub mod import;
pub mod merger;
pub mod message;
pub mod pipeline;

pub use aligner::{AlignedGroup, StreamAligner};
pub use config::ImportConfig;
pub use import::{ImportOutcome, file_id, import_files};
pub use merger::merge_records;
pub use message::{ChannelRecords, Message};
pub use pipeline::{DroppedRecord, LoadMode, Pipeline, PipelineReport, Stage, StageError, write_op};
