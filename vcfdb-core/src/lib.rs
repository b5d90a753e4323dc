//! # Core data model for vcfdb
//!
//! This crate holds the types shared by every other vcfdb crate:
//!
//! - [`models`]: loci, typed field values, variant records, header summaries
//!   and the merged per-locus document
//! - [`errors`]: the single error type used across the workspace
//! - [`counter`]: the thread-safe accumulator used for throughput reporting
//! - [`consts`]: reserved container names and persisted field names
//!
pub mod consts;
pub mod counter;
pub mod errors;
pub mod models;

// re-expose the most used items
pub use counter::Counter;
pub use errors::{ErrorKind, Result, VcfdbError};
pub use models::{
    Document, FieldValue, HeaderLine, HeaderSummary, InfoMap, Locus, MergedDocument, OtherLine,
    SampleCall, SampleEntry, SourceFile, VariantRecord,
};
