//! # VCF decoding for vcfdb
//!
//! The import pipeline consumes variant files through the [`VariantDecoder`]
//! trait: opening a file yields its [`HeaderSummary`](vcfdb_core::HeaderSummary),
//! its sample names and a lazy, forward-only stream of
//! [`VariantRecord`](vcfdb_core::VariantRecord)s.
//!
//! [`VcfTextDecoder`] implements it for VCF text, plain or gzip/bgzf
//! compressed. Records are assumed to be sorted by `(CHROM, POS)`; the decoder
//! does not check it.
//!
//! ```no_run
//! use std::path::Path;
//! use vcfdb_vcf::{VariantDecoder, VcfTextDecoder};
//!
//! let source = VcfTextDecoder::new().open(Path::new("calls.vcf.gz")).unwrap();
//! for record in source.records {
//!     let record = record.unwrap();
//!     println!("{}:{}", record.chrom, record.pos);
//! }
//! ```
//!
pub mod decoder;
pub mod header;
pub mod record;

pub use decoder::{DecodedSource, RecordStream, VariantDecoder, VcfTextDecoder};
pub use header::{FieldType, FieldTypes};
