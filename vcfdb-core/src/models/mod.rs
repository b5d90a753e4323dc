pub mod document;
pub mod header;
pub mod locus;
pub mod record;
pub mod value;

// re-export for cleaner imports
pub use self::document::{Document, MergedDocument, SampleEntry};
pub use self::header::{HeaderLine, HeaderSummary, OtherLine, SourceFile};
pub use self::locus::Locus;
pub use self::record::{InfoMap, SampleCall, VariantRecord};
pub use self::value::FieldValue;
