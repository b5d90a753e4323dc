/// Container holding the application sentinel and one metadata document per collection.
pub const METADATA_CONTAINER: &str = "__METADATA__";

/// Identity of the application sentinel inside [`METADATA_CONTAINER`].
pub const APP_METADATA_ID: &str = "__METADATA__";
pub const APPLICATION_NAME: &str = "VCFDB";
pub const DATAMODEL_VERSION: &str = "0.1";

/// Double underscores are reserved for internal containers (`coll__suffix`).
pub const RESERVED_SEPARATOR: &str = "__";

// persisted document fields
pub const FIELD_ID: &str = "_id";
pub const FIELD_CHROM: &str = "CHROM";
pub const FIELD_POS: &str = "POS";
pub const FIELD_REF: &str = "REF";
pub const FIELD_IDS: &str = "IDs";
pub const FIELD_QUALS: &str = "QUALs";
pub const FIELD_FILTERS: &str = "FILTERs";
pub const FIELD_INFOS: &str = "INFOs";
pub const FIELD_SAMPLES: &str = "samples";

/// Per-file array fields, in the order they are written.
pub const PER_FILE_FIELDS: [&str; 4] = [FIELD_IDS, FIELD_QUALS, FIELD_FILTERS, FIELD_INFOS];

/// Set on sample entries whose record reference differs from the document `REF`.
pub const REF_OVERRIDE_FIELD: &str = "_RR_";

// sample call fields
pub const GT_FIELD: &str = "GT";
pub const AD_FIELD: &str = "AD";
pub const DP_FIELD: &str = "DP";
pub const GQ_FIELD: &str = "GQ";
pub const PL_FIELD: &str = "PL";
