use serde::{Deserialize, Serialize};

/// A structured header line (`##INFO=<ID=...>`, `##contig=<ID=...>`, ...).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    #[serde(rename = "ID")]
    pub id: String,
    pub line: String,
}

/// Any other `##key=value` header line.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OtherLine {
    pub key: String,
    pub value: String,
}

///
/// Summary of one variant file header, persisted in the collection metadata.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderSummary {
    pub fileformat: String,
    pub contigs: Vec<HeaderLine>,
    pub formats: Vec<HeaderLine>,
    pub filters: Vec<HeaderLine>,
    pub infos: Vec<HeaderLine>,
    pub others: Vec<OtherLine>,
}

///
/// One input of an import: the file identifier, its header summary and its
/// sample names in file order.
///
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub id: String,
    pub header: HeaderSummary,
    pub samples: Vec<String>,
}

impl SourceFile {
    pub fn new<S: Into<String>>(
        id: impl Into<String>,
        header: HeaderSummary,
        samples: impl IntoIterator<Item = S>,
    ) -> Self {
        SourceFile {
            id: id.into(),
            header,
            samples: samples.into_iter().map(Into::into).collect(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
