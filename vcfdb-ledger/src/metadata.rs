use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vcfdb_core::consts::{APP_METADATA_ID, APPLICATION_NAME, DATAMODEL_VERSION};
use vcfdb_core::{Document, HeaderSummary, Result, SourceFile, VcfdbError};

///
/// The sentinel marking a store as owned by this application.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApplicationMetadata {
    #[serde(rename = "_id")]
    pub id: String,
    pub application: String,
    pub version: String,
    pub created: DateTime<Utc>,
}

impl ApplicationMetadata {
    pub fn current() -> Self {
        ApplicationMetadata {
            id: APP_METADATA_ID.to_string(),
            application: APPLICATION_NAME.to_string(),
            version: DATAMODEL_VERSION.to_string(),
            created: Utc::now(),
        }
    }
}

/// A sample of a collection and the index of the file it comes from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SampleRef {
    pub name: String,
    pub vcfid: usize,
}

///
/// Why a collection was last flagged inconsistent. Persisted as `["INIT"]`
/// or `["APPEND", [file, ...]]`.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "ReasonRepr", into = "ReasonRepr")]
pub enum InconsistencyReason {
    NewImport,
    Append(Vec<String>),
}

const INIT_TAG: &str = "INIT";
const APPEND_TAG: &str = "APPEND";

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ReasonRepr {
    WithFiles((String, Vec<String>)),
    Tag((String,)),
}

impl From<InconsistencyReason> for ReasonRepr {
    fn from(reason: InconsistencyReason) -> Self {
        match reason {
            InconsistencyReason::NewImport => ReasonRepr::Tag((INIT_TAG.to_string(),)),
            InconsistencyReason::Append(files) => {
                ReasonRepr::WithFiles((APPEND_TAG.to_string(), files))
            }
        }
    }
}

impl TryFrom<ReasonRepr> for InconsistencyReason {
    type Error = String;

    fn try_from(repr: ReasonRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ReasonRepr::Tag((tag,)) if tag == INIT_TAG => Ok(InconsistencyReason::NewImport),
            ReasonRepr::WithFiles((tag, files)) if tag == APPEND_TAG => {
                Ok(InconsistencyReason::Append(files))
            }
            ReasonRepr::Tag((tag,)) | ReasonRepr::WithFiles((tag, _)) => {
                Err(format!("unknown inconsistency reason `{}`", tag))
            }
        }
    }
}

///
/// The metadata document of one collection, stored in the metadata
/// container under the collection name.
///
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CollectionMetadata {
    #[serde(rename = "_id")]
    pub name: String,
    pub created: DateTime<Utc>,
    pub last_edit: DateTime<Utc>,
    /// File identifiers, in import order.
    pub vcfs: Vec<String>,
    /// One header per entry of `vcfs`.
    pub headers: Vec<HeaderSummary>,
    pub samples: Vec<SampleRef>,
    pub consistent: bool,
    pub last_inconsistency_reason: InconsistencyReason,
}

impl CollectionMetadata {
    ///
    /// Metadata of a collection whose first import is about to start.
    ///
    pub fn new_import(name: &str, files: &[SourceFile]) -> Self {
        let now = Utc::now();
        let mut metadata = CollectionMetadata {
            name: name.to_string(),
            created: now,
            last_edit: now,
            vcfs: Vec::new(),
            headers: Vec::new(),
            samples: Vec::new(),
            consistent: false,
            last_inconsistency_reason: InconsistencyReason::NewImport,
        };
        metadata.extend(files);
        metadata
    }

    ///
    /// Add `files` after the existing ones; sample `vcfid`s continue from the
    /// current file count.
    ///
    pub fn extend(&mut self, files: &[SourceFile]) {
        for file in files {
            let vcfid = self.vcfs.len();
            self.vcfs.push(file.id.clone());
            self.headers.push(file.header.clone());
            self.samples.extend(file.samples.iter().map(|name| SampleRef {
                name: name.clone(),
                vcfid,
            }));
        }
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(VcfdbError::Storage(
                "collection metadata did not serialize to an object".to_string(),
            )),
        }
    }

    pub fn from_document(document: Document) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(document))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn file(id: &str, samples: &[&str]) -> SourceFile {
        SourceFile::new(id, HeaderSummary::default(), samples.iter().copied())
    }

    #[rstest]
    #[case(InconsistencyReason::NewImport, json!(["INIT"]))]
    #[case(InconsistencyReason::Append(vec!["b.vcf".into(), "c.vcf".into()]), json!(["APPEND", ["b.vcf", "c.vcf"]]))]
    fn test_reason_wire_format(#[case] reason: InconsistencyReason, #[case] expected: serde_json::Value) {
        assert_eq!(serde_json::to_value(&reason).unwrap(), expected);
        let back: InconsistencyReason = serde_json::from_value(expected).unwrap();
        assert_eq!(back, reason);
    }

    #[rstest]
    #[case(json!(["REBUILD"]))]
    #[case(json!(["INIT", ["a.vcf"]]))]
    #[case(json!([]))]
    fn test_reason_rejects_unknown(#[case] value: serde_json::Value) {
        assert!(serde_json::from_value::<InconsistencyReason>(value).is_err());
    }

    #[rstest]
    fn test_extend_offsets_vcfid() {
        let mut metadata = CollectionMetadata::new_import("c", &[file("a.vcf", &["S1", "S2"])]);
        metadata.extend(&[file("b.vcf", &[]), file("c.vcf", &["S3"])]);

        assert_eq!(metadata.vcfs, vec!["a.vcf", "b.vcf", "c.vcf"]);
        assert_eq!(metadata.headers.len(), 3);
        let ids: Vec<usize> = metadata.samples.iter().map(|s| s.vcfid).collect();
        assert_eq!(ids, vec![0, 0, 2]);
    }

    #[rstest]
    fn test_document_roundtrip_keeps_field_names() {
        let metadata = CollectionMetadata::new_import("c", &[file("a.vcf", &["S1"])]);
        let document = metadata.to_document().unwrap();
        assert_eq!(document["_id"], json!("c"));
        assert_eq!(document["consistent"], json!(false));
        assert_eq!(document["last_inconsistency_reason"], json!(["INIT"]));
        assert_eq!(document["samples"], json!([{"name": "S1", "vcfid": 0}]));
        assert_eq!(CollectionMetadata::from_document(document).unwrap(), metadata);
    }
}
