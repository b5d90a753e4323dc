use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use serde_json::{Map, Value};

use super::record::{InfoMap, SampleCall};
use crate::consts::{AD_FIELD, DP_FIELD, GQ_FIELD, GT_FIELD, PL_FIELD, REF_OVERRIDE_FIELD};
use crate::errors::{Result, VcfdbError};

/// A schemaless document as held by the document store.
pub type Document = Map<String, Value>;

///
/// One sample slot of a merged document.
///
/// `reference_override` is set when the record this call comes from has a
/// different reference allele than the document it was merged into.
///
#[derive(Debug, Clone, PartialEq)]
pub struct SampleEntry {
    pub call: SampleCall,
    pub reference_override: Option<String>,
}

impl Serialize for SampleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let call = &self.call;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(GT_FIELD, &call.genotype)?;
        if let Some(ad) = &call.allele_depths {
            map.serialize_entry(AD_FIELD, ad)?;
        }
        if let Some(dp) = call.depth {
            map.serialize_entry(DP_FIELD, &dp)?;
        }
        if let Some(gq) = call.genotype_quality {
            map.serialize_entry(GQ_FIELD, &gq)?;
        }
        if let Some(pl) = &call.likelihoods {
            map.serialize_entry(PL_FIELD, pl)?;
        }
        for (key, value) in &call.extra {
            map.serialize_entry(key, value)?;
        }
        if let Some(reference) = &self.reference_override {
            map.serialize_entry(REF_OVERRIDE_FIELD, reference)?;
        }
        map.end()
    }
}

///
/// The persisted, per-locus columnar record combining every file of an import.
///
/// `ids`, `quals`, `filters` and `infos` hold one slot per file; `samples`
/// holds one slot per sample of every file. Files without a record at this
/// locus are `None` (persisted as `null`).
///
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MergedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "CHROM")]
    pub chrom: String,
    #[serde(rename = "POS")]
    pub pos: u64,
    #[serde(rename = "REF")]
    pub reference: String,
    #[serde(rename = "IDs")]
    pub ids: Vec<Option<String>>,
    #[serde(rename = "QUALs")]
    pub quals: Vec<Option<f64>>,
    #[serde(rename = "FILTERs")]
    pub filters: Vec<Option<Vec<String>>>,
    #[serde(rename = "INFOs")]
    pub infos: Vec<Option<InfoMap>>,
    pub samples: Vec<Option<SampleEntry>>,
}

impl MergedDocument {
    pub fn file_count(&self) -> usize {
        self.ids.len()
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(VcfdbError::Merge(format!(
                "merged document {} did not serialize to an object: {}",
                self.id, other
            ))),
        }
    }
}
