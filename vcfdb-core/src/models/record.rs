use std::collections::BTreeMap;

use super::locus::Locus;
use super::value::FieldValue;

/// INFO fields of one record, keyed by field name.
pub type InfoMap = BTreeMap<String, FieldValue>;

///
/// Genotype call of one sample at one record.
///
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleCall {
    /// Called alleles as base strings, `.` for a missing allele.
    pub genotype: Vec<String>,
    pub allele_depths: Option<Vec<i64>>,
    pub depth: Option<i64>,
    pub genotype_quality: Option<i64>,
    pub likelihoods: Option<Vec<i64>>,
    /// Every other FORMAT field.
    pub extra: BTreeMap<String, FieldValue>,
}

impl SampleCall {
    pub fn with_genotype<S: Into<String>>(alleles: impl IntoIterator<Item = S>) -> Self {
        SampleCall {
            genotype: alleles.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

///
/// One data row of one variant file, as produced by the decoder.
///
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    /// 1-based position.
    pub pos: u64,
    pub id: Option<String>,
    pub reference: String,
    pub quality: Option<f64>,
    pub filters: Vec<String>,
    pub info: InfoMap,
    /// One call per sample, in header order.
    pub samples: Vec<SampleCall>,
}

impl VariantRecord {
    ///
    /// Minimal record at a locus; the remaining fields are empty.
    ///
    pub fn new(chrom: impl Into<String>, pos: u64, reference: impl Into<String>) -> Self {
        VariantRecord {
            chrom: chrom.into(),
            pos,
            id: None,
            reference: reference.into(),
            quality: None,
            filters: Vec::new(),
            info: InfoMap::new(),
            samples: Vec::new(),
        }
    }

    /// Borrowed sort key, ordered the same way as [`Locus`].
    pub fn key(&self) -> (&str, u64) {
        (self.chrom.as_str(), self.pos)
    }

    pub fn locus(&self) -> Locus {
        Locus::new(self.chrom.clone(), self.pos)
    }
}
