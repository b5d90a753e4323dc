use vcfdb_core::{MergedDocument, Result, SampleCall, SampleEntry, VariantRecord, VcfdbError};

use crate::aligner::AlignedGroup;

///
/// Merge one aligned group into the per-locus document of an import.
///
/// `sample_counts[i]` is the number of samples declared by source `i`. Every
/// per-file array of the result has `sample_counts.len()` slots and `samples`
/// has their sum; sources without a record at this locus are `None`.
///
pub fn merge_records(group: &AlignedGroup, sample_counts: &[usize]) -> Result<MergedDocument> {
    let Some((_, first)) = group.entries.first() else {
        return Err(VcfdbError::Merge("empty group".to_string()));
    };
    let locus = first.locus();
    let reference = first.reference.clone();

    let files = sample_counts.len();
    let mut doc = MergedDocument {
        id: locus.document_id(),
        chrom: locus.chrom.clone(),
        pos: locus.pos,
        reference,
        ids: Vec::with_capacity(files),
        quals: Vec::with_capacity(files),
        filters: Vec::with_capacity(files),
        infos: Vec::with_capacity(files),
        samples: Vec::with_capacity(sample_counts.iter().sum()),
    };

    let mut expected = 0;
    for (index, record) in &group.entries {
        let index = *index;
        if index < expected {
            return Err(VcfdbError::Merge(format!(
                "{}: source indices are not strictly increasing",
                doc.id
            )));
        }
        if index >= files {
            return Err(VcfdbError::Merge(format!(
                "{}: source index {} out of range for {} files",
                doc.id, index, files
            )));
        }
        if record.key() != (doc.chrom.as_str(), doc.pos) {
            return Err(VcfdbError::Merge(format!(
                "record {}:{} of source {} does not belong to {}",
                record.chrom, record.pos, index, doc.id
            )));
        }
        if record.samples.len() != sample_counts[index] {
            return Err(VcfdbError::Merge(format!(
                "{}: source {} has {} sample calls, its header declares {}",
                doc.id,
                index,
                record.samples.len(),
                sample_counts[index]
            )));
        }

        for &count in &sample_counts[expected..index] {
            push_absent(&mut doc, count);
        }
        push_record(&mut doc, index, record)?;
        expected = index + 1;
    }
    for &count in &sample_counts[expected..] {
        push_absent(&mut doc, count);
    }

    Ok(doc)
}

fn push_absent(doc: &mut MergedDocument, samples: usize) {
    doc.ids.push(None);
    doc.quals.push(None);
    doc.filters.push(None);
    doc.infos.push(None);
    doc.samples.extend(std::iter::repeat_n(None, samples));
}

fn push_record(doc: &mut MergedDocument, index: usize, record: &VariantRecord) -> Result<()> {
    let bad = |what: String| VcfdbError::Merge(format!("{} (source {}): {}", doc.id, index, what));

    if let Some(qual) = record.quality
        && !qual.is_finite()
    {
        return Err(bad(format!("QUAL is {}", qual)));
    }
    for (key, value) in &record.info {
        value
            .check_shape()
            .map_err(|e| bad(format!("INFO {}: {}", key, e)))?;
    }
    for (n, call) in record.samples.iter().enumerate() {
        check_call(call).map_err(|e| bad(format!("sample {}: {}", n, e)))?;
    }

    let reference_override = (record.reference != doc.reference).then(|| record.reference.clone());

    doc.ids.push(record.id.clone());
    doc.quals.push(record.quality);
    doc.filters.push(Some(record.filters.clone()));
    doc.infos.push(Some(record.info.clone()));
    doc.samples.extend(record.samples.iter().map(|call| {
        Some(SampleEntry {
            call: call.clone(),
            reference_override: reference_override.clone(),
        })
    }));
    Ok(())
}

fn check_call(call: &SampleCall) -> std::result::Result<(), String> {
    for (key, value) in &call.extra {
        value.check_shape().map_err(|e| format!("{}: {}", key, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use vcfdb_core::{ErrorKind, FieldValue, InfoMap};

    fn record(pos: u64, reference: &str, samples: usize) -> VariantRecord {
        let mut record = VariantRecord::new("chr1", pos, reference);
        record.id = Some(format!("rs{}", pos));
        record.quality = Some(40.0);
        record.filters = vec!["PASS".to_string()];
        record.samples = vec![SampleCall::with_genotype(["A", "A"]); samples];
        record
    }

    #[rstest]
    fn test_pads_missing_sources() {
        let group = AlignedGroup::new(vec![(1, record(5, "A", 2))]);
        let doc = merge_records(&group, &[1, 2, 3]).unwrap();

        assert_eq!(doc.id, "chr1:5");
        assert_eq!(doc.ids, vec![None, Some("rs5".to_string()), None]);
        assert_eq!(doc.infos, vec![None, Some(InfoMap::new()), None]);
        assert_eq!(doc.samples.len(), 6);
        let present: Vec<bool> = doc.samples.iter().map(Option::is_some).collect();
        assert_eq!(present, vec![false, true, true, false, false, false]);
    }

    #[rstest]
    fn test_reference_override() {
        let group = AlignedGroup::new(vec![(0, record(5, "A", 1)), (1, record(5, "AT", 1))]);
        let doc = merge_records(&group, &[1, 1]).unwrap();

        assert_eq!(doc.reference, "A");
        assert_eq!(doc.samples[0].as_ref().unwrap().reference_override, None);
        assert_eq!(
            doc.samples[1].as_ref().unwrap().reference_override,
            Some("AT".to_string())
        );
    }

    #[rstest]
    #[case::empty(vec![], &[1])]
    #[case::unsorted(vec![(1, record(5, "A", 1)), (0, record(5, "A", 1))], &[1, 1])]
    #[case::duplicate(vec![(0, record(5, "A", 1)), (0, record(5, "A", 1))], &[1, 1])]
    #[case::out_of_range(vec![(2, record(5, "A", 1))], &[1, 1])]
    #[case::other_locus(vec![(0, record(5, "A", 1)), (1, record(6, "A", 1))], &[1, 1])]
    #[case::sample_count(vec![(0, record(5, "A", 3))], &[2])]
    fn test_structural_errors(#[case] entries: Vec<(usize, VariantRecord)>, #[case] counts: &[usize]) {
        let err = merge_records(&AlignedGroup::new(entries), counts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Merge);
    }

    #[rstest]
    fn test_non_finite_values_are_rejected() {
        let mut nan_qual = record(5, "A", 0);
        nan_qual.quality = Some(f64::NAN);
        assert!(merge_records(&AlignedGroup::new(vec![(0, nan_qual)]), &[0]).is_err());

        let mut inf_info = record(5, "A", 0);
        inf_info
            .info
            .insert("AF".to_string(), FieldValue::Array(vec![FieldValue::Float(f64::INFINITY)]));
        assert!(merge_records(&AlignedGroup::new(vec![(0, inf_info)]), &[0]).is_err());

        let mut nested = record(5, "A", 1);
        nested.samples[0].extra.insert(
            "XX".to_string(),
            FieldValue::Array(vec![FieldValue::Array(vec![])]),
        );
        assert!(merge_records(&AlignedGroup::new(vec![(0, nested)]), &[1]).is_err());
    }
}
