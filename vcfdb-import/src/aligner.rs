use log::debug;

use vcfdb_core::{Locus, Result, VariantRecord, VcfdbError};

///
/// Records of several sources sharing one locus, sorted by source index.
///
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedGroup {
    pub entries: Vec<(usize, VariantRecord)>,
}

impl AlignedGroup {
    pub fn new(entries: Vec<(usize, VariantRecord)>) -> Self {
        AlignedGroup { entries }
    }

    /// Locus of the first entry.
    pub fn locus(&self) -> Option<Locus> {
        self.entries.first().map(|(_, record)| record.locus())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Slot<I> {
    source: I,
    current: Option<VariantRecord>,
    /// Key of the record most recently taken from this slot.
    last: Option<(String, u64)>,
    exhausted: bool,
}

///
/// Multi-way merge of sorted record sources by `(CHROM, POS)`.
///
/// Each step scans the current record of every live source for the lowest
/// locus, takes every record at that locus and advances only those sources.
/// One [`AlignedGroup`] is produced per distinct locus, in ascending order.
///
/// A source error, or a source that goes backwards or repeats a locus, is
/// yielded once and ends the iteration.
///
pub struct StreamAligner<I> {
    slots: Vec<Slot<I>>,
    primed: bool,
    pending_error: Option<VcfdbError>,
    done: bool,
}

impl<I> StreamAligner<I>
where
    I: Iterator<Item = Result<VariantRecord>>,
{
    pub fn new(sources: impl IntoIterator<Item = I>) -> Self {
        let slots = sources
            .into_iter()
            .map(|source| Slot {
                source,
                current: None,
                last: None,
                exhausted: false,
            })
            .collect();
        StreamAligner {
            slots,
            primed: false,
            pending_error: None,
            done: false,
        }
    }

    fn advance(&mut self, index: usize) -> Result<()> {
        let slot = &mut self.slots[index];
        match slot.source.next() {
            None => {
                slot.current = None;
                slot.exhausted = true;
                debug!("Source {} exhausted", index);
                Ok(())
            }
            Some(Err(e)) => {
                slot.current = None;
                slot.exhausted = true;
                Err(e)
            }
            Some(Ok(record)) => {
                if let Some((chrom, pos)) = &slot.last
                    && record.key() <= (chrom.as_str(), *pos)
                {
                    slot.exhausted = true;
                    let what = if record.key() == (chrom.as_str(), *pos) {
                        "repeats"
                    } else {
                        "goes back to"
                    };
                    return Err(VcfdbError::OrderViolation(format!(
                        "source {} {} {}:{} after {}:{}",
                        index, what, record.chrom, record.pos, chrom, pos
                    )));
                }
                slot.current = Some(record);
                Ok(())
            }
        }
    }

    fn fail(&mut self, e: VcfdbError) -> Option<Result<AlignedGroup>> {
        self.done = true;
        Some(Err(e))
    }
}

impl<I> Iterator for StreamAligner<I>
where
    I: Iterator<Item = Result<VariantRecord>>,
{
    type Item = Result<AlignedGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(e) = self.pending_error.take() {
            return self.fail(e);
        }
        if !self.primed {
            self.primed = true;
            for index in 0..self.slots.len() {
                if let Err(e) = self.advance(index) {
                    return self.fail(e);
                }
            }
        }

        // linear scan for the lowest current locus
        let mut min: Option<(&str, u64)> = None;
        for slot in self.slots.iter().filter(|s| !s.exhausted) {
            if let Some(record) = &slot.current {
                let key = record.key();
                if min.is_none_or(|m| key < m) {
                    min = Some(key);
                }
            }
        }
        let Some((chrom, pos)) = min else {
            self.done = true;
            return None;
        };
        let min = (chrom.to_string(), pos);

        let members: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.current
                    .as_ref()
                    .is_some_and(|r| r.key() == (min.0.as_str(), min.1))
            })
            .map(|(i, _)| i)
            .collect();

        let mut entries = Vec::with_capacity(members.len());
        for index in members {
            let slot = &mut self.slots[index];
            if let Some(record) = slot.current.take() {
                slot.last = Some(min.clone());
                entries.push((index, record));
            }
            if let Err(e) = self.advance(index) {
                // the group is complete; report the error on the next call
                self.pending_error.get_or_insert(e);
            }
        }

        Some(Ok(AlignedGroup::new(entries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use vcfdb_core::ErrorKind;

    fn source(loci: &[(&str, u64)]) -> std::vec::IntoIter<Result<VariantRecord>> {
        loci.iter()
            .map(|(c, p)| Ok(VariantRecord::new(*c, *p, "A")))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn layout(groups: Vec<Result<AlignedGroup>>) -> Vec<(String, Vec<usize>)> {
        groups
            .into_iter()
            .map(|g| {
                let g = g.unwrap();
                let locus = g.locus().unwrap().document_id();
                (locus, g.entries.iter().map(|(i, _)| *i).collect())
            })
            .collect()
    }

    #[rstest]
    fn test_two_sources() {
        let aligner = StreamAligner::new(vec![
            source(&[("chr1", 100), ("chr1", 200)]),
            source(&[("chr1", 150), ("chr1", 200)]),
        ]);
        assert_eq!(
            layout(aligner.collect()),
            vec![
                ("chr1:100".to_string(), vec![0]),
                ("chr1:150".to_string(), vec![1]),
                ("chr1:200".to_string(), vec![0, 1]),
            ]
        );
    }

    #[rstest]
    fn test_lexicographic_chromosome_order() {
        let aligner = StreamAligner::new(vec![
            source(&[("chr1", 5), ("chr10", 1), ("chr2", 1)]),
            source(&[("chr10", 1)]),
        ]);
        assert_eq!(
            layout(aligner.collect()),
            vec![
                ("chr1:5".to_string(), vec![0]),
                ("chr10:1".to_string(), vec![0, 1]),
                ("chr2:1".to_string(), vec![0]),
            ]
        );
    }

    #[rstest]
    fn test_exhausted_first_source_is_skipped() {
        let aligner = StreamAligner::new(vec![
            source(&[]),
            source(&[("chr1", 1)]),
            source(&[]),
            source(&[("chr1", 1), ("chr1", 2)]),
        ]);
        assert_eq!(
            layout(aligner.collect()),
            vec![
                ("chr1:1".to_string(), vec![1, 3]),
                ("chr1:2".to_string(), vec![3]),
            ]
        );
    }

    #[rstest]
    fn test_no_sources() {
        let mut aligner = StreamAligner::new(Vec::<std::vec::IntoIter<Result<VariantRecord>>>::new());
        assert!(aligner.next().is_none());
    }

    #[rstest]
    fn test_order_violation_ends_iteration() {
        let mut aligner = StreamAligner::new(vec![
            source(&[("chr1", 10), ("chr1", 5), ("chr1", 20)]),
            source(&[("chr1", 30)]),
        ]);
        assert!(aligner.next().unwrap().is_ok());
        let err = aligner.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OrderViolation);
        assert!(err.to_string().contains("source 0"));
        assert!(aligner.next().is_none());
    }

    #[rstest]
    fn test_repeated_locus_in_one_source() {
        let mut aligner = StreamAligner::new(vec![
            source(&[("chr1", 100), ("chr1", 100)]),
            source(&[("chr1", 100)]),
        ]);
        let first = aligner.next().unwrap().unwrap();
        assert_eq!(first.entries.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);

        let err = aligner.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OrderViolation);
        assert!(err.to_string().contains("source 0 repeats chr1:100"));
        assert!(aligner.next().is_none());
    }

    #[rstest]
    fn test_source_error_is_forwarded() {
        let failing = vec![
            Ok(VariantRecord::new("chr1", 1, "A")),
            Err(VcfdbError::Decode("bad line".to_string())),
        ]
        .into_iter();
        let mut aligner = StreamAligner::new(vec![failing]);
        assert!(aligner.next().unwrap().is_ok());
        assert_eq!(aligner.next().unwrap().unwrap_err().kind(), ErrorKind::Decode);
        assert!(aligner.next().is_none());
    }
}
