//! Concatemer reassembly from monomer alignments
//!
//! Groups alignment records by parent concatemer id and restores the
//! monomers' original order along the concatemer.
//!
//! Buffering depends on [`Grouping`]:
//! - `Contiguous` expects each concatemer's records to be adjacent
//!   (name-sorted BAM) and holds one group at a time, so memory is
//!   bounded by the largest concatemer fan-out (monomers x alignments).
//!   A concatemer split across the input comes out as several groups.
//! - `Checked` is `Contiguous` plus a set of every closed concatemer id,
//!   so a split concatemer fails with `UnsortedAlignments`. The set adds
//!   memory linear in the number of concatemers.
//! - `Buffered` accepts any order and holds the whole stream until the
//!   end, emitting groups in first-seen order.

use crate::core::digest::CoordinateRecord;
use crate::core::error::{PoreCError, Result};
use crate::core::flags::{classify, AlignCategory, SemanticFlags, Strand};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

/// Aligner output for one monomer
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub read_name: String,
    pub concatemer_id: String,
    pub coords: CoordinateRecord,
    /// `None` when unmapped
    pub reference_name: Option<String>,
    /// 0-based leftmost reference position
    pub reference_start: u64,
    /// 0-based exclusive reference end, when known
    pub reference_end: Option<u64>,
    pub mapq: u8,
    pub flag: u16,
    /// Decoded from `flag` once, at construction
    pub flags: SemanticFlags,
}

impl AlignmentRecord {
    /// An unplaced record with the given FLAG
    pub fn new(
        read_name: impl Into<String>,
        concatemer_id: impl Into<String>,
        coords: CoordinateRecord,
        flag: u16,
    ) -> Self {
        Self {
            read_name: read_name.into(),
            concatemer_id: concatemer_id.into(),
            coords,
            reference_name: None,
            reference_start: 0,
            reference_end: None,
            mapq: 0,
            flag,
            flags: classify(flag),
        }
    }

    pub fn with_reference(
        mut self,
        reference_name: impl Into<String>,
        start: u64,
        end: Option<u64>,
    ) -> Self {
        self.reference_name = Some(reference_name.into());
        self.reference_start = start;
        self.reference_end = end;
        self
    }

    pub fn with_mapq(mut self, mapq: u8) -> Self {
        self.mapq = mapq;
        self
    }

    pub fn category(&self) -> AlignCategory {
        self.flags.category
    }

    pub fn strand(&self) -> Strand {
        self.flags.strand
    }

    /// Primary alignment placed on a reference; the only kind that can
    /// be a contact endpoint
    pub fn is_contact_endpoint(&self) -> bool {
        self.flags.category == AlignCategory::Primary && self.reference_name.is_some()
    }

    /// Reference end, falling back to start + monomer length
    pub fn reference_end_or_len(&self) -> u64 {
        self.reference_end.unwrap_or(
            self.reference_start + (self.coords.end - self.coords.start) as u64,
        )
    }
}

/// Shape of a concatemer after alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// No monomer has a primary mapped alignment
    AllUnmapped,
    /// Exactly one mapped monomer
    Singleton,
    /// Two or more mapped monomers
    Multiplex,
}

/// All alignments of one concatemer, in monomer order
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatemerAlignGroup {
    pub concatemer_id: String,
    /// Sorted by monomer start, then sub-read index; arrival order otherwise
    pub records: Vec<AlignmentRecord>,
}

impl ConcatemerAlignGroup {
    /// Order the records and check they describe one concatemer
    pub fn new(
        concatemer_id: impl Into<String>,
        mut records: Vec<AlignmentRecord>,
    ) -> Result<Self> {
        let concatemer_id = concatemer_id.into();
        records.sort_by_key(|r| (r.coords.start, r.coords.sub_read_index));
        if let Some(first) = records.first() {
            let (length, total) = (first.coords.concatemer_length, first.coords.sub_read_total);
            if let Some(bad) = records
                .iter()
                .find(|r| r.coords.concatemer_length != length || r.coords.sub_read_total != total)
            {
                return Err(PoreCError::coordinate(
                    &bad.read_name,
                    format!(
                        "concatemer {} has inconsistent length/sub-read totals ({}/{} vs {}/{})",
                        concatemer_id,
                        bad.coords.concatemer_length,
                        bad.coords.sub_read_total,
                        length,
                        total
                    ),
                ));
            }
        }
        Ok(Self {
            concatemer_id,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Contact endpoints in monomer order, at most one per monomer
    pub fn endpoints(&self) -> Vec<&AlignmentRecord> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| r.is_contact_endpoint())
            .filter(|r| seen.insert(r.coords.sub_read_index))
            .collect()
    }

    pub fn topology(&self) -> Topology {
        match self.endpoints().len() {
            0 => Topology::AllUnmapped,
            1 => Topology::Singleton,
            _ => Topology::Multiplex,
        }
    }

    /// Only secondary or supplementary records, nothing to anchor the monomers
    pub fn is_anomalous(&self) -> bool {
        !self.records.is_empty()
            && !self.records.iter().any(|r| {
                matches!(r.category(), AlignCategory::Primary | AlignCategory::Unmapped)
            })
    }
}

/// How the assembler buffers its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    /// Records of a concatemer are adjacent in the input
    #[default]
    Contiguous,
    /// Adjacent records, and reject a concatemer id seen after its group closed
    Checked,
    /// Arbitrary order; buffer everything until the end
    Buffered,
}

/// Iterator of [`ConcatemerAlignGroup`]s over an alignment stream
pub struct ConcatemerAssembler<I> {
    upstream: I,
    grouping: Grouping,
    current: Option<(String, Vec<AlignmentRecord>)>,
    closed: HashSet<String>,
    drained: Option<indexmap::map::IntoIter<String, Vec<AlignmentRecord>>>,
    done: bool,
}

impl<I> ConcatemerAssembler<I>
where
    I: Iterator<Item = Result<AlignmentRecord>>,
{
    pub fn new(upstream: I, grouping: Grouping) -> Self {
        Self {
            upstream,
            grouping,
            current: None,
            closed: HashSet::new(),
            drained: None,
            done: false,
        }
    }

    fn next_contiguous(&mut self) -> Option<Result<ConcatemerAlignGroup>> {
        loop {
            let record = match self.upstream.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return self
                        .current
                        .take()
                        .map(|(id, records)| ConcatemerAlignGroup::new(id, records));
                }
            };
            if let Some((id, records)) = self.current.as_mut() {
                if *id == record.concatemer_id {
                    records.push(record);
                    continue;
                }
            }
            if self.grouping == Grouping::Checked && self.closed.contains(&record.concatemer_id) {
                self.done = true;
                return Some(Err(PoreCError::UnsortedAlignments(record.concatemer_id)));
            }
            let id = record.concatemer_id.clone();
            if let Some((prev, records)) = self.current.replace((id, vec![record])) {
                if self.grouping == Grouping::Checked {
                    self.closed.insert(prev.clone());
                }
                return Some(ConcatemerAlignGroup::new(prev, records));
            }
        }
    }

    fn next_buffered(&mut self) -> Option<Result<ConcatemerAlignGroup>> {
        if self.drained.is_none() {
            let mut groups: IndexMap<String, Vec<AlignmentRecord>> = IndexMap::new();
            for record in self.upstream.by_ref() {
                match record {
                    Ok(record) => groups
                        .entry(record.concatemer_id.clone())
                        .or_default()
                        .push(record),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
            self.drained = Some(groups.into_iter());
        }
        let next = self.drained.as_mut().and_then(|it| it.next());
        if next.is_none() {
            self.done = true;
        }
        next.map(|(id, records)| ConcatemerAlignGroup::new(id, records))
    }
}

impl<I> Iterator for ConcatemerAssembler<I>
where
    I: Iterator<Item = Result<AlignmentRecord>>,
{
    type Item = Result<ConcatemerAlignGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = match self.grouping {
            Grouping::Contiguous | Grouping::Checked => self.next_contiguous(),
            Grouping::Buffered => self.next_buffered(),
        };
        if matches!(next, Some(Err(_))) {
            self.done = true;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flags::{FLAG_SUPPLEMENTARY, FLAG_UNMAPPED};

    fn coords(start: usize, end: usize, idx: usize) -> CoordinateRecord {
        CoordinateRecord {
            start,
            end,
            concatemer_length: 300,
            sub_read_index: idx,
            sub_read_total: 3,
        }
    }

    fn record(concatemer: &str, idx: usize, flag: u16) -> AlignmentRecord {
        let c = coords(idx * 100, idx * 100 + 100, idx);
        let r = AlignmentRecord::new(c.read_id(concatemer), concatemer, c, flag);
        if flag & FLAG_UNMAPPED == 0 {
            r.with_reference("chr1", 1000 * idx as u64, None)
        } else {
            r
        }
    }

    #[test]
    fn test_group_orders_by_start() {
        let group = ConcatemerAlignGroup::new(
            "a",
            vec![record("a", 2, 0), record("a", 0, 0), record("a", 1, 0)],
        )
        .unwrap();
        let order: Vec<usize> = group.records.iter().map(|r| r.coords.sub_read_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(group.topology(), Topology::Multiplex);
    }

    #[test]
    fn test_inconsistent_group_rejected() {
        let mut odd = record("a", 1, 0);
        odd.coords.concatemer_length = 999;
        let err = ConcatemerAlignGroup::new("a", vec![record("a", 0, 0), odd]);
        assert!(matches!(err, Err(PoreCError::InvalidCoordinateRecord { .. })));
    }

    #[test]
    fn test_endpoints_skip_unmapped_and_supplementary() {
        let group = ConcatemerAlignGroup::new(
            "a",
            vec![
                record("a", 0, 0),
                record("a", 0, FLAG_SUPPLEMENTARY),
                record("a", 1, FLAG_UNMAPPED),
                record("a", 2, 0),
            ],
        )
        .unwrap();
        let endpoints: Vec<usize> = group
            .endpoints()
            .iter()
            .map(|r| r.coords.sub_read_index)
            .collect();
        assert_eq!(endpoints, vec![0, 2]);
    }

    #[test]
    fn test_topology() {
        let unmapped = ConcatemerAlignGroup::new("a", vec![record("a", 0, FLAG_UNMAPPED)]).unwrap();
        assert_eq!(unmapped.topology(), Topology::AllUnmapped);
        let single = ConcatemerAlignGroup::new("a", vec![record("a", 0, 0)]).unwrap();
        assert_eq!(single.topology(), Topology::Singleton);
    }

    #[test]
    fn test_anomalous_group() {
        let only_supplementary =
            ConcatemerAlignGroup::new("c", vec![record("c", 0, FLAG_SUPPLEMENTARY)]).unwrap();
        assert!(only_supplementary.is_anomalous());
        let normal = ConcatemerAlignGroup::new(
            "c",
            vec![record("c", 0, FLAG_SUPPLEMENTARY), record("c", 1, FLAG_UNMAPPED)],
        )
        .unwrap();
        assert!(!normal.is_anomalous());
    }

    #[test]
    fn test_contiguous_grouping() {
        let input = vec![
            Ok(record("a", 1, 0)),
            Ok(record("a", 0, 0)),
            Ok(record("b", 0, 0)),
        ];
        let groups: Vec<_> = ConcatemerAssembler::new(input.into_iter(), Grouping::Contiguous)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].concatemer_id, "a");
        assert_eq!(groups[0].records[0].coords.sub_read_index, 0);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn test_contiguous_splits_interleaved() {
        let input = vec![
            Ok(record("a", 0, 0)),
            Ok(record("b", 0, 0)),
            Ok(record("a", 1, 0)),
        ];
        let ids: Vec<String> = ConcatemerAssembler::new(input.into_iter(), Grouping::Contiguous)
            .map(|g| g.unwrap().concatemer_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_checked_rejects_interleaved() {
        let input = vec![
            Ok(record("a", 0, 0)),
            Ok(record("b", 0, 0)),
            Ok(record("a", 1, 0)),
        ];
        let results: Vec<_> =
            ConcatemerAssembler::new(input.into_iter(), Grouping::Checked).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(PoreCError::UnsortedAlignments(ref id)) if id == "a"
        ));
    }

    #[test]
    fn test_buffered_accepts_interleaved() {
        let input = vec![
            Ok(record("a", 2, 0)),
            Ok(record("b", 0, 0)),
            Ok(record("a", 0, 0)),
        ];
        let groups: Vec<_> = ConcatemerAssembler::new(input.into_iter(), Grouping::Buffered)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].concatemer_id, "a");
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].records[0].coords.sub_read_index, 0);
    }

    #[test]
    fn test_upstream_error_ends_stream() {
        let input = vec![
            Ok(record("a", 0, 0)),
            Err(PoreCError::coordinate("x", "missing Xc tag")),
            Ok(record("b", 0, 0)),
        ];
        let results: Vec<_> =
            ConcatemerAssembler::new(input.into_iter(), Grouping::Contiguous).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
