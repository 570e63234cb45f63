//! Contact derivation
//!
//! Turns a [`ConcatemerAlignGroup`] into pairwise contacts between its
//! mapped monomers. Only primary, placed alignments are endpoints;
//! unmapped monomers are skipped without breaking adjacency, so direct
//! contacts join consecutive mapped monomers.
//!
//! With a non-zero merge distance, endpoints on the same reference and
//! strand whose gap is at most that distance are first clustered into a
//! single segment (chromunity merge) and contacts are taken between the
//! merged segments.

use crate::core::assembler::{AlignmentRecord, ConcatemerAlignGroup};
use crate::core::error::{PoreCError, Result};
use crate::core::flags::Strand;
use std::collections::BTreeMap;

/// Annotation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotateOptions {
    /// Largest gap bridged by the chromunity merge; 0 disables merging
    pub merge_distance: u64,
    /// Emit only direct contacts
    pub direct_only: bool,
    /// Minimum cis distance in the paired-end view
    pub paired_end_min_distance: Option<u64>,
    /// Maximum cis distance in the paired-end view
    pub paired_end_max_distance: Option<u64>,
}

impl AnnotateOptions {
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.paired_end_min_distance, self.paired_end_max_distance)
        {
            if min > max {
                return Err(PoreCError::InvalidConfig(format!(
                    "paired-end minimum distance {} exceeds maximum {}",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

/// A mapped stretch of a concatemer: one monomer alignment, or several
/// merged ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Read name of the first monomer in the segment
    pub read_name: String,
    /// Lowest sub-read index in the segment
    pub sub_read_index: usize,
    pub reference_name: String,
    pub strand: Strand,
    pub start: u64,
    pub end: u64,
    pub mapq: u8,
    pub num_monomers: usize,
}

impl Segment {
    /// Segment for a contact endpoint; `None` for anything else
    pub fn from_record(record: &AlignmentRecord) -> Option<Self> {
        if !record.is_contact_endpoint() {
            return None;
        }
        Some(Self {
            read_name: record.read_name.clone(),
            sub_read_index: record.coords.sub_read_index,
            reference_name: record.reference_name.clone()?,
            strand: record.strand(),
            start: record.reference_start,
            end: record.reference_end_or_len(),
            mapq: record.mapq,
            num_monomers: 1,
        })
    }
}

/// Cluster segments on the same reference and strand whose gap is at
/// most `merge_distance`, returning them in concatemer order
///
/// A distance of 0 returns the input unchanged. Merging is transitive
/// and idempotent.
pub fn merge_segments(segments: Vec<Segment>, merge_distance: u64) -> Vec<Segment> {
    if merge_distance == 0 || segments.len() < 2 {
        return segments;
    }

    let mut by_locus: BTreeMap<(String, Strand), Vec<Segment>> = BTreeMap::new();
    for seg in segments {
        by_locus
            .entry((seg.reference_name.clone(), seg.strand))
            .or_default()
            .push(seg);
    }

    let mut merged = Vec::new();
    for (_, mut segs) in by_locus {
        segs.sort_by_key(|s| (s.start, s.sub_read_index));
        let mut current: Option<Segment> = None;
        for seg in segs {
            match current.take() {
                None => current = Some(seg),
                Some(mut curr) => {
                    if seg.start <= curr.end.saturating_add(merge_distance) {
                        curr.end = curr.end.max(seg.end);
                        curr.mapq = curr.mapq.max(seg.mapq);
                        curr.num_monomers += seg.num_monomers;
                        if seg.sub_read_index < curr.sub_read_index {
                            curr.sub_read_index = seg.sub_read_index;
                            curr.read_name = seg.read_name;
                        }
                        current = Some(curr);
                    } else {
                        merged.push(curr);
                        current = Some(seg);
                    }
                }
            }
        }
        if let Some(curr) = current {
            merged.push(curr);
        }
    }
    merged.sort_by_key(|s| s.sub_read_index);
    merged
}

/// A pairwise contact between two segments of one concatemer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactPair {
    pub concatemer_id: String,
    /// Earlier segment in concatemer order
    pub left: Segment,
    pub right: Segment,
    /// Consecutive among the concatemer's mapped segments
    pub is_direct: bool,
    /// Both ends on the same reference sequence
    pub is_cis: bool,
    /// |left.start - right.start| for cis contacts
    pub distance: Option<u64>,
}

impl ContactPair {
    fn new(concatemer_id: &str, left: &Segment, right: &Segment, is_direct: bool) -> Self {
        let is_cis = left.reference_name == right.reference_name;
        Self {
            concatemer_id: concatemer_id.to_string(),
            left: left.clone(),
            right: right.clone(),
            is_direct,
            is_cis,
            distance: is_cis.then(|| left.start.abs_diff(right.start)),
        }
    }
}

/// Derives contacts from alignment groups
#[derive(Debug, Clone, Default)]
pub struct ContactAnnotator {
    options: AnnotateOptions,
}

impl ContactAnnotator {
    /// Validate `options` and build an annotator
    pub fn new(options: AnnotateOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Mapped segments of a group in concatemer order, merged if configured
    pub fn segments(&self, group: &ConcatemerAlignGroup) -> Vec<Segment> {
        let segments = group
            .endpoints()
            .into_iter()
            .filter_map(Segment::from_record)
            .collect();
        merge_segments(segments, self.options.merge_distance)
    }

    /// Contacts of a group, honouring `direct_only`
    pub fn annotate(&self, group: &ConcatemerAlignGroup) -> Vec<ContactPair> {
        let contacts = self.all_contacts(group);
        if self.options.direct_only {
            contacts.into_iter().filter(|c| c.is_direct).collect()
        } else {
            contacts
        }
    }

    /// Direct contacts only, regardless of `direct_only`
    pub fn annotate_direct(&self, group: &ConcatemerAlignGroup) -> Vec<ContactPair> {
        self.all_contacts(group)
            .into_iter()
            .filter(|c| c.is_direct)
            .collect()
    }

    fn all_contacts(&self, group: &ConcatemerAlignGroup) -> Vec<ContactPair> {
        let segments = self.segments(group);
        let n = segments.len();
        let mut contacts = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for (i, left) in segments.iter().enumerate() {
            for (j, right) in segments.iter().enumerate().skip(i + 1) {
                contacts.push(ContactPair::new(&group.concatemer_id, left, right, j == i + 1));
            }
        }
        contacts
    }

    /// Whether a contact belongs in the paired-end view
    ///
    /// Trans contacts always pass; cis contacts must fall inside the
    /// configured distance bounds.
    pub fn in_paired_end_view(&self, contact: &ContactPair) -> bool {
        match contact.distance {
            None => true,
            Some(d) => {
                self.options.paired_end_min_distance.map_or(true, |min| d >= min)
                    && self.options.paired_end_max_distance.map_or(true, |max| d <= max)
            }
        }
    }

    /// Contacts that pass [`Self::in_paired_end_view`]
    pub fn paired_end_view<'a>(&self, contacts: &'a [ContactPair]) -> Vec<&'a ContactPair> {
        contacts
            .iter()
            .filter(|c| self.in_paired_end_view(c))
            .collect()
    }
}
