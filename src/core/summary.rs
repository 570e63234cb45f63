//! Run summary counts
//!
//! Counts alignments, concatemer topologies and contacts across a
//! stream and serialises the totals as JSON.

use crate::core::assembler::{ConcatemerAlignGroup, Topology};
use crate::core::contacts::ContactPair;
use crate::core::error::Result;
use crate::core::flags::{AlignCategory, Strand};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub primary: usize,
    pub unmapped: usize,
    pub supplementary: usize,
    pub secondary: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StrandCounts {
    #[serde(rename = "+")]
    pub plus: usize,
    #[serde(rename = "-")]
    pub minus: usize,
    #[serde(rename = ".")]
    pub unknown: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopologyCounts {
    pub all_unmapped: usize,
    pub singleton: usize,
    pub multiplex: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactCounts {
    pub total: usize,
    pub direct: usize,
    pub indirect: usize,
    pub cis: usize,
    pub trans: usize,
}

/// Cis contacts by distance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DistanceBuckets {
    #[serde(rename = "lt_1kb")]
    pub below_1kb: usize,
    #[serde(rename = "1kb_10kb")]
    pub from_1kb: usize,
    #[serde(rename = "10kb_100kb")]
    pub from_10kb: usize,
    #[serde(rename = "gte_100kb")]
    pub from_100kb: usize,
}

impl DistanceBuckets {
    fn add(&mut self, distance: u64) {
        match distance {
            0..=999 => self.below_1kb += 1,
            1_000..=9_999 => self.from_1kb += 1,
            10_000..=99_999 => self.from_10kb += 1,
            _ => self.from_100kb += 1,
        }
    }
}

/// Totals for one `parse-bam` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub concatemers: usize,
    pub alignments: usize,
    pub categories: CategoryCounts,
    pub strands: StrandCounts,
    pub topology: TopologyCounts,
    pub contacts: ContactCounts,
    pub cis_distance: DistanceBuckets,
    /// Groups with alignments but no primary or unmapped record
    pub anomalous_groups: usize,
}

/// Accumulates a [`Summary`] group by group
#[derive(Debug, Clone, Default)]
pub struct SummaryAggregator {
    summary: Summary,
}

impl SummaryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a group and the contacts emitted for it
    pub fn add_group(&mut self, group: &ConcatemerAlignGroup, contacts: &[ContactPair]) {
        let s = &mut self.summary;
        s.concatemers += 1;
        for record in &group.records {
            s.alignments += 1;
            match record.category() {
                AlignCategory::Primary => s.categories.primary += 1,
                AlignCategory::Unmapped => s.categories.unmapped += 1,
                AlignCategory::Supplementary => s.categories.supplementary += 1,
                AlignCategory::Secondary => s.categories.secondary += 1,
            }
            match record.strand() {
                Strand::Plus => s.strands.plus += 1,
                Strand::Minus => s.strands.minus += 1,
                Strand::Unknown => s.strands.unknown += 1,
            }
        }
        match group.topology() {
            Topology::AllUnmapped => s.topology.all_unmapped += 1,
            Topology::Singleton => s.topology.singleton += 1,
            Topology::Multiplex => s.topology.multiplex += 1,
        }
        for contact in contacts {
            s.contacts.total += 1;
            if contact.is_direct {
                s.contacts.direct += 1;
            } else {
                s.contacts.indirect += 1;
            }
            match contact.distance {
                Some(distance) => {
                    s.contacts.cis += 1;
                    s.cis_distance.add(distance);
                }
                None => s.contacts.trans += 1,
            }
        }
    }

    /// Count a group skipped as anomalous
    pub fn add_anomaly(&mut self) {
        self.summary.anomalous_groups += 1;
    }

    pub fn finish(self) -> Summary {
        self.summary
    }
}

impl Summary {
    /// Pretty-printed JSON
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}
