//! Concatemer digestion
//!
//! Splits a concatemer at the cut sites of an [`EnzymeCutter`] into
//! contiguous monomers. Each monomer owns copies of its sequence,
//! qualities, per-base tags and modified-base calls, rebased to its own
//! coordinate frame, so nothing points back into the parent once the
//! concatemer record is dropped.

use crate::core::enzyme::EnzymeCutter;
use crate::core::error::{PoreCError, Result};
use crate::core::tags::{ArrayValue, ModBaseCalls, SamTag, TagValue, ML_TAGS, MM_TAGS};
use log::{debug, warn};
use serde::Serialize;
use std::collections::VecDeque;

/// Tag holding the parent concatemer id
pub const MOLECULE_TAG: &str = "MI";

/// Tag holding the [`CoordinateRecord`]
pub const COORDINATE_TAG: &str = "Xc";

/// Position of a monomer on its concatemer
///
/// Serialised as `Xc:B:i,start,end,concatemer_length,subread_idx,subread_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CoordinateRecord {
    pub start: usize,
    pub end: usize,
    pub concatemer_length: usize,
    pub sub_read_index: usize,
    pub sub_read_total: usize,
}

impl CoordinateRecord {
    /// Parse and validate the five integers of an `Xc` tag
    pub fn from_ints(read_name: &str, values: &[i64]) -> Result<Self> {
        if values.len() != 5 {
            return Err(PoreCError::coordinate(
                read_name,
                format!("expected 5 values, found {}", values.len()),
            ));
        }
        if values.iter().any(|&v| v < 0) {
            return Err(PoreCError::coordinate(read_name, "negative value"));
        }
        let record = Self {
            start: values[0] as usize,
            end: values[1] as usize,
            concatemer_length: values[2] as usize,
            sub_read_index: values[3] as usize,
            sub_read_total: values[4] as usize,
        };
        record.validate(read_name)?;
        Ok(record)
    }

    /// Check `start < end <= concatemer_length` and `index < total`
    pub fn validate(&self, read_name: &str) -> Result<()> {
        if self.start >= self.end {
            return Err(PoreCError::coordinate(
                read_name,
                format!("start {} is not before end {}", self.start, self.end),
            ));
        }
        if self.end > self.concatemer_length {
            return Err(PoreCError::coordinate(
                read_name,
                format!(
                    "end {} exceeds concatemer length {}",
                    self.end, self.concatemer_length
                ),
            ));
        }
        if self.sub_read_index >= self.sub_read_total {
            return Err(PoreCError::coordinate(
                read_name,
                format!(
                    "sub-read index {} out of {}",
                    self.sub_read_index, self.sub_read_total
                ),
            ));
        }
        Ok(())
    }

    pub fn to_tag(&self) -> SamTag {
        let values = [
            self.start,
            self.end,
            self.concatemer_length,
            self.sub_read_index,
            self.sub_read_total,
        ]
        .iter()
        .map(|&v| v as i32)
        .collect();
        SamTag::new(COORDINATE_TAG, TagValue::Array(ArrayValue::Int32(values)))
    }

    /// Monomer read id: `<concatemer_id>:<start>:<end>`, zero-padded so
    /// lexicographic order follows concatemer order
    ///
    /// # Examples
    /// ```
    /// use porec::core::CoordinateRecord;
    ///
    /// let coords = CoordinateRecord {
    ///     start: 5, end: 120, concatemer_length: 1000, sub_read_index: 1, sub_read_total: 3,
    /// };
    /// assert_eq!(coords.read_id("read1"), "read1:0005:0120");
    /// ```
    pub fn read_id(&self, concatemer_id: &str) -> String {
        let width = self.concatemer_length.to_string().len();
        format!(
            "{}:{:0width$}:{:0width$}",
            concatemer_id,
            self.start,
            self.end,
            width = width
        )
    }
}

/// Tag handling applied when a concatemer record is read
#[derive(Debug, Clone, Default)]
pub struct TagOptions {
    /// Tags dropped before digestion (e.g. the `mv` move table)
    pub remove_tags: Vec<String>,
    /// Array tags aligned 1:1 with the sequence, sliced per monomer
    pub per_base_tags: Vec<String>,
}

/// Digestion settings
#[derive(Debug, Clone)]
pub struct DigestOptions {
    /// Enzyme name, looked up in the registry
    pub enzyme: String,
    pub tags: TagOptions,
    /// Concatemers to read; 0 means all
    pub max_reads: usize,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            enzyme: "NlaIII".to_string(),
            tags: TagOptions::default(),
            max_reads: 0,
        }
    }
}

impl DigestOptions {
    pub fn validate(&self) -> Result<()> {
        EnzymeCutter::from_name(&self.enzyme)?;
        if let Some(tag) = self
            .tags
            .per_base_tags
            .iter()
            .find(|t| self.tags.remove_tags.contains(t))
        {
            return Err(PoreCError::InvalidConfig(format!(
                "tag {} is both removed and sliced per base",
                tag
            )));
        }
        if let Some(tag) = self
            .tags
            .per_base_tags
            .iter()
            .find(|t| t.len() != 2 || [MOLECULE_TAG, COORDINATE_TAG].contains(&t.as_str()))
        {
            return Err(PoreCError::InvalidConfig(format!(
                "{} cannot be used as a per-base tag",
                tag
            )));
        }
        Ok(())
    }

    /// Validate and build the digester
    pub fn digester(&self) -> Result<ConcatemerDigester> {
        self.validate()?;
        Ok(ConcatemerDigester::new(EnzymeCutter::from_name(&self.enzyme)?))
    }
}

/// An undigested read
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Concatemer {
    pub id: String,
    pub sequence: Vec<u8>,
    /// Phred scores without ASCII offset
    pub quality: Option<Vec<u8>>,
    pub mod_calls: Option<ModBaseCalls>,
    /// Dense per-base arrays, one entry per base
    pub per_base: Vec<(String, ArrayValue)>,
    /// Copied verbatim to every monomer
    pub tags: Vec<SamTag>,
}

impl Concatemer {
    pub fn new(id: impl Into<String>, sequence: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
            ..Default::default()
        }
    }

    /// Build from raw record parts, sorting tags into their roles
    pub fn from_parts(
        id: impl Into<String>,
        sequence: Vec<u8>,
        quality: Option<Vec<u8>>,
        tags: Vec<SamTag>,
        options: &TagOptions,
    ) -> Result<Self> {
        let id = id.into();
        let mut mm = None;
        let mut ml = None;
        let mut per_base = Vec::new();
        let mut shared = Vec::new();
        for tag in tags {
            if options.remove_tags.iter().any(|t| *t == tag.name) {
                continue;
            }
            if MM_TAGS.contains(&tag.name.as_str()) {
                mm = Some(tag);
            } else if ML_TAGS.contains(&tag.name.as_str()) {
                ml = Some(tag);
            } else if options.per_base_tags.iter().any(|t| *t == tag.name) {
                match tag.value {
                    TagValue::Array(values) if values.len() == sequence.len() => {
                        per_base.push((tag.name, values))
                    }
                    other => {
                        return Err(PoreCError::InvalidPerBaseTag {
                            read_name: id,
                            tag: tag.name,
                            message: format!(
                                "expected an array of {} values, found {:?}",
                                sequence.len(),
                                other
                            ),
                        })
                    }
                }
            } else {
                shared.push(tag);
            }
        }
        let mod_calls = match (mm, ml) {
            (Some(mm), ml) => {
                let text = mm
                    .value
                    .as_str()
                    .ok_or_else(|| PoreCError::modified_bases(&id, "MM is not a string tag"))?;
                let probs: Vec<u8> = match ml.map(|t| t.value) {
                    Some(TagValue::Array(ArrayValue::UInt8(values))) => values,
                    Some(_) => {
                        return Err(PoreCError::modified_bases(&id, "ML is not a B:C array"))
                    }
                    None => Vec::new(),
                };
                Some(ModBaseCalls::parse(&id, &sequence, text, &probs)?)
            }
            (None, Some(_)) => return Err(PoreCError::modified_bases(&id, "ML without MM")),
            (None, None) => None,
        };
        if let Some(q) = &quality {
            if q.len() != sequence.len() {
                return Err(PoreCError::InvalidPerBaseTag {
                    read_name: id,
                    tag: "QUAL".to_string(),
                    message: format!("{} qualities for {} bases", q.len(), sequence.len()),
                });
            }
        }
        Ok(Self {
            id,
            sequence,
            quality,
            mod_calls,
            per_base,
            tags: shared,
        })
    }
}

/// One fragment of a concatemer
#[derive(Debug, Clone, PartialEq)]
pub struct Monomer {
    pub read_id: String,
    pub concatemer_id: String,
    pub coords: CoordinateRecord,
    pub sequence: Vec<u8>,
    pub quality: Option<Vec<u8>>,
    pub mod_calls: Option<ModBaseCalls>,
    pub per_base: Vec<(String, ArrayValue)>,
    pub tags: Vec<SamTag>,
}

impl Monomer {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// All optional fields to write: shared tags, per-base slices, MM/ML, MI and Xc
    pub fn output_tags(&self) -> Result<Vec<SamTag>> {
        let mut tags = self.tags.clone();
        tags.extend(
            self.per_base
                .iter()
                .map(|(name, values)| SamTag::new(name.clone(), TagValue::Array(values.clone()))),
        );
        if let Some(calls) = &self.mod_calls {
            let (mm, ml) = calls.encode(&self.read_id, &self.sequence)?;
            tags.push(SamTag::new("MM", TagValue::String(mm)));
            tags.push(SamTag::new("ML", TagValue::Array(ArrayValue::UInt8(ml))));
        }
        tags.push(SamTag::new(
            MOLECULE_TAG,
            TagValue::String(self.concatemer_id.clone()),
        ));
        tags.push(self.coords.to_tag());
        Ok(tags)
    }
}

/// Split `concatemer` at the cut sites of `cutter`
///
/// Zero-length intervals are skipped; sub-read indices count emitted
/// monomers. An empty sequence yields no monomers.
pub fn digest(concatemer: &Concatemer, cutter: &EnzymeCutter) -> Vec<Monomer> {
    let seq = &concatemer.sequence;
    let mut boundaries = Vec::new();
    boundaries.push(0);
    boundaries.extend(cutter.get_cut_sites(seq));
    boundaries.push(seq.len());

    let intervals: Vec<(usize, usize)> = boundaries
        .windows(2)
        .map(|w| (w[0], w[1]))
        .filter(|(start, end)| start < end)
        .collect();
    let total = intervals.len();

    intervals
        .into_iter()
        .enumerate()
        .map(|(idx, (start, end))| {
            let coords = CoordinateRecord {
                start,
                end,
                concatemer_length: seq.len(),
                sub_read_index: idx,
                sub_read_total: total,
            };
            Monomer {
                read_id: coords.read_id(&concatemer.id),
                concatemer_id: concatemer.id.clone(),
                coords,
                sequence: seq[start..end].to_vec(),
                quality: concatemer.quality.as_ref().map(|q| q[start..end].to_vec()),
                mod_calls: concatemer.mod_calls.as_ref().map(|m| m.slice(start, end)),
                per_base: concatemer
                    .per_base
                    .iter()
                    .map(|(name, values)| (name.clone(), values.slice(start, end)))
                    .collect(),
                tags: concatemer.tags.clone(),
            }
        })
        .collect()
}

/// Digests concatemers with a fixed cutter
#[derive(Debug, Clone)]
pub struct ConcatemerDigester {
    cutter: EnzymeCutter,
}

impl ConcatemerDigester {
    pub fn new(cutter: EnzymeCutter) -> Self {
        Self { cutter }
    }

    pub fn cutter(&self) -> &EnzymeCutter {
        &self.cutter
    }

    pub fn digest(&self, concatemer: &Concatemer) -> Vec<Monomer> {
        digest(concatemer, &self.cutter)
    }

    /// Lazily digest a stream of concatemers
    ///
    /// `max_reads` of 0 means no limit.
    pub fn stream<I>(self, concatemers: I, max_reads: usize) -> MonomerStream<I>
    where
        I: Iterator<Item = Result<Concatemer>>,
    {
        MonomerStream {
            upstream: concatemers,
            digester: self,
            pending: VecDeque::new(),
            max_reads,
            stats: DigestStats::default(),
            done: false,
        }
    }
}

/// Digestion statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DigestStats {
    pub concatemers: usize,
    pub monomers: usize,
    pub bases: usize,
    /// Concatemers with no sequence
    pub skipped_empty: usize,
    /// Concatemers dropped for inconsistent MM/ML or per-base tags
    pub skipped_invalid: usize,
}

/// Iterator of monomers produced from an upstream concatemer iterator
///
/// Reads with bad modified-base or per-base tags are logged, counted and
/// skipped. Any other upstream error is yielded and ends the stream.
pub struct MonomerStream<I> {
    upstream: I,
    digester: ConcatemerDigester,
    pending: VecDeque<Monomer>,
    max_reads: usize,
    stats: DigestStats,
    done: bool,
}

impl<I> MonomerStream<I> {
    pub fn stats(&self) -> &DigestStats {
        &self.stats
    }
}

impl<I> Iterator for MonomerStream<I>
where
    I: Iterator<Item = Result<Concatemer>>,
{
    type Item = Result<Monomer>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(monomer) = self.pending.pop_front() {
                self.stats.monomers += 1;
                self.stats.bases += monomer.len();
                return Some(Ok(monomer));
            }
            if self.done || (self.max_reads > 0 && self.stats.concatemers >= self.max_reads) {
                return None;
            }
            match self.upstream.next()? {
                Ok(concatemer) => {
                    self.stats.concatemers += 1;
                    if concatemer.sequence.is_empty() {
                        debug!("Skipping {}: empty sequence", concatemer.id);
                        self.stats.skipped_empty += 1;
                        continue;
                    }
                    self.pending.extend(self.digester.digest(&concatemer));
                }
                Err(e) if e.is_record_anomaly() => {
                    warn!("Skipping read: {}", e);
                    self.stats.concatemers += 1;
                    self.stats.skipped_invalid += 1;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
