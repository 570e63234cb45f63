//! Restriction enzyme registry and recognition-site search
//!
//! Enzymes are plain data (recognition site + cut offset) looked up by
//! name from a fixed table. A [`RecognitionMatcher`] compiles the site
//! into IUPAC base-sets and scans both strands; an [`EnzymeCutter`]
//! turns the matches into cut-site offsets.

use crate::core::dna::{self, BaseSet};
use crate::core::error::{PoreCError, Result};
use crate::core::flags::Strand;

/// Where an enzyme cuts relative to the start of its recognition site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutOffset {
    /// Single top-strand cut at this offset (may lie outside the site)
    At(i32),
    /// Enzyme excises its site with cuts on both sides; not supported
    Bilateral,
}

/// A restriction enzyme from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enzyme {
    pub name: &'static str,
    /// Recognition site in IUPAC DNA, 5'->3'
    pub site: &'static str,
    pub cut: CutOffset,
}

const fn enzyme(name: &'static str, site: &'static str, cut: i32) -> Enzyme {
    Enzyme {
        name,
        site,
        cut: CutOffset::At(cut),
    }
}

/// Enzymes known to porec
pub static ENZYMES: &[Enzyme] = &[
    enzyme("NlaIII", "CATG", 4),
    enzyme("FatI", "CATG", 0),
    enzyme("DpnII", "GATC", 0),
    enzyme("MboI", "GATC", 0),
    enzyme("Sau3AI", "GATC", 0),
    enzyme("HindIII", "AAGCTT", 1),
    enzyme("EcoRI", "GAATTC", 1),
    enzyme("BamHI", "GGATCC", 1),
    enzyme("BglII", "AGATCT", 1),
    enzyme("NcoI", "CCATGG", 1),
    enzyme("XhoI", "CTCGAG", 1),
    enzyme("XbaI", "TCTAGA", 1),
    enzyme("PstI", "CTGCAG", 5),
    enzyme("SacI", "GAGCTC", 5),
    enzyme("KpnI", "GGTACC", 5),
    enzyme("NotI", "GCGGCCGC", 2),
    enzyme("EcoRV", "GATATC", 3),
    enzyme("SmaI", "CCCGGG", 3),
    enzyme("AluI", "AGCT", 2),
    enzyme("HaeIII", "GGCC", 2),
    enzyme("MseI", "TTAA", 1),
    enzyme("MluCI", "AATT", 0),
    enzyme("CviQI", "GTAC", 1),
    enzyme("Csp6I", "GTAC", 1),
    enzyme("HpyCH4IV", "ACGT", 1),
    enzyme("BstUI", "CGCG", 2),
    enzyme("HinfI", "GANTC", 1),
    enzyme("DdeI", "CTNAG", 1),
    enzyme("ApeKI", "GCWGC", 1),
    enzyme("BsaI", "GGTCTC", 7),
    enzyme("BsmBI", "CGTCTC", 7),
    Enzyme {
        name: "AloI",
        site: "GAACNNNNNNTCC",
        cut: CutOffset::Bilateral,
    },
];

/// Look up an enzyme by name (case-sensitive, as in REBASE)
pub fn lookup_enzyme(name: &str) -> Option<&'static Enzyme> {
    ENZYMES.iter().find(|e| e.name == name)
}

/// One occurrence of a recognition site
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SiteMatch {
    /// Start of the site in forward-strand coordinates
    pub position: usize,
    /// Strand the site was read on
    pub strand: Strand,
}

/// Exhaustive IUPAC-aware scanner for one recognition pattern
#[derive(Debug, Clone)]
pub struct RecognitionMatcher {
    forward: Vec<BaseSet>,
    /// `None` when the pattern is its own reverse complement
    reverse: Option<Vec<BaseSet>>,
}

impl RecognitionMatcher {
    /// Compile a pattern, returning `None` if it contains a non-IUPAC character
    pub fn new(pattern: &[u8]) -> Option<Self> {
        if pattern.is_empty() {
            return None;
        }
        let forward = pattern
            .iter()
            .map(|&b| dna::iupac_base_set(b))
            .collect::<Option<Vec<_>>>()?;
        let reverse = if dna::is_palindrome(pattern) {
            None
        } else {
            let rc = dna::revcomp(pattern);
            Some(
                rc.iter()
                    .map(|&b| dna::iupac_base_set(b))
                    .collect::<Option<Vec<_>>>()?,
            )
        };
        Some(Self { forward, reverse })
    }

    /// Length of the recognition site
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn is_palindromic(&self) -> bool {
        self.reverse.is_none()
    }

    /// All occurrences on both strands, sorted by position then strand
    ///
    /// Overlapping occurrences are all reported.
    pub fn find(&self, seq: &[u8]) -> Vec<SiteMatch> {
        let mut hits = Vec::new();
        scan(&self.forward, seq, Strand::Plus, &mut hits);
        if let Some(reverse) = &self.reverse {
            scan(reverse, seq, Strand::Minus, &mut hits);
            hits.sort_unstable();
        }
        hits
    }
}

fn scan(pattern: &[BaseSet], seq: &[u8], strand: Strand, hits: &mut Vec<SiteMatch>) {
    if seq.len() < pattern.len() {
        return;
    }
    for start in 0..=seq.len() - pattern.len() {
        let window = &seq[start..start + pattern.len()];
        if pattern
            .iter()
            .zip(window)
            .all(|(&allowed, &base)| allowed & dna::read_base_set(base) != 0)
        {
            hits.push(SiteMatch {
                position: start,
                strand,
            });
        }
    }
}

/// Computes cut-site coordinates for a named enzyme
#[derive(Debug, Clone)]
pub struct EnzymeCutter {
    enzyme: &'static Enzyme,
    cut_offset: i64,
    matcher: RecognitionMatcher,
}

impl EnzymeCutter {
    /// Build a cutter from the registry
    ///
    /// # Errors
    /// `UnsupportedEnzyme` if the name is unknown or the enzyme does not
    /// make a single cut per site.
    pub fn from_name(name: &str) -> Result<Self> {
        let enzyme =
            lookup_enzyme(name).ok_or_else(|| PoreCError::UnsupportedEnzyme(name.to_string()))?;
        let cut_offset = match enzyme.cut {
            CutOffset::At(offset) => offset as i64,
            CutOffset::Bilateral => return Err(PoreCError::UnsupportedEnzyme(name.to_string())),
        };
        let matcher = RecognitionMatcher::new(enzyme.site.as_bytes())
            .ok_or_else(|| PoreCError::UnsupportedEnzyme(name.to_string()))?;
        Ok(Self {
            enzyme,
            cut_offset,
            matcher,
        })
    }

    pub fn enzyme(&self) -> &'static Enzyme {
        self.enzyme
    }

    pub fn matcher(&self) -> &RecognitionMatcher {
        &self.matcher
    }

    /// Cut offsets for `seq`: strictly increasing, within `[0, seq.len()]`
    ///
    /// Reverse-strand sites cut at `start + site_len - cut_offset`.
    pub fn get_cut_sites(&self, seq: &[u8]) -> Vec<usize> {
        let len = seq.len() as i64;
        let site_len = self.matcher.len() as i64;
        let mut sites: Vec<usize> = self
            .matcher
            .find(seq)
            .into_iter()
            .map(|hit| {
                let pos = hit.position as i64;
                let cut = match hit.strand {
                    Strand::Minus => pos + site_len - self.cut_offset,
                    _ => pos + self.cut_offset,
                };
                cut.clamp(0, len) as usize
            })
            .collect();
        sites.sort_unstable();
        sites.dedup();
        sites
    }
}
