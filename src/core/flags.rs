//! Alignment flag classification
//!
//! Decodes the SAM FLAG bitmask into named booleans plus the derived
//! alignment category and strand. All 4096 possible 12-bit masks are
//! decoded once into a lookup table.

use serde::Serialize;
use std::sync::OnceLock;

pub const FLAG_PAIRED: u16 = 0x1;
pub const FLAG_PROPER_PAIR: u16 = 0x2;
pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;
pub const FLAG_REVERSE: u16 = 0x10;
pub const FLAG_MATE_REVERSE: u16 = 0x20;
pub const FLAG_READ1: u16 = 0x40;
pub const FLAG_READ2: u16 = 0x80;
pub const FLAG_SECONDARY: u16 = 0x100;
pub const FLAG_QC_FAIL: u16 = 0x200;
pub const FLAG_DUPLICATE: u16 = 0x400;
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

const FLAG_MASK: u16 = 0xFFF;

/// Strand orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum Strand {
    #[default]
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    /// No strand (unmapped)
    #[serde(rename = ".")]
    Unknown,
}

impl Strand {
    /// Convert to char
    pub fn to_char(&self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
            Strand::Unknown => '.',
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Coarse alignment category
///
/// Precedence when several bits are set: secondary, then supplementary,
/// then unmapped, otherwise primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignCategory {
    Primary,
    Unmapped,
    Supplementary,
    Secondary,
}

impl AlignCategory {
    pub const ALL: [AlignCategory; 4] = [
        AlignCategory::Primary,
        AlignCategory::Unmapped,
        AlignCategory::Supplementary,
        AlignCategory::Secondary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlignCategory::Primary => "primary",
            AlignCategory::Unmapped => "unmapped",
            AlignCategory::Supplementary => "supplementary",
            AlignCategory::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for AlignCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named view of a SAM FLAG with its derived category and strand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemanticFlags {
    pub paired: bool,
    pub proper_pair: bool,
    pub unmapped: bool,
    pub mate_unmapped: bool,
    pub reverse: bool,
    pub mate_reverse: bool,
    pub read1: bool,
    pub read2: bool,
    pub secondary: bool,
    pub qc_fail: bool,
    pub duplicate: bool,
    pub supplementary: bool,
    pub category: AlignCategory,
    pub strand: Strand,
}

impl SemanticFlags {
    fn decode(bits: u16) -> Self {
        let has = |flag: u16| bits & flag != 0;
        let (secondary, supplementary, unmapped, reverse) = (
            has(FLAG_SECONDARY),
            has(FLAG_SUPPLEMENTARY),
            has(FLAG_UNMAPPED),
            has(FLAG_REVERSE),
        );
        let category = if secondary {
            AlignCategory::Secondary
        } else if supplementary {
            AlignCategory::Supplementary
        } else if unmapped {
            AlignCategory::Unmapped
        } else {
            AlignCategory::Primary
        };
        let strand = if unmapped {
            Strand::Unknown
        } else if reverse {
            Strand::Minus
        } else {
            Strand::Plus
        };
        Self {
            paired: has(FLAG_PAIRED),
            proper_pair: has(FLAG_PROPER_PAIR),
            unmapped,
            mate_unmapped: has(FLAG_MATE_UNMAPPED),
            reverse,
            mate_reverse: has(FLAG_MATE_REVERSE),
            read1: has(FLAG_READ1),
            read2: has(FLAG_READ2),
            secondary,
            qc_fail: has(FLAG_QC_FAIL),
            duplicate: has(FLAG_DUPLICATE),
            supplementary,
            category,
            strand,
        }
    }

    /// Re-encode the boolean fields as a SAM FLAG
    pub fn to_bits(&self) -> u16 {
        [
            (self.paired, FLAG_PAIRED),
            (self.proper_pair, FLAG_PROPER_PAIR),
            (self.unmapped, FLAG_UNMAPPED),
            (self.mate_unmapped, FLAG_MATE_UNMAPPED),
            (self.reverse, FLAG_REVERSE),
            (self.mate_reverse, FLAG_MATE_REVERSE),
            (self.read1, FLAG_READ1),
            (self.read2, FLAG_READ2),
            (self.secondary, FLAG_SECONDARY),
            (self.qc_fail, FLAG_QC_FAIL),
            (self.duplicate, FLAG_DUPLICATE),
            (self.supplementary, FLAG_SUPPLEMENTARY),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }

    /// Neither secondary nor supplementary
    pub fn is_primary(&self) -> bool {
        !(self.secondary || self.supplementary)
    }
}

fn table() -> &'static [SemanticFlags] {
    static TABLE: OnceLock<Vec<SemanticFlags>> = OnceLock::new();
    TABLE.get_or_init(|| (0..=FLAG_MASK).map(SemanticFlags::decode).collect())
}

/// Classify a SAM FLAG
///
/// Bits above 0x800 are ignored.
///
/// # Examples
/// ```
/// use porec::core::{classify, AlignCategory, Strand};
///
/// let flags = classify(0x10);
/// assert_eq!(flags.category, AlignCategory::Primary);
/// assert_eq!(flags.strand, Strand::Minus);
/// assert_eq!(classify(0x900).category, AlignCategory::Secondary);
/// ```
#[inline]
pub fn classify(bits: u16) -> SemanticFlags {
    table()[(bits & FLAG_MASK) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped() {
        let flags = classify(FLAG_UNMAPPED);
        assert_eq!(flags.category, AlignCategory::Unmapped);
        assert_eq!(flags.strand, Strand::Unknown);
        assert!(flags.is_primary());
    }

    #[test]
    fn test_category_precedence() {
        assert_eq!(
            classify(FLAG_SUPPLEMENTARY | FLAG_UNMAPPED).category,
            AlignCategory::Supplementary
        );
        assert_eq!(
            classify(FLAG_SECONDARY | FLAG_SUPPLEMENTARY | FLAG_UNMAPPED).category,
            AlignCategory::Secondary
        );
        assert_eq!(classify(0).category, AlignCategory::Primary);
    }

    #[test]
    fn test_to_bits_roundtrip() {
        for bits in [0u16, 4, 16, 256, 2048, 2064, 0xFFF] {
            assert_eq!(classify(bits).to_bits(), bits);
        }
    }

    #[test]
    fn test_high_bits_ignored() {
        assert_eq!(classify(0xF010), classify(0x010));
    }
}
