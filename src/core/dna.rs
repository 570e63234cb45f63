//! DNA sequence utilities
//!
//! Complementing, IUPAC ambiguity base-sets and palindrome checks used
//! by the recognition-site matcher.

/// Bit for each concrete base inside a [`BaseSet`]
pub const BASE_A: u8 = 0b0001;
pub const BASE_C: u8 = 0b0010;
pub const BASE_G: u8 = 0b0100;
pub const BASE_T: u8 = 0b1000;

/// A subset of {A, C, G, T} packed into the low four bits
pub type BaseSet = u8;

/// Complement a single DNA base
///
/// Supports standard bases (A, T, G, C) and IUPAC ambiguity codes.
/// Returns the same character for non-DNA characters.
#[inline]
pub fn complement_base(base: u8) -> u8 {
    let upper = base.to_ascii_uppercase();
    let comp = match upper {
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'G' => b'C',
        b'C' => b'G',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        // S, W and N are self-complementary
        _ => upper,
    };
    if base.is_ascii_lowercase() {
        comp.to_ascii_lowercase()
    } else {
        comp
    }
}

/// Reverse complement of a byte sequence
///
/// # Examples
/// ```
/// use porec::core::dna::revcomp;
///
/// assert_eq!(revcomp(b"AACGT"), b"ACGTT".to_vec());
/// assert_eq!(revcomp(b"GANTC"), b"GANTC".to_vec());
/// assert!(revcomp(b"").is_empty());
/// ```
pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement_base(b)).collect()
}

/// Resolve an IUPAC code to the set of concrete bases it stands for
///
/// Case-insensitive. Returns `None` for characters outside the IUPAC
/// nucleotide alphabet.
///
/// # Examples
/// ```
/// use porec::core::dna::{iupac_base_set, BASE_A, BASE_G};
///
/// assert_eq!(iupac_base_set(b'r'), Some(BASE_A | BASE_G));
/// assert_eq!(iupac_base_set(b'X'), None);
/// ```
#[inline]
pub fn iupac_base_set(code: u8) -> Option<BaseSet> {
    let set = match code.to_ascii_uppercase() {
        b'A' => BASE_A,
        b'C' => BASE_C,
        b'G' => BASE_G,
        b'T' | b'U' => BASE_T,
        b'R' => BASE_A | BASE_G,
        b'Y' => BASE_C | BASE_T,
        b'S' => BASE_C | BASE_G,
        b'W' => BASE_A | BASE_T,
        b'K' => BASE_G | BASE_T,
        b'M' => BASE_A | BASE_C,
        b'B' => BASE_C | BASE_G | BASE_T,
        b'D' => BASE_A | BASE_G | BASE_T,
        b'H' => BASE_A | BASE_C | BASE_T,
        b'V' => BASE_A | BASE_C | BASE_G,
        b'N' => BASE_A | BASE_C | BASE_G | BASE_T,
        _ => return None,
    };
    Some(set)
}

/// Base-set of a single sequenced base
///
/// Only concrete bases match anything; an `N` in a read never satisfies
/// a recognition pattern position.
#[inline]
pub fn read_base_set(base: u8) -> BaseSet {
    match base {
        b'A' | b'a' => BASE_A,
        b'C' | b'c' => BASE_C,
        b'G' | b'g' => BASE_G,
        b'T' | b't' | b'U' | b'u' => BASE_T,
        _ => 0,
    }
}

/// Check if a pattern equals its own reverse complement
///
/// Case-insensitive, and IUPAC-aware through [`complement_base`].
pub fn is_palindrome(pattern: &[u8]) -> bool {
    pattern
        .iter()
        .zip(pattern.iter().rev())
        .all(|(&a, &b)| a.to_ascii_uppercase() == complement_base(b).to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement_base_standard() {
        assert_eq!(complement_base(b'A'), b'T');
        assert_eq!(complement_base(b'T'), b'A');
        assert_eq!(complement_base(b'G'), b'C');
        assert_eq!(complement_base(b'C'), b'G');
        assert_eq!(complement_base(b'g'), b'c');
    }

    #[test]
    fn test_complement_base_iupac() {
        assert_eq!(complement_base(b'R'), b'Y');
        assert_eq!(complement_base(b'k'), b'm');
        assert_eq!(complement_base(b'N'), b'N');
        assert_eq!(complement_base(b'S'), b'S');
    }

    #[test]
    fn test_revcomp_mixed_case() {
        assert_eq!(revcomp(b"AaCcGgTt"), b"aAcCgGtT".to_vec());
    }

    #[test]
    fn test_palindromes() {
        assert!(is_palindrome(b"CATG"));
        assert!(is_palindrome(b"GAATTC"));
        assert!(is_palindrome(b"GANTC"));
        assert!(is_palindrome(b"GCWGC"));
        assert!(!is_palindrome(b"GGTCTC"));
        assert!(!is_palindrome(b"GAAC"));
    }

    #[test]
    fn test_base_sets() {
        assert_eq!(iupac_base_set(b'N'), Some(0b1111));
        assert_eq!(iupac_base_set(b'w'), Some(BASE_A | BASE_T));
        assert_eq!(read_base_set(b'N'), 0);
        assert_eq!(read_base_set(b'g'), BASE_G);
    }
}
