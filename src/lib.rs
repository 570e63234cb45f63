//! porec - Pore-C concatemer digestion and contact calling
//!
//! Splits long Pore-C reads (concatemers) into monomers at restriction
//! sites, then regroups the aligned monomers by concatemer and derives
//! pairwise contacts from them.
//!
//! # Example
//!
//! ```
//! use porec::{Concatemer, EnzymeCutter, digest};
//!
//! let cutter = EnzymeCutter::from_name("NlaIII").unwrap();
//! let read = Concatemer::new("read1", b"AACATGTTCATGGG".to_vec());
//! let monomers = digest(&read, &cutter);
//! assert_eq!(monomers.len(), 3);
//! assert_eq!(monomers[1].read_id, "read1:06:12");
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use core::{
    classify, digest, AlignCategory, AlignmentRecord, AnnotateOptions, Concatemer,
    ConcatemerAlignGroup, ConcatemerAssembler, ConcatemerDigester, ContactAnnotator, ContactPair,
    CoordinateRecord, DigestOptions, EnzymeCutter, Monomer, PoreCError, Result, Strand,
};
