//! Core Pore-C algorithms
//!
//! Restriction-site search and concatemer digestion on the read side;
//! flag classification, concatemer grouping and contact derivation on
//! the alignment side.

pub mod assembler;
pub mod contacts;
pub mod digest;
pub mod dna;
pub mod enzyme;
mod error;
pub mod flags;
pub mod io;
pub mod summary;
pub mod tags;

pub use assembler::{
    AlignmentRecord, ConcatemerAlignGroup, ConcatemerAssembler, Grouping, Topology,
};
pub use contacts::{merge_segments, AnnotateOptions, ContactAnnotator, ContactPair, Segment};
pub use digest::{
    digest, Concatemer, ConcatemerDigester, CoordinateRecord, DigestOptions, DigestStats, Monomer,
    MonomerStream, TagOptions, COORDINATE_TAG, MOLECULE_TAG,
};
pub use enzyme::{lookup_enzyme, CutOffset, Enzyme, EnzymeCutter, RecognitionMatcher, SiteMatch};
pub use error::{PoreCError, Result};
pub use flags::{classify, AlignCategory, SemanticFlags, Strand};
pub use io::{create_writer, find_files, open_reader, ByteLineIterator, CompressionFormat};
pub use summary::{Summary, SummaryAggregator};
pub use tags::{ArrayValue, ModBaseCalls, SamTag, TagValue};
