//! Record-stream adapters
//!
//! FASTQ with tags in the header comment, BAM/SAM/CRAM through
//! rust-htslib, and tab-separated contact outputs.

#[cfg(feature = "bam")]
pub mod bam;
pub mod fastq;
pub mod pairs;

#[cfg(feature = "bam")]
pub use bam::{
    alignment_header, is_alignment_path, AlignmentReader, AnnotatedBamWriter, MonomerBamWriter,
    UnalignedBamReader,
};
pub use fastq::{FastqReader, FastqWriter};
pub use pairs::{ChromunityWriter, PairsWriter};
