//! Error types for porec
//!
//! Defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for porec operations
#[derive(Debug, Error)]
pub enum PoreCError {
    /// Enzyme name missing from the registry, or its site cannot be expressed as a single cut
    #[error("Unsupported enzyme: {0}")]
    UnsupportedEnzyme(String),

    /// More than one alignment file would contribute a header
    #[error("Too many source headers, expected at most one BAM/SAM/CRAM input: {0:?}")]
    TooManySourceHeaders(Vec<PathBuf>),

    /// Coordinate record (Xc tag) missing, malformed or inconsistent
    #[error("Invalid coordinate record for {read_name}: {message}")]
    InvalidCoordinateRecord { read_name: String, message: String },

    /// MM/ML tags that do not agree with the read sequence
    #[error("Invalid modified base tags for {read_name}: {message}")]
    InvalidModifiedBases { read_name: String, message: String },

    /// A per-base tag whose length differs from the sequence length
    #[error("Invalid per-base tag {tag} for {read_name}: {message}")]
    InvalidPerBaseTag {
        read_name: String,
        tag: String,
        message: String,
    },

    /// A concatemer id reappeared after its group was already emitted
    #[error("Alignments are not grouped by concatemer, {0} seen again after its group was closed")]
    UnsortedAlignments(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed FASTQ record
    #[error("Invalid FASTQ at line {line}: {message}")]
    InvalidFastq { line: usize, message: String },

    /// Malformed SAM-style `TAG:TYPE:VALUE` text
    #[error("Invalid SAM tag: {0}")]
    InvalidTag(String),

    /// Errors raised by the BAM adapter
    #[error("BAM error: {0}")]
    Bam(String),

    /// Summary serialisation errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PoreCError {
    pub fn coordinate(read_name: impl Into<String>, message: impl Into<String>) -> Self {
        PoreCError::InvalidCoordinateRecord {
            read_name: read_name.into(),
            message: message.into(),
        }
    }

    pub fn modified_bases(read_name: impl Into<String>, message: impl Into<String>) -> Self {
        PoreCError::InvalidModifiedBases {
            read_name: read_name.into(),
            message: message.into(),
        }
    }

    /// Errors confined to one read's tags; the stream can skip the read
    /// and carry on
    pub fn is_record_anomaly(&self) -> bool {
        matches!(
            self,
            PoreCError::InvalidModifiedBases { .. } | PoreCError::InvalidPerBaseTag { .. }
        )
    }
}

/// Result type alias for porec operations
pub type Result<T> = std::result::Result<T, PoreCError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PoreCError::UnsupportedEnzyme("AloI".to_string());
        assert_eq!(err.to_string(), "Unsupported enzyme: AloI");

        let err = PoreCError::coordinate("read1", "missing Xc tag");
        assert_eq!(
            err.to_string(),
            "Invalid coordinate record for read1: missing Xc tag"
        );
    }

    #[test]
    fn test_record_anomalies() {
        assert!(PoreCError::modified_bases("r1", "ML without MM").is_record_anomaly());
        assert!(!PoreCError::coordinate("r1", "missing Xc tag").is_record_anomaly());
        let framing = PoreCError::InvalidFastq {
            line: 3,
            message: "truncated record".to_string(),
        };
        assert!(!framing.is_record_anomaly());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PoreCError = io.into();
        assert!(matches!(err, PoreCError::Io(_)));
    }
}
