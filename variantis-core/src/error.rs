//! Error handling for the Variantis core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum VariantisError {
    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Alignment engine error: {program} - {message}")]
    Alignment { program: String, message: String },

    #[error("Malformed alignment block in {file}: {message}")]
    MalformedBlock { file: PathBuf, message: String },

    #[error("Invalid base pair: b1={first}, b2={second}")]
    InvalidBase { first: char, second: char },

    #[error("Aligned sequences differ in length: {first} vs {second}")]
    LengthMismatch { first: usize, second: usize },

    #[error("Session data already recorded for session {session_id}")]
    DuplicateSessionData { session_id: String },

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Workbook error: {message}")]
    Workbook { message: String },

    #[error("Input/Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used at the request boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected user input; safe to show verbatim
    Validation,
    /// Missing session, artifact or alignment pair
    NotFound,
    /// Pipeline, store or I/O failure; details are logged, not shown
    Internal,
}

impl VariantisError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn alignment<S: Into<String>, M: Into<String>>(program: S, message: M) -> Self {
        Self::Alignment {
            program: program.into(),
            message: message.into(),
        }
    }

    pub fn malformed_block<P: Into<PathBuf>, S: Into<String>>(file: P, message: S) -> Self {
        Self::MalformedBlock {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn workbook<S: Into<String>>(message: S) -> Self {
        Self::Workbook { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// Message suitable for the caller. Internal failures never leak paths
    /// or engine output.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::NotFound => self.to_string(),
            ErrorKind::Internal => "Internal server error".to_string(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for VariantisError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::workbook(err.to_string())
    }
}

impl From<tempfile::PersistError> for VariantisError {
    fn from(err: tempfile::PersistError) -> Self {
        Self::Io(err.error)
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, VariantisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = VariantisError::validation("At least two sequences are required for comparison.");
        assert!(matches!(err, VariantisError::Validation { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid input: At least two sequences are required for comparison."
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = VariantisError::malformed_block("/srv/results/abc/alignment.fasta", "no records");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "Internal server error");
        assert!(!err.public_message().contains("/srv"));
    }

    #[test]
    fn test_not_found_is_shown() {
        let err = VariantisError::not_found("Session data");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.public_message(), "Not found: Session data");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VariantisError = io_err.into();
        assert!(matches!(err, VariantisError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
