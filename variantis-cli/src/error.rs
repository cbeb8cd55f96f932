//! Error handling for the Variantis CLI

use std::path::PathBuf;
use thiserror::Error;
use variantis_core::{ErrorKind, VariantisError};

/// User-facing failure of a CLI command
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("{message}")]
    Rejected { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Server busy: all {capacity} session slots are in use")]
    Busy { capacity: usize },

    #[error("Internal error")]
    Internal,
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }
}

impl From<VariantisError> for CliError {
    fn from(err: VariantisError) -> Self {
        match err.kind() {
            ErrorKind::Validation => Self::Rejected { message: err.public_message() },
            ErrorKind::NotFound => Self::NotFound { message: err.public_message() },
            ErrorKind::Internal => {
                log::debug!("Internal failure: {}", err);
                Self::Internal
            }
        }
    }
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Or pass the sequences inline with --text",
                path.display()
            ));
        }

        CliError::NotFound { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Sessions expire after inactivity; start a new one with 'variantis start'\n\
                 • Run 'variantis run <SESSION>' before asking for pairs or downloads"
            );
        }

        CliError::Busy { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Wait for idle sessions to expire and try again\n\
                 • Run 'variantis sweep' to reclaim idle sessions now"
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your variantis.toml configuration file\n\
                 • Use 'variantis config --example' to generate a sample configuration"
            );
        }

        CliError::Internal => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that the EMBOSS needle and stretcher binaries are installed\n\
                 • Re-run with -v for details in the log"
            );
        }

        CliError::Rejected { .. } => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_core_errors_keep_public_message_only() {
        let err: CliError = VariantisError::alignment("needle", "core dumped in /opt/emboss").into();
        assert!(matches!(err, CliError::Internal));
        assert!(!format_error_with_suggestions(&err).contains("/opt/emboss"));

        let err: CliError = VariantisError::not_found("Invalid or expired session").into();
        assert_eq!(err.to_string(), "Not found: Invalid or expired session");

        let err: CliError = VariantisError::validation("At least two sequences are required").into();
        assert!(matches!(err, CliError::Rejected { .. }));
    }

    #[test]
    fn test_error_suggestions() {
        let err = CliError::file_not_found(PathBuf::from("seqs.fa"));
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("seqs.fa"));
    }
}
