//! Upload screening, sequence validation and program selection
//!
//! Everything here runs before a session's `SessionData` exists. Failures are
//! always `VariantisError::Validation` so they can be shown to the user.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VariantisError};
use crate::fasta::{self, FastaError};
use crate::orchestrator;
use crate::types::{AlignmentParams, PsaProgram, SequenceRecord};

/// Accepted nucleotide alphabet, including IUPAC ambiguity codes
pub const ALLOWED_BASES: &[u8] = b"ATCGNRYKMSWBDHVU";

const DANGEROUS_KEYWORDS: [&str; 12] = [
    "#!/", "exec", "import os", "import sys", "subprocess", "rm -rf",
    "<script>", "eval(", "system(", "popen(", "fork(", "execve(",
];

/// Limits and defaults applied when choosing the alignment program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramLimits {
    /// Longest sequence `needle` is allowed to align
    pub needle_max_length: usize,
    /// Hard ceiling for any sequence
    pub stretcher_max_length: usize,
    pub stretcher_default_gap_open: f64,
    pub stretcher_default_gap_extend: f64,
    /// Upload size ceiling in bytes
    pub max_upload_bytes: u64,
}

impl Default for ProgramLimits {
    fn default() -> Self {
        Self {
            needle_max_length: 3000,
            stretcher_max_length: 10000,
            stretcher_default_gap_open: 16.0,
            stretcher_default_gap_extend: 4.0,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Reject uploads that are too large, binary, executable-looking or not
/// FASTA at all.
pub fn screen_upload(file_name: &str, bytes: &[u8], limits: &ProgramLimits) -> Result<()> {
    if bytes.len() as u64 > limits.max_upload_bytes {
        return Err(VariantisError::validation(format!(
            "File size exceeds {}MB limit",
            limits.max_upload_bytes / (1024 * 1024)
        )));
    }

    if !has_text_extension(file_name) {
        return Err(VariantisError::validation("Invalid file type"));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| VariantisError::validation("Executable code detected. File rejected."))?;

    if text
        .lines()
        .map(str::to_lowercase)
        .any(|line| DANGEROUS_KEYWORDS.iter().any(|kw| line.contains(kw)))
    {
        return Err(VariantisError::validation("Executable code detected. File rejected."));
    }

    let first_line = text.lines().next().unwrap_or("").trim();
    if !first_line.starts_with('>') {
        return Err(VariantisError::validation("Invalid FASTA file format"));
    }

    Ok(())
}

/// Extensions whose registered media type is something other than plain
/// text. Anything else, including unregistered FASTA extensions, is allowed.
const NON_TEXT_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "bin", "bat", "sh", "csh", "ksh", "py", "pyc", "pl", "js", "mjs", "jar",
    "class", "php", "html", "htm", "xhtml", "xml", "css", "csv", "tsv", "json", "rtf", "pdf",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "zip", "gz", "tgz", "bz2", "xz",
    "tar", "7z", "rar", "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "svg", "ico", "mp3",
    "wav", "mp4", "avi", "mov", "wasm",
];

fn has_text_extension(file_name: &str) -> bool {
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        None => true,
        Some(ext) => !NON_TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
    }
}

/// Parse submitted FASTA text into records with assigned `queryNNN` ids.
pub fn parse_sequences(text: &str) -> Result<Vec<SequenceRecord>> {
    let entries = fasta::parse_str(text).map_err(|e| match e {
        FastaError::Empty => {
            VariantisError::validation("Input is empty or not a valid nucleotide FASTA format.")
        }
        FastaError::Parse(msg) => VariantisError::validation(format!("Invalid FASTA file format: {}", msg)),
    })?;

    let records = orchestrator::assign_query_ids(entries);
    validate_records(&records)?;
    Ok(records)
}

/// At least two records, every residue in the accepted alphabet.
pub fn validate_records(records: &[SequenceRecord]) -> Result<()> {
    if records.len() < 2 {
        return Err(VariantisError::validation(
            "At least two sequences are required for comparison.",
        ));
    }
    for record in records {
        if let Some(bad) = record.sequence.bytes().find(|b| !ALLOWED_BASES.contains(b)) {
            return Err(VariantisError::validation(format!(
                "Invalid characters in FASTA sequence {} ('{}')",
                record.id, bad as char
            )));
        }
    }
    Ok(())
}

/// Apply the program-selection policy for the longest submitted sequence.
pub fn select_program(
    requested: PsaProgram,
    gap_open: f64,
    gap_extend: f64,
    max_sequence_length: usize,
    limits: &ProgramLimits,
) -> Result<AlignmentParams> {
    if !gap_open.is_finite() || !gap_extend.is_finite() || gap_open < 1.0 || gap_extend < 0.0 {
        return Err(VariantisError::validation(
            "Gap Open must be >= 1, Gap Extend must be >= 0",
        ));
    }

    if max_sequence_length > limits.stretcher_max_length {
        return Err(VariantisError::validation(format!(
            "The longest sequence ({} bases) exceeds the maximum allowed limit of {} bases. \
             Please upload a file with shorter sequences.",
            max_sequence_length, limits.stretcher_max_length
        )));
    }

    let mut program = requested;
    if program == PsaProgram::Needle && max_sequence_length > limits.needle_max_length {
        log::info!(
            "Longest sequence is {} bases, switching from needle to stretcher",
            max_sequence_length
        );
        program = PsaProgram::Stretcher;
    }

    let (mut gap_open, mut gap_extend) = (gap_open, gap_extend);
    if program == PsaProgram::Stretcher {
        if gap_open < 1.0 || gap_extend < 1.0 {
            gap_open = limits.stretcher_default_gap_open;
            gap_extend = limits.stretcher_default_gap_extend;
        }
        if gap_open.fract() != 0.0 || gap_extend.fract() != 0.0 {
            return Err(VariantisError::validation(
                "Gap Open and Gap extend must be whole numbers",
            ));
        }
    }

    Ok(AlignmentParams { program, gap_open, gap_extend })
}
