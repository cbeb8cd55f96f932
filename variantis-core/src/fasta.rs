//! FASTA reading and delimiter-separated alignment files
//!
//! Parsing goes through needletail. Alignment files produced by the
//! orchestrator are a sequence of FASTA blocks, each followed by a line of
//! seventy `=` characters.

use std::io::Read;

use needletail::parse_fastx_reader;
use thiserror::Error;

/// Separator line between pairwise alignment blocks
pub const BLOCK_DELIMITER: &str = "======================================================================";

#[derive(Debug, Error)]
pub enum FastaError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Empty input or no sequences found")]
    Empty,
}

/// A parsed FASTA entry: the full header line (without `>`) and the
/// sequence with line breaks removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaEntry {
    pub header: String,
    pub sequence: String,
}

/// Parse every record from a readable source.
pub fn parse_reader<R: Read + Send>(reader: R) -> Result<Vec<FastaEntry>, FastaError> {
    let mut fastx_reader = parse_fastx_reader(reader).map_err(|e| match e.kind {
        needletail::errors::ParseErrorKind::EmptyFile => FastaError::Empty,
        _ => FastaError::Parse(e.to_string()),
    })?;

    let mut entries = Vec::new();
    while let Some(record) = fastx_reader.next() {
        let record = record.map_err(|e| FastaError::Parse(e.to_string()))?;
        let header = String::from_utf8_lossy(record.id()).trim().to_string();
        let sequence = String::from_utf8_lossy(&record.seq()).to_string();
        entries.push(FastaEntry { header, sequence });
    }

    if entries.is_empty() {
        Err(FastaError::Empty)
    } else {
        Ok(entries)
    }
}

/// Parse FASTA text held in memory.
pub fn parse_str(text: &str) -> Result<Vec<FastaEntry>, FastaError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FastaError::Empty);
    }
    parse_reader(trimmed.as_bytes())
}

/// Non-blank blocks of a delimiter-separated alignment file, trimmed.
pub fn alignment_blocks(content: &str) -> impl Iterator<Item = &str> {
    content
        .split(BLOCK_DELIMITER)
        .map(str::trim)
        .filter(|block| !block.is_empty())
}
