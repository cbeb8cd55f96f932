//! Rewrites raw alignment files so each record is one header line and one
//! sequence line.

use std::path::Path;

use crate::artifacts::write_atomic;
use crate::error::{Result, VariantisError};
use crate::fasta::{self, alignment_blocks, FastaError, BLOCK_DELIMITER};

/// Normalize delimiter-separated alignment text held in memory.
///
/// `source` only labels errors.
pub fn normalize_str(content: &str, source: &Path) -> Result<String> {
    let mut out = String::with_capacity(content.len());
    let mut blocks = 0usize;

    for block in alignment_blocks(content) {
        let entries = fasta::parse_str(block).map_err(|e| match e {
            FastaError::Empty => VariantisError::malformed_block(source, "block holds no FASTA records"),
            FastaError::Parse(msg) => {
                VariantisError::malformed_block(source, format!("block {} is not FASTA: {}", blocks + 1, msg))
            }
        })?;

        for entry in entries {
            out.push_str(&format!(">{}\n{}\n", entry.header, entry.sequence));
        }
        out.push_str(BLOCK_DELIMITER);
        out.push('\n');
        blocks += 1;
    }

    log::debug!("Normalized {} alignment blocks from {}", blocks, source.display());
    Ok(out)
}

/// Read the raw alignment file at `input` and write the single-line form to
/// `output`. Returns the number of blocks written.
pub fn normalize_file(input: &Path, output: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(input)?;
    let normalized = normalize_str(&content, input)?;
    let blocks = normalized.matches(BLOCK_DELIMITER).count();
    write_atomic(output, normalized.as_bytes())?;
    Ok(blocks)
}
