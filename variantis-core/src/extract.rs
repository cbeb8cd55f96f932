//! Lookup of one pair in a normalized alignment file, and a per-column view
//! of it for display.

use std::path::Path;

use serde::Serialize;

use crate::classifier::{classify_column, percent, ColumnClass};
use crate::error::{Result, VariantisError};
use crate::fasta::{self, alignment_blocks};
use crate::types::first_token;

/// Display width of one alignment line
pub const VIEW_LINE_WIDTH: usize = 50;

/// Aligned sequences for a requested pair, in the requested order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedPair {
    pub query: String,
    pub subject: String,
    pub query_sequence: String,
    pub subject_sequence: String,
}

fn normalize_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

/// Find the block aligning `query` with `subject`, in either order.
pub fn extract_pair(content: &str, query: &str, subject: &str) -> Result<ExtractedPair> {
    let query = normalize_name(query);
    let subject = normalize_name(subject);

    for block in alignment_blocks(content) {
        let entries = match fasta::parse_str(block) {
            Ok(entries) if entries.len() == 2 => entries,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("Skipping unreadable alignment block: {}", e);
                continue;
            }
        };
        let mut entries = entries.into_iter();
        let (Some(first), Some(second)) = (entries.next(), entries.next()) else {
            continue;
        };
        let (first_name, second_name) = (first_token(&first.header), first_token(&second.header));

        let (query_sequence, subject_sequence) = if first_name == query && second_name == subject {
            (first.sequence, second.sequence)
        } else if first_name == subject && second_name == query {
            (second.sequence, first.sequence)
        } else {
            continue;
        };

        return Ok(ExtractedPair {
            query,
            subject,
            query_sequence: query_sequence.to_ascii_uppercase(),
            subject_sequence: subject_sequence.to_ascii_uppercase(),
        });
    }

    Err(VariantisError::not_found(format!("Alignment pair {} and {}", query, subject)))
}

pub fn extract_pair_from_file(path: &Path, query: &str, subject: &str) -> Result<ExtractedPair> {
    let content = std::fs::read_to_string(path)?;
    extract_pair(&content, query, subject)
}

/// Column counts of a pair view. Ambiguous columns are reported as unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ViewCounts {
    pub identical: usize,
    pub transitions: usize,
    pub transversions: usize,
    pub gaps: usize,
    pub unknown: usize,
    pub total_length: usize,
    pub identical_percent: f64,
    pub transitions_percent: f64,
    pub transversions_percent: f64,
    pub gaps_percent: f64,
    pub unknown_percent: f64,
}

/// One display line of both sequences with per-column classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewLine {
    pub query: String,
    pub subject: String,
    pub classes: Vec<ColumnClass>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairView {
    pub pair: ExtractedPair,
    pub columns: Vec<ColumnClass>,
    pub counts: ViewCounts,
}

impl PairView {
    pub fn build(pair: ExtractedPair) -> Result<Self> {
        if pair.query_sequence.len() != pair.subject_sequence.len() {
            return Err(VariantisError::LengthMismatch {
                first: pair.query_sequence.len(),
                second: pair.subject_sequence.len(),
            });
        }

        let columns = pair
            .query_sequence
            .bytes()
            .zip(pair.subject_sequence.bytes())
            .map(|(a, b)| classify_column(a, b))
            .collect::<Result<Vec<_>>>()?;

        let mut counts = ViewCounts { total_length: columns.len(), ..ViewCounts::default() };
        for class in &columns {
            match class {
                ColumnClass::Identical => counts.identical += 1,
                ColumnClass::Transition => counts.transitions += 1,
                ColumnClass::Transversion => counts.transversions += 1,
                ColumnClass::Gap => counts.gaps += 1,
                ColumnClass::Ambiguous => counts.unknown += 1,
            }
        }
        let total = counts.total_length;
        counts.identical_percent = percent(counts.identical, total);
        counts.transitions_percent = percent(counts.transitions, total);
        counts.transversions_percent = percent(counts.transversions, total);
        counts.gaps_percent = percent(counts.gaps, total);
        counts.unknown_percent = percent(counts.unknown, total);

        Ok(Self { pair, columns, counts })
    }

    /// Split the alignment into lines of at most `width` columns
    pub fn lines(&self, width: usize) -> Vec<ViewLine> {
        let width = width.max(1);
        self.pair
            .query_sequence
            .as_bytes()
            .chunks(width)
            .zip(self.pair.subject_sequence.as_bytes().chunks(width))
            .zip(self.columns.chunks(width))
            .map(|((q, s), classes)| ViewLine {
                query: String::from_utf8_lossy(q).into_owned(),
                subject: String::from_utf8_lossy(s).into_owned(),
                classes: classes.to_vec(),
            })
            .collect()
    }
}
