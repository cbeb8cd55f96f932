//! Substitution classification of pairwise alignments
//!
//! Every aligned column falls into exactly one class, checked in this order:
//! gap, ambiguous, invalid (an error), identical, then a substitution which
//! is either a transition or a transversion. Ambiguous columns are skipped:
//! they are counted so the classes partition the alignment, but they never
//! reach the substitution matrix or the percentages.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, VariantisError};
use crate::fasta::{self, alignment_blocks};
use crate::types::{AlignedPair, AlignedRecord, ArtifactPaths};
use crate::workbook::{Cell, Table, WorkbookWriter};

/// Matrix axis order
pub const BASES: [u8; 4] = [b'A', b'T', b'G', b'C'];

/// IUPAC uncertainty codes, plus `U`
pub const AMBIGUOUS_BASES: &[u8] = b"NRYKMSWBDHVU";

pub const GAP: u8 = b'-';

/// Ratio reported when there are no transversions
pub const UNDEFINED_RATIO: &str = "undefined";

/// Filler for unset cells of the ratio matrix
pub const RATIO_PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnClass {
    Gap,
    Ambiguous,
    Identical,
    Transition,
    Transversion,
}

fn is_purine(base: u8) -> bool {
    matches!(base, b'A' | b'G')
}

fn base_index(base: u8) -> Option<usize> {
    BASES.iter().position(|&b| b == base)
}

/// Classify one aligned column.
pub fn classify_column(a: u8, b: u8) -> Result<ColumnClass> {
    if a == GAP || b == GAP {
        return Ok(ColumnClass::Gap);
    }
    if AMBIGUOUS_BASES.contains(&a) || AMBIGUOUS_BASES.contains(&b) {
        return Ok(ColumnClass::Ambiguous);
    }
    if base_index(a).is_none() || base_index(b).is_none() {
        return Err(VariantisError::InvalidBase { first: a as char, second: b as char });
    }
    if a == b {
        Ok(ColumnClass::Identical)
    } else if is_purine(a) == is_purine(b) {
        Ok(ColumnClass::Transition)
    } else {
        Ok(ColumnClass::Transversion)
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of `count` over `total`, two decimals, 0 when `total` is 0
pub fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(count as f64 / total as f64 * 100.0)
    }
}

/// Substitution counts, `counts[from][to]` indexed in `BASES` order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionMatrix {
    counts: [[usize; 4]; 4],
}

impl SubstitutionMatrix {
    pub fn get(&self, from: u8, to: u8) -> usize {
        match (base_index(from), base_index(to)) {
            (Some(i), Some(j)) => self.counts[i][j],
            _ => 0,
        }
    }

    /// Substitutions originating from `from`
    pub fn row_total(&self, from: u8) -> usize {
        base_index(from).map(|i| self.counts[i].iter().sum()).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn record(&mut self, from: u8, to: u8) {
        if let (Some(i), Some(j)) = (base_index(from), base_index(to)) {
            self.counts[i][j] += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionStats {
    pub transitions: usize,
    pub transversions: usize,
    pub identical: usize,
    pub gaps: usize,
    /// Columns skipped because either base is ambiguous
    pub ambiguous: usize,
    pub aligned_length: usize,
    pub matrix: SubstitutionMatrix,
}

impl SubstitutionStats {
    /// Classify every column of two equal-length aligned strings.
    pub fn count(first: &str, second: &str) -> Result<Self> {
        if first.len() != second.len() {
            return Err(VariantisError::LengthMismatch { first: first.len(), second: second.len() });
        }

        let mut stats = Self { aligned_length: first.len(), ..Self::default() };
        for (a, b) in first.bytes().zip(second.bytes()) {
            match classify_column(a, b)? {
                ColumnClass::Gap => stats.gaps += 1,
                ColumnClass::Ambiguous => stats.ambiguous += 1,
                ColumnClass::Identical => stats.identical += 1,
                ColumnClass::Transition => {
                    stats.transitions += 1;
                    stats.matrix.record(a, b);
                }
                ColumnClass::Transversion => {
                    stats.transversions += 1;
                    stats.matrix.record(a, b);
                }
            }
        }
        Ok(stats)
    }

    pub fn transition_percent(&self) -> f64 {
        percent(self.transitions, self.aligned_length)
    }

    pub fn transversion_percent(&self) -> f64 {
        percent(self.transversions, self.aligned_length)
    }

    pub fn identical_percent(&self) -> f64 {
        percent(self.identical, self.aligned_length)
    }

    pub fn gap_percent(&self) -> f64 {
        percent(self.gaps, self.aligned_length)
    }

    /// Transitions per transversion, three decimals
    pub fn ratio(&self) -> String {
        if self.transversions == 0 {
            UNDEFINED_RATIO.to_string()
        } else {
            format!("{:.3}", self.transitions as f64 / self.transversions as f64)
        }
    }
}

/// Classification of one alignment block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairResult {
    pub first_id: String,
    pub second_id: String,
    /// Ungapped lengths of the two input sequences
    pub first_length: usize,
    pub second_length: usize,
    pub stats: SubstitutionStats,
}

impl PairResult {
    pub fn from_pair(pair: &AlignedPair) -> Result<Self> {
        Ok(Self {
            first_id: pair.first.name(),
            second_id: pair.second.name(),
            first_length: pair.first.ungapped_len(),
            second_length: pair.second.ungapped_len(),
            stats: SubstitutionStats::count(&pair.first.sequence, &pair.second.sequence)?,
        })
    }

    pub fn name(&self) -> String {
        format!("{}_vs_{}", self.first_id, self.second_id)
    }

    pub fn summary(&self) -> PairSummary {
        let s = &self.stats;
        PairSummary {
            pair: self.name(),
            transitions: s.transitions,
            transition_percent: s.transition_percent(),
            transversions: s.transversions,
            transversion_percent: s.transversion_percent(),
            gaps: s.gaps,
            gap_percent: s.gap_percent(),
            identical: s.identical,
            identical_percent: s.identical_percent(),
            ambiguous: s.ambiguous,
            ratio: s.ratio(),
            first_length: self.first_length,
            second_length: self.second_length,
            aligned_length: s.aligned_length,
        }
    }
}

/// Flat, serializable view of a pair's statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSummary {
    pub pair: String,
    pub transitions: usize,
    pub transition_percent: f64,
    pub transversions: usize,
    pub transversion_percent: f64,
    pub gaps: usize,
    pub gap_percent: f64,
    pub identical: usize,
    pub identical_percent: f64,
    pub ambiguous: usize,
    pub ratio: String,
    pub first_length: usize,
    pub second_length: usize,
    pub aligned_length: usize,
}

/// Results for every pair of a normalized alignment file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationReport {
    pub pairs: Vec<PairResult>,
    /// Blocks that did not hold exactly two records
    pub skipped_blocks: usize,
}

impl ClassificationReport {
    /// Classify normalized alignment text. `source` only labels errors.
    pub fn from_normalized(content: &str, source: &Path) -> Result<Self> {
        let mut report = Self::default();

        for (index, block) in alignment_blocks(content).enumerate() {
            let entries = fasta::parse_str(block).map_err(|e| {
                VariantisError::malformed_block(source, format!("block {}: {}", index + 1, e))
            })?;

            if entries.len() != 2 {
                log::warn!(
                    "Skipping block {} of {} with {} sequences (expected 2)",
                    index + 1,
                    source.display(),
                    entries.len()
                );
                report.skipped_blocks += 1;
                continue;
            }

            let mut records = entries.into_iter().map(|e| AlignedRecord {
                header: e.header,
                sequence: e.sequence.to_ascii_uppercase(),
            });
            let (Some(first), Some(second)) = (records.next(), records.next()) else {
                continue;
            };
            let result = PairResult::from_pair(&AlignedPair { first, second }).map_err(|e| {
                log::error!("Classification of block {} in {} failed: {}", index + 1, source.display(), e);
                e
            })?;

            // A repeated pair replaces the earlier result in place.
            let name = result.name();
            match report.pairs.iter_mut().find(|p| p.name() == name) {
                Some(existing) => {
                    log::warn!("Pair {} appears more than once in {}", name, source.display());
                    *existing = result;
                }
                None => report.pairs.push(result),
            }
        }

        Ok(report)
    }

    pub fn get(&self, pair_name: &str) -> Option<&PairResult> {
        self.pairs.iter().find(|p| p.name() == pair_name)
    }

    pub fn summaries(&self) -> Vec<PairSummary> {
        self.pairs.iter().map(PairResult::summary).collect()
    }

    /// Symmetric ts/tv ratio matrix over the sorted sequence ids
    pub fn ratio_table(&self) -> Table {
        let ids: BTreeSet<&str> = self
            .pairs
            .iter()
            .flat_map(|p| [p.first_id.as_str(), p.second_id.as_str()])
            .collect();

        let mut ratios: BTreeMap<(&str, &str), String> = BTreeMap::new();
        for pair in &self.pairs {
            let ratio = pair.stats.ratio();
            ratios.insert((pair.first_id.as_str(), pair.second_id.as_str()), ratio.clone());
            ratios.insert((pair.second_id.as_str(), pair.first_id.as_str()), ratio);
        }

        let mut headers = vec![""];
        headers.extend(ids.iter().copied());
        let mut table = Table::new("Transition_Transversion", &headers);
        for &row in &ids {
            let mut cells = vec![Cell::from(row)];
            for &col in &ids {
                let value = ratios.get(&(row, col)).map(String::as_str).unwrap_or(RATIO_PLACEHOLDER);
                cells.push(Cell::from(value));
            }
            table.push_row(cells);
        }
        table
    }

    /// One 4x4 substitution table per pair, named after the pair
    pub fn matrix_tables(&self) -> Vec<Table> {
        self.pairs
            .iter()
            .map(|pair| {
                let mut table = Table::new(pair.name(), &["Base", "A", "T", "G", "C"]);
                for from in BASES {
                    let mut row = vec![Cell::from((from as char).to_string())];
                    row.extend(BASES.iter().map(|&to| Cell::from(pair.stats.matrix.get(from, to))));
                    table.push_row(row);
                }
                table
            })
            .collect()
    }

    /// Per pair, the substitutions originating from each base
    pub fn nucleotide_table(&self) -> Table {
        let mut table = Table::new("User_Nucleotide Matrices", &["Sequence Pair", "A", "T", "G", "C"]);
        for pair in &self.pairs {
            let mut row = vec![Cell::from(pair.name())];
            row.extend(BASES.iter().map(|&from| Cell::from(pair.stats.matrix.row_total(from))));
            table.push_row(row);
        }
        table
    }

    pub fn summary_features_table(&self) -> Table {
        let mut table = Table::new(
            "Summary_Features",
            &[
                "Sequence_Pair",
                "Transition_Count",
                "Transition_Percentage",
                "Transversion_Count",
                "Transversion_Percentage",
                "Gap_Count",
                "Gap_Percentage",
                "Identical_Count",
                "Identical_Percentage",
            ],
        );
        for pair in &self.pairs {
            let s = &pair.stats;
            table.push_row(vec![
                pair.name().into(),
                s.transitions.into(),
                s.transition_percent().into(),
                s.transversions.into(),
                s.transversion_percent().into(),
                s.gaps.into(),
                s.gap_percent().into(),
                s.identical.into(),
                s.identical_percent().into(),
            ]);
        }
        table
    }

    pub fn summary_alignment_table(&self) -> Table {
        let mut table = Table::new(
            "Summary_Alignment",
            &["Sequence_Pair", "Query_1_Length", "Query_2_Length", "Aligned_Length"],
        );
        for pair in &self.pairs {
            table.push_row(vec![
                pair.name().into(),
                pair.first_length.into(),
                pair.second_length.into(),
                pair.stats.aligned_length.into(),
            ]);
        }
        table
    }

    /// Write the five workbooks to the session's artifact paths.
    pub fn write_reports(&self, writer: &dyn WorkbookWriter, paths: &ArtifactPaths) -> Result<()> {
        let mut matrices = self.matrix_tables();
        if matrices.is_empty() {
            matrices.push(Table::new("Nucleotide_Matrix", &["Base", "A", "T", "G", "C"]));
        }
        writer.write(&paths.nucleotide_matrix, &matrices)?;
        writer.write(&paths.user_nucleotide_matrix, &[self.nucleotide_table()])?;
        writer.write(&paths.transratio_matrix, &[self.ratio_table()])?;
        writer.write(&paths.summary_features, &[self.summary_features_table()])?;
        writer.write(&paths.summary_alignment, &[self.summary_alignment_table()])?;
        Ok(())
    }
}

/// Classify the normalized alignment file at `path`. Skipped blocks are not
/// fatal, even when none are left.
pub fn classify_file(path: &Path) -> Result<ClassificationReport> {
    let content = std::fs::read_to_string(path)?;
    let report = ClassificationReport::from_normalized(&content, path)?;
    if report.pairs.is_empty() {
        log::warn!("No pairwise alignment blocks in {}; reports will be empty", path.display());
    }
    log::info!(
        "Classified {} pairs from {} ({} blocks skipped)",
        report.pairs.len(),
        path.display(),
        report.skipped_blocks
    );
    Ok(report)
}
