use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::VariantisError;

/// Opaque session token. Always a v4 UUID; it also names the session's
/// upload and results directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = VariantisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| VariantisError::not_found("Invalid or expired session"))
    }
}

/// Row of `user_sessions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub client_addr: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Outcome of a start-session request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionStatus {
    Active { session_id: SessionId },
    Busy,
}

/// External pairwise alignment program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsaProgram {
    Needle,
    Stretcher,
}

impl PsaProgram {
    pub fn as_str(&self) -> &'static str {
        match self {
            PsaProgram::Needle => "needle",
            PsaProgram::Stretcher => "stretcher",
        }
    }
}

impl fmt::Display for PsaProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PsaProgram {
    type Err = VariantisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "needle" => Ok(PsaProgram::Needle),
            "stretcher" => Ok(PsaProgram::Stretcher),
            other => Err(VariantisError::validation(format!(
                "Unknown alignment program: {}. Available programs: needle, stretcher",
                other
            ))),
        }
    }
}

/// Program and gap penalties after the selection policy has been applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentParams {
    pub program: PsaProgram,
    pub gap_open: f64,
    pub gap_extend: f64,
}

/// Substitution matrix handed to the aligner
pub const SCORING_MATRIX: &str = "EDNAFULL";

/// Per-session artifact locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub alignment: PathBuf,
    pub user_alignment: PathBuf,
    pub processed_alignment: PathBuf,
    pub nucleotide_matrix: PathBuf,
    pub user_nucleotide_matrix: PathBuf,
    pub transratio_matrix: PathBuf,
    pub summary_features: PathBuf,
    pub summary_alignment: PathBuf,
}

impl ArtifactPaths {
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        [
            &self.alignment,
            &self.user_alignment,
            &self.processed_alignment,
            &self.nucleotide_matrix,
            &self.user_nucleotide_matrix,
            &self.transratio_matrix,
            &self.summary_features,
            &self.summary_alignment,
        ]
        .into_iter()
    }
}

/// Row of `session_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: SessionId,
    pub upload_file: PathBuf,
    pub params: AlignmentParams,
    pub num_sequences: usize,
    pub artifacts: ArtifactPaths,
}

impl SessionData {
    /// Every file this session owns on disk
    pub fn owned_paths(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.upload_file).chain(self.artifacts.iter())
    }
}

/// An input sequence with its assigned identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub description: String,
    pub sequence: String,
}

impl SequenceRecord {
    pub fn query_id(index: usize) -> String {
        format!("query{:03}", index + 1)
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// One gapped row of a pairwise alignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRecord {
    pub header: String,
    pub sequence: String,
}

impl AlignedRecord {
    /// Lower-cased first whitespace token of the header
    pub fn name(&self) -> String {
        first_token(&self.header)
    }

    /// Length of the original sequence, gaps removed
    pub fn ungapped_len(&self) -> usize {
        self.sequence.bytes().filter(|&b| b != b'-').count()
    }
}

/// Aligned sequence pair produced by the external aligner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedPair {
    pub first: AlignedRecord,
    pub second: AlignedRecord,
}

impl AlignedPair {
    pub fn pair_name(&self) -> String {
        format!("{}_vs_{}", self.first.name(), self.second.name())
    }

    pub fn aligned_len(&self) -> usize {
        self.first.sequence.len()
    }

    /// FASTA block with sequences wrapped at `width` columns
    pub fn to_fasta(&self, width: usize) -> String {
        let mut out = String::new();
        for record in [&self.first, &self.second] {
            out.push('>');
            out.push_str(&record.header);
            out.push('\n');
            let bytes = record.sequence.as_bytes();
            for chunk in bytes.chunks(width.max(1)) {
                out.push_str(&String::from_utf8_lossy(chunk));
                out.push('\n');
            }
        }
        out
    }
}

pub(crate) fn first_token(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('>')
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_ids_are_zero_padded() {
        assert_eq!(SequenceRecord::query_id(0), "query001");
        assert_eq!(SequenceRecord::query_id(41), "query042");
        assert_eq!(SequenceRecord::query_id(999), "query1000");
    }

    #[test]
    fn test_session_id_rejects_paths() {
        assert!("../../etc".parse::<SessionId>().is_err());
        let id = SessionId::generate();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_pair_name_uses_first_token() {
        let pair = AlignedPair {
            first: AlignedRecord { header: "Query001 1-35".into(), sequence: "AT-G".into() },
            second: AlignedRecord { header: "QUERY002 1-36".into(), sequence: "ATCG".into() },
        };
        assert_eq!(pair.pair_name(), "query001_vs_query002");
        assert_eq!(pair.first.ungapped_len(), 3);
        assert_eq!(pair.aligned_len(), 4);
    }

    #[test]
    fn test_fasta_wrapping() {
        let pair = AlignedPair {
            first: AlignedRecord { header: "a".into(), sequence: "ACGTACGT".into() },
            second: AlignedRecord { header: "b".into(), sequence: "ACGTACG-".into() },
        };
        assert_eq!(pair.to_fasta(5), ">a\nACGTA\nCGT\n>b\nACGTA\nCG-\n");
    }

    #[test]
    fn test_program_parsing() {
        assert_eq!("Needle".parse::<PsaProgram>().unwrap(), PsaProgram::Needle);
        assert!("water".parse::<PsaProgram>().is_err());
    }
}
