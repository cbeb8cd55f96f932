//! Aligns every sequence pair and writes the alignment files
//!
//! Two files come out of a run:
//! - the raw alignment file: FASTA blocks separated by the delimiter line,
//!   consumed by the normalizer;
//! - the user alignment file: an id-to-description mapping, then each block
//!   with a caption naming both sequences.

use std::path::Path;

use rayon::prelude::*;

use crate::aligner::{AlignRequest, PairwiseAligner};
use crate::artifacts::write_atomic;
use crate::error::{Result, VariantisError};
use crate::fasta::{FastaEntry, BLOCK_DELIMITER};
use crate::intake;
use crate::types::{AlignedPair, AlignmentParams, SequenceRecord, SCORING_MATRIX};

/// Width of sequence lines in the written FASTA blocks
pub const FASTA_LINE_WIDTH: usize = 60;

const MAPPING_TITLE: &str = "Query-to-ID Mapping:";

/// Summary of one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRun {
    pub sequences: usize,
    pub pairs: Vec<String>,
}

/// Give parsed entries their `queryNNN` identifiers, in input order.
pub fn assign_query_ids(entries: Vec<FastaEntry>) -> Vec<SequenceRecord> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| SequenceRecord {
            id: SequenceRecord::query_id(i),
            description: entry.header,
            sequence: entry.sequence.to_ascii_uppercase(),
        })
        .collect()
}

/// Index pairs `(i, j)` with `i < j`. Since ids are zero-padded and assigned
/// in order this is also lexicographic order by identifier.
pub fn pair_indices(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(n.saturating_sub(1) * n / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Align all C(n, 2) pairs and write the raw and user alignment files.
pub fn align_all(
    aligner: &dyn PairwiseAligner,
    records: &[SequenceRecord],
    params: &AlignmentParams,
    raw_path: &Path,
    user_path: &Path,
) -> Result<AlignmentRun> {
    intake::validate_records(records)?;

    let pairs = pair_indices(records.len());
    log::info!(
        "Aligning {} pairs from {} sequences with {} (gap open {}, gap extend {})",
        pairs.len(),
        records.len(),
        params.program,
        params.gap_open,
        params.gap_extend
    );

    let alignments: Vec<AlignedPair> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let request = AlignRequest {
                program: params.program,
                first: &records[i],
                second: &records[j],
                matrix: SCORING_MATRIX,
                gap_open: params.gap_open,
                gap_extend: params.gap_extend,
            };
            aligner.align(&request).map_err(|e| {
                log::error!("Alignment of {} vs {} failed: {}", records[i].id, records[j].id, e);
                e
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut raw = String::new();
    let mut user = String::new();

    user.push_str(MAPPING_TITLE);
    user.push('\n');
    for record in records {
        user.push_str(&format!("{}: {}\n", record.id, record.description));
    }
    user.push_str(&format!("\n{}\n\n", BLOCK_DELIMITER));

    for (&(i, j), alignment) in pairs.iter().zip(&alignments) {
        let (first, second) = (&records[i], &records[j]);
        let block = alignment.to_fasta(FASTA_LINE_WIDTH);

        user.push_str(&format!(
            "Alignment of \n [{}]:{}  and \n [{}]:{} :\n",
            first.id, first.description, second.id, second.description
        ));
        user.push_str(&block);
        user.push_str(&format!("\n{}\n", BLOCK_DELIMITER));

        raw.push_str(&block);
        raw.push_str(&format!("\n{}\n", BLOCK_DELIMITER));
    }

    write_atomic(user_path, user.as_bytes())?;
    write_atomic(raw_path, raw.as_bytes())?;

    Ok(AlignmentRun {
        sequences: records.len(),
        pairs: alignments.iter().map(AlignedPair::pair_name).collect(),
    })
}

/// Read the uploaded FASTA file and align it.
pub fn align_file(
    aligner: &dyn PairwiseAligner,
    input: &Path,
    params: &AlignmentParams,
    raw_path: &Path,
    user_path: &Path,
) -> Result<AlignmentRun> {
    let text = std::fs::read_to_string(input)?;
    let records = intake::parse_sequences(&text)?;
    align_all(aligner, &records, params, raw_path, user_path)
}

/// Recover the id-to-description mapping from a user alignment file.
pub fn read_id_mapping(user_path: &Path) -> Result<Vec<(String, String)>> {
    let content = std::fs::read_to_string(user_path)?;
    let mut lines = content.lines().map(str::trim);

    if !lines.any(|line| line == MAPPING_TITLE) {
        return Err(VariantisError::malformed_block(user_path, "missing id mapping header"));
    }

    let mut mapping = Vec::new();
    for line in lines {
        if line.starts_with(BLOCK_DELIMITER) {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if let Some((id, description)) = line.split_once(": ") {
            mapping.push((id.to_string(), description.to_string()));
        } else if let Some(id) = line.strip_suffix(':') {
            mapping.push((id.to_string(), String::new()));
        }
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlignedRecord, PsaProgram};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Pads the shorter sequence with trailing gaps.
    struct PaddingAligner {
        calls: AtomicUsize,
    }

    impl PairwiseAligner for PaddingAligner {
        fn align(&self, request: &AlignRequest<'_>) -> Result<AlignedPair> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let width = request.first.len().max(request.second.len());
            let pad = |s: &str| format!("{:-<width$}", s, width = width);
            Ok(AlignedPair {
                first: AlignedRecord { header: request.first.id.clone(), sequence: pad(&request.first.sequence) },
                second: AlignedRecord { header: request.second.id.clone(), sequence: pad(&request.second.sequence) },
            })
        }

        fn name(&self) -> &'static str {
            "padding"
        }
    }

    fn params() -> AlignmentParams {
        AlignmentParams { program: PsaProgram::Needle, gap_open: 10.0, gap_extend: 0.5 }
    }

    fn records(seqs: &[(&str, &str)]) -> Vec<SequenceRecord> {
        assign_query_ids(
            seqs.iter()
                .map(|(h, s)| FastaEntry { header: h.to_string(), sequence: s.to_string() })
                .collect(),
        )
    }

    #[test]
    fn test_pair_enumeration() {
        assert_eq!(pair_indices(2), vec![(0, 1)]);
        assert_eq!(pair_indices(4).len(), 6);
        assert_eq!(pair_indices(3), vec![(0, 1), (0, 2), (1, 2)]);
        assert!(pair_indices(1).is_empty());
    }

    #[test]
    fn test_two_records_give_one_pair() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("alignment.fasta");
        let user = dir.path().join("user_alignment.fasta");
        let aligner = PaddingAligner { calls: AtomicUsize::new(0) };

        let run = align_all(&aligner, &records(&[("s1", "ATCG"), ("s2", "ATGG")]), &params(), &raw, &user).unwrap();

        assert_eq!(run.pairs, vec!["query001_vs_query002".to_string()]);
        assert_eq!(aligner.calls.load(Ordering::SeqCst), 1);

        let raw_text = std::fs::read_to_string(&raw).unwrap();
        assert_eq!(raw_text, format!(">query001\nATCG\n>query002\nATGG\n\n{}\n", BLOCK_DELIMITER));
        assert!(!raw_text.contains(MAPPING_TITLE));

        let user_text = std::fs::read_to_string(&user).unwrap();
        assert!(user_text.starts_with("Query-to-ID Mapping:\nquery001: s1\nquery002: s2\n"));
        assert!(user_text.contains("[query001]:s1  and \n [query002]:s2 :"));
    }

    #[test]
    fn test_pairs_are_written_in_identifier_order() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("alignment.fasta");
        let user = dir.path().join("user_alignment.fasta");
        let aligner = PaddingAligner { calls: AtomicUsize::new(0) };
        let input = records(&[("a", "AC"), ("b", "AG"), ("c", "AT"), ("d", "AA")]);

        let run = align_all(&aligner, &input, &params(), &raw, &user).unwrap();

        assert_eq!(
            run.pairs,
            vec![
                "query001_vs_query002",
                "query001_vs_query003",
                "query001_vs_query004",
                "query002_vs_query003",
                "query002_vs_query004",
                "query003_vs_query004",
            ]
        );
        let raw_text = std::fs::read_to_string(&raw).unwrap();
        assert_eq!(raw_text.matches(BLOCK_DELIMITER).count(), 6);
    }

    #[test]
    fn test_rejects_single_record_and_bad_alphabet() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("alignment.fasta");
        let user = dir.path().join("user_alignment.fasta");
        let aligner = PaddingAligner { calls: AtomicUsize::new(0) };

        let err = align_all(&aligner, &records(&[("a", "ACGT")]), &params(), &raw, &user).unwrap_err();
        assert!(matches!(err, VariantisError::Validation { .. }));

        let err = align_all(&aligner, &records(&[("a", "ACGT"), ("b", "AC*T")]), &params(), &raw, &user).unwrap_err();
        assert!(matches!(err, VariantisError::Validation { .. }));
        assert_eq!(aligner.calls.load(Ordering::SeqCst), 0);
        assert!(!raw.exists());
    }

    #[test]
    fn test_id_mapping_roundtrip() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("alignment.fasta");
        let user = dir.path().join("user_alignment.fasta");
        let aligner = PaddingAligner { calls: AtomicUsize::new(0) };
        let input = records(&[("human mito", "ACGT"), ("chimp mito", "ACGA"), ("gorilla", "ACG")]);

        align_all(&aligner, &input, &params(), &raw, &user).unwrap();
        let mapping = read_id_mapping(&user).unwrap();
        assert_eq!(
            mapping,
            vec![
                ("query001".to_string(), "human mito".to_string()),
                ("query002".to_string(), "chimp mito".to_string()),
                ("query003".to_string(), "gorilla".to_string()),
            ]
        );
    }
}
