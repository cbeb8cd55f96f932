use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use tempfile::NamedTempFile;

use crate::error::{Result, VariantisError};
use crate::fasta;
use crate::types::{AlignedPair, AlignedRecord, PsaProgram, SequenceRecord};

/// One pairwise alignment to perform
#[derive(Debug, Clone, Copy)]
pub struct AlignRequest<'a> {
    pub program: PsaProgram,
    pub first: &'a SequenceRecord,
    pub second: &'a SequenceRecord,
    pub matrix: &'a str,
    pub gap_open: f64,
    pub gap_extend: f64,
}

/// Global pairwise aligner. Implementations behave as a pure function of the
/// request.
pub trait PairwiseAligner: Send + Sync {
    fn align(&self, request: &AlignRequest<'_>) -> Result<AlignedPair>;
    fn name(&self) -> &'static str;
}

/// Runs the EMBOSS `needle` and `stretcher` binaries
#[derive(Debug, Clone)]
pub struct EmbossAligner {
    needle_path: PathBuf,
    stretcher_path: PathBuf,
}

impl EmbossAligner {
    pub fn new(needle_path: Option<PathBuf>, stretcher_path: Option<PathBuf>) -> Self {
        Self {
            needle_path: needle_path.unwrap_or_else(|| locate("needle")),
            stretcher_path: stretcher_path.unwrap_or_else(|| locate("stretcher")),
        }
    }

    fn binary(&self, program: PsaProgram) -> &PathBuf {
        match program {
            PsaProgram::Needle => &self.needle_path,
            PsaProgram::Stretcher => &self.stretcher_path,
        }
    }
}

fn locate(binary: &str) -> PathBuf {
    which::which(binary).unwrap_or_else(|_| PathBuf::from(binary))
}

fn write_single_fasta(record: &SequenceRecord) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("variantis-")
        .suffix(".fasta")
        .tempfile()?;
    writeln!(file, ">{}", record.id)?;
    writeln!(file, "{}", record.sequence)?;
    file.flush()?;
    Ok(file)
}

impl PairwiseAligner for EmbossAligner {
    fn align(&self, request: &AlignRequest<'_>) -> Result<AlignedPair> {
        let program = request.program.as_str();
        let start_time = Instant::now();

        let first = write_single_fasta(request.first)?;
        let second = write_single_fasta(request.second)?;

        let mut cmd = Command::new(self.binary(request.program));
        cmd.arg("-asequence")
            .arg(first.path())
            .arg("-bsequence")
            .arg(second.path())
            .arg("-snucleotide1")
            .arg("-snucleotide2")
            .arg("-datafile")
            .arg(request.matrix)
            .arg("-gapopen")
            .arg(request.gap_open.to_string())
            .arg("-gapextend")
            .arg(request.gap_extend.to_string())
            .arg("-aformat")
            .arg("fasta")
            .arg("-outfile")
            .arg("stdout")
            .arg("-auto");

        log::debug!("Running {}: {:?}", program, cmd);

        let output = cmd
            .output()
            .map_err(|e| VariantisError::alignment(program, format!("failed to start: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VariantisError::alignment(program, stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut entries = fasta::parse_str(&stdout)
            .map_err(|e| VariantisError::alignment(program, format!("unreadable output: {}", e)))?
            .into_iter();

        let (first, second) = match (entries.next(), entries.next(), entries.next()) {
            (Some(a), Some(b), None) => (a, b),
            _ => {
                return Err(VariantisError::alignment(
                    program,
                    "expected exactly two aligned sequences",
                ))
            }
        };
        if first.sequence.len() != second.sequence.len() {
            return Err(VariantisError::alignment(program, "aligned sequences differ in length"));
        }

        log::debug!(
            "{} aligned {} vs {} in {:.3}s",
            program,
            request.first.id,
            request.second.id,
            start_time.elapsed().as_secs_f64()
        );

        Ok(AlignedPair {
            first: AlignedRecord { header: first.header, sequence: first.sequence.to_ascii_uppercase() },
            second: AlignedRecord { header: second.header, sequence: second.sequence.to_ascii_uppercase() },
        })
    }

    fn name(&self) -> &'static str {
        "emboss"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, seq: &str) -> SequenceRecord {
        SequenceRecord { id: id.into(), description: id.into(), sequence: seq.into() }
    }

    #[test]
    fn test_missing_binary_is_alignment_error() {
        let aligner = EmbossAligner::new(
            Some(PathBuf::from("/nonexistent/needle")),
            Some(PathBuf::from("/nonexistent/stretcher")),
        );
        let a = record("query001", "ACGT");
        let b = record("query002", "ACGG");
        let request = AlignRequest {
            program: PsaProgram::Needle,
            first: &a,
            second: &b,
            matrix: crate::types::SCORING_MATRIX,
            gap_open: 10.0,
            gap_extend: 0.5,
        };
        let err = aligner.align(&request).unwrap_err();
        assert!(matches!(err, VariantisError::Alignment { .. }));
        assert!(err.to_string().contains("needle"));
    }

    #[test]
    fn test_whole_number_penalties_format_as_integers() {
        assert_eq!(16.0_f64.to_string(), "16");
        assert_eq!(0.5_f64.to_string(), "0.5");
    }
}
