use std::sync::Arc;
use std::time::Instant;

use crate::aligner::PairwiseAligner;
use crate::classifier::{self, ClassificationReport};
use crate::error::Result;
use crate::normalizer;
use crate::orchestrator::{self, AlignmentRun};
use crate::types::SessionData;
use crate::workbook::WorkbookWriter;

/// Everything a completed run produced, besides the files
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub alignment: AlignmentRun,
    pub report: ClassificationReport,
}

/// Orchestrator, normalizer and classifier run back to back over one
/// session's files.
#[derive(Clone)]
pub struct Pipeline {
    aligner: Arc<dyn PairwiseAligner>,
    writer: Arc<dyn WorkbookWriter>,
}

impl Pipeline {
    pub fn new(aligner: Arc<dyn PairwiseAligner>, writer: Arc<dyn WorkbookWriter>) -> Self {
        Self { aligner, writer }
    }

    pub fn aligner_name(&self) -> &'static str {
        self.aligner.name()
    }

    /// Run every stage for `data`. Each artifact is replaced atomically, so a
    /// second run for the same session simply overwrites the first.
    pub fn run(&self, data: &SessionData) -> Result<PipelineOutcome> {
        let start_time = Instant::now();
        let paths = &data.artifacts;

        let alignment = orchestrator::align_file(
            self.aligner.as_ref(),
            &data.upload_file,
            &data.params,
            &paths.alignment,
            &paths.user_alignment,
        )?;
        log::debug!("Session {}: {} pairs aligned", data.session_id, alignment.pairs.len());

        let blocks = normalizer::normalize_file(&paths.alignment, &paths.processed_alignment)?;
        log::debug!("Session {}: {} blocks normalized", data.session_id, blocks);

        let report = classifier::classify_file(&paths.processed_alignment)?;
        report.write_reports(self.writer.as_ref(), paths)?;

        log::info!(
            "Session {}: pipeline finished in {:.2}s ({} sequences, {} pairs)",
            data.session_id,
            start_time.elapsed().as_secs_f64(),
            alignment.sequences,
            report.pairs.len()
        );

        Ok(PipelineOutcome { alignment, report })
    }
}
