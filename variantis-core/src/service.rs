//! Request-level operations
//!
//! Every session-scoped operation starts with [`AlignmentService::authorize`],
//! which refreshes the session and fails with `NotFound` when it is unknown,
//! ended or expired.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::artifacts::{sanitize_file_name, write_atomic, DOWNLOADABLE, PASTED_INPUT_FILE};
use crate::classifier::PairSummary;
use crate::error::{ErrorKind, Result, VariantisError};
use crate::extract::{self, PairView};
use crate::intake::{self, ProgramLimits};
use crate::orchestrator;
use crate::pipeline::Pipeline;
use crate::store::{NewSessionData, SessionStore};
use crate::types::{AlignmentParams, PsaProgram, SessionData, SessionId, SessionStatus, SCORING_MATRIX};

/// Where submitted sequences come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionInput {
    /// An uploaded file: client-supplied name and raw contents
    File { name: String, bytes: Vec<u8> },
    /// FASTA text pasted by the user
    Pasted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub input: SubmissionInput,
    pub program: PsaProgram,
    pub gap_open: f64,
    pub gap_extend: f64,
}

/// Accepted submission as reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub session_id: SessionId,
    pub file_name: String,
    pub program: PsaProgram,
    pub gap_open: f64,
    pub gap_extend: f64,
    pub num_sequences: usize,
}

/// Results of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResults {
    pub session_id: SessionId,
    pub num_sequences: usize,
    pub id_mapping: Vec<(String, String)>,
    pub pairs: Vec<PairSummary>,
}

/// Parameters the alignment ran (or will run) with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetails {
    pub program: PsaProgram,
    pub gap_open: f64,
    pub gap_extend: f64,
    pub matrix: &'static str,
    pub sequence_type: &'static str,
    pub output_format: &'static str,
    pub num_sequences: usize,
    /// Downloadable artifacts that currently exist
    pub downloads: Vec<&'static str>,
}

pub struct AlignmentService {
    store: Arc<SessionStore>,
    pipeline: Pipeline,
    limits: ProgramLimits,
}

/// Screened submission, ready to be recorded
struct AcceptedInput {
    file_name: String,
    bytes: Vec<u8>,
    params: AlignmentParams,
    num_sequences: usize,
}

fn expired() -> VariantisError {
    VariantisError::not_found("Invalid or expired session")
}

fn already_submitted() -> VariantisError {
    VariantisError::validation("Sequences were already submitted for this session")
}

impl AlignmentService {
    pub fn new(store: Arc<SessionStore>, pipeline: Pipeline, limits: ProgramLimits) -> Self {
        Self { store, pipeline, limits }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Session guard: parse the token, refresh activity, confirm the session
    /// is still live.
    pub fn authorize(&self, token: &str) -> Result<SessionId> {
        let id: SessionId = token.parse()?;
        if !self.store.touch(&id)? {
            // Expired by this touch; reclaim it now rather than at the next sweep.
            if self.store.session_exists(&id)? {
                self.store.end(&id)?;
            }
            return Err(expired());
        }
        match self.store.get_active(&id)? {
            Some(_) => Ok(id),
            None => Err(expired()),
        }
    }

    fn session_data(&self, id: &SessionId) -> Result<SessionData> {
        self.store
            .get_session_data(id)?
            .ok_or_else(|| VariantisError::not_found("Session data"))
    }

    fn log_internal(&self, id: &SessionId, operation: &str, err: &VariantisError) {
        if err.kind() == ErrorKind::Internal {
            log::error!("Session {}: {} failed: {}", id, operation, err);
        }
    }

    pub fn start_session(&self, client_addr: &str) -> Result<SessionStatus> {
        self.store.start_session(client_addr)
    }

    /// Screen, store and validate submitted sequences, then record the
    /// session's data row. A rejected submission ends the session unless
    /// another submission for it has already been recorded.
    pub fn submit(&self, token: &str, submission: Submission) -> Result<SubmissionReceipt> {
        let id = self.authorize(token)?;
        if self.store.get_session_data(&id)?.is_some() {
            return Err(already_submitted());
        }

        self.store.layout().create_session_dirs(&id)?;
        let accepted = match self.prepare(submission) {
            Ok(accepted) => accepted,
            Err(err) => return Err(self.reject(&id, err)),
        };

        let upload_file = self.store.layout().upload_dir(&id).join(&accepted.file_name);
        let inserted = self.store.insert_session_data(
            &id,
            NewSessionData {
                upload_file: upload_file.clone(),
                params: accepted.params,
                num_sequences: accepted.num_sequences,
                artifacts: self.store.layout().artifact_paths(&id),
            },
        );
        let data = match inserted {
            Ok(data) => data,
            Err(VariantisError::DuplicateSessionData { .. }) => {
                log::warn!("Session {}: concurrent submission lost the race", id);
                return Err(already_submitted());
            }
            Err(err) => return Err(self.reject(&id, err)),
        };

        // The data row is ours from here on, so a failed write ends the session.
        if let Err(err) = write_atomic(&upload_file, &accepted.bytes) {
            self.log_internal(&id, "submission", &err);
            if let Err(cleanup) = self.store.end(&id) {
                log::error!("Session {}: teardown after failed upload write failed: {}", id, cleanup);
            }
            return Err(err);
        }

        let params = data.params;
        log::info!(
            "Session {}: accepted {} sequences for {} (gap open {}, gap extend {})",
            id,
            data.num_sequences,
            params.program,
            params.gap_open,
            params.gap_extend
        );

        Ok(SubmissionReceipt {
            session_id: id,
            file_name: accepted.file_name,
            program: params.program,
            gap_open: params.gap_open,
            gap_extend: params.gap_extend,
            num_sequences: data.num_sequences,
        })
    }

    /// End the session after a rejected submission, unless a concurrent
    /// submission has already recorded data for it.
    fn reject(&self, id: &SessionId, err: VariantisError) -> VariantisError {
        self.log_internal(id, "submission", &err);
        match self.store.get_session_data(id) {
            Ok(Some(_)) => {
                log::warn!("Session {}: submission rejected after another was recorded", id);
            }
            Ok(None) => {
                if let Err(cleanup) = self.store.end(id) {
                    log::error!("Session {}: teardown after rejected submission failed: {}", id, cleanup);
                }
            }
            Err(lookup) => log::error!("Session {}: checking session data failed: {}", id, lookup),
        }
        err
    }

    /// Screen and parse a submission without touching the session.
    fn prepare(&self, submission: Submission) -> Result<AcceptedInput> {
        let (file_name, bytes) = match submission.input {
            SubmissionInput::File { name, bytes } => (sanitize_file_name(&name), bytes),
            SubmissionInput::Pasted(text) => {
                if text.trim().is_empty() {
                    return Err(VariantisError::validation(
                        "Please provide either a file or paste sequences",
                    ));
                }
                (PASTED_INPUT_FILE.to_string(), text.into_bytes())
            }
        };

        intake::screen_upload(&file_name, &bytes, &self.limits)?;
        let records = intake::parse_sequences(&String::from_utf8_lossy(&bytes))?;
        let max_length = records.iter().map(|r| r.len()).max().unwrap_or(0);
        let params = intake::select_program(
            submission.program,
            submission.gap_open,
            submission.gap_extend,
            max_length,
            &self.limits,
        )?;

        Ok(AcceptedInput { file_name, bytes, params, num_sequences: records.len() })
    }

    /// Run the alignment pipeline for the session's submission.
    pub fn run_results(&self, token: &str) -> Result<RunResults> {
        let id = self.authorize(token)?;
        let data = self.session_data(&id)?;

        let outcome = self.pipeline.run(&data).map_err(|e| {
            self.log_internal(&id, "pipeline", &e);
            e
        })?;
        let id_mapping = orchestrator::read_id_mapping(&data.artifacts.user_alignment)?;

        Ok(RunResults {
            session_id: id,
            num_sequences: data.num_sequences,
            id_mapping,
            pairs: outcome.report.summaries(),
        })
    }

    /// Per-column view of one aligned pair from the last run
    pub fn extract_pair(&self, token: &str, query: &str, subject: &str) -> Result<PairView> {
        let id = self.authorize(token)?;
        let data = self.session_data(&id)?;
        let processed = &data.artifacts.processed_alignment;
        if !processed.exists() {
            return Err(VariantisError::not_found("Alignment results"));
        }
        let pair = extract::extract_pair_from_file(processed, query, subject)?;
        PairView::build(pair).map_err(|e| {
            self.log_internal(&id, "pair view", &e);
            e
        })
    }

    /// Resolve a public artifact name to its file
    pub fn download(&self, token: &str, name: &str) -> Result<PathBuf> {
        let id = self.authorize(token)?;
        let data = self.session_data(&id)?;
        let path = data
            .artifacts
            .by_public_name(name)
            .ok_or_else(|| VariantisError::not_found(format!("File {}", name)))?;
        if !path.is_file() {
            return Err(VariantisError::not_found(format!("File {}", name)));
        }
        Ok(path.to_path_buf())
    }

    pub fn run_details(&self, token: &str) -> Result<RunDetails> {
        let id = self.authorize(token)?;
        let data = self.session_data(&id)?;
        let downloads = DOWNLOADABLE
            .iter()
            .copied()
            .filter(|name| data.artifacts.by_public_name(name).is_some_and(|p| p.is_file()))
            .collect();

        Ok(RunDetails {
            program: data.params.program,
            gap_open: data.params.gap_open,
            gap_extend: data.params.gap_extend,
            matrix: SCORING_MATRIX,
            sequence_type: "DNA",
            output_format: "FASTA",
            num_sequences: data.num_sequences,
            downloads,
        })
    }

    /// Query id to original description, as recorded in the user alignment
    pub fn id_mapping(&self, token: &str) -> Result<Vec<(String, String)>> {
        let id = self.authorize(token)?;
        let data = self.session_data(&id)?;
        if !data.artifacts.user_alignment.is_file() {
            return Err(VariantisError::not_found("Alignment results"));
        }
        orchestrator::read_id_mapping(&data.artifacts.user_alignment)
    }

    /// End a session on request. Unknown and already-ended sessions are fine.
    pub fn end_session(&self, token: &str) -> Result<()> {
        let id: SessionId = token.parse()?;
        self.store.end(&id)
    }
}
