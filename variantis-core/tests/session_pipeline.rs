use std::sync::{Arc, Barrier};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use tempfile::TempDir;
use variantis_core::clock::ManualClock;
use variantis_core::types::AlignedRecord;
use variantis_core::{
    AlignRequest, AlignedPair, AlignmentService, ErrorKind, Pipeline, PairwiseAligner, ProgramLimits, PsaProgram,
    SessionPolicy, SessionStatus, SessionStore, StorageLayout, Submission, SubmissionInput, Sweeper,
    VariantisError, XlsxWorkbookWriter,
};

/// Aligns by padding the shorter sequence with trailing gaps
struct PaddingAligner;

impl PairwiseAligner for PaddingAligner {
    fn align(&self, request: &AlignRequest<'_>) -> variantis_core::Result<AlignedPair> {
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

struct BrokenAligner;

impl PairwiseAligner for BrokenAligner {
    fn align(&self, request: &AlignRequest<'_>) -> variantis_core::Result<AlignedPair> {
        Err(VariantisError::alignment(request.program.as_str(), "segmentation fault in /opt/emboss"))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

struct Harness {
    _dir: TempDir,
    clock: Arc<ManualClock>,
    store: Arc<SessionStore>,
    service: AlignmentService,
}

fn harness_with(aligner: Arc<dyn PairwiseAligner>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("uploads"), dir.path().join("results"));
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()));
    let store = Arc::new(
        SessionStore::open_in_memory(layout, SessionPolicy::default())
            .unwrap()
            .with_clock(clock.clone()),
    );
    let pipeline = Pipeline::new(aligner, Arc::new(XlsxWorkbookWriter));
    let service = AlignmentService::new(store.clone(), pipeline, ProgramLimits::default());
    Harness { _dir: dir, clock, store, service }
}

fn harness() -> Harness {
    harness_with(Arc::new(PaddingAligner))
}

fn start(h: &Harness) -> String {
    match h.service.start_session("127.0.0.1").unwrap() {
        SessionStatus::Active { session_id } => session_id.to_string(),
        SessionStatus::Busy => panic!("service unexpectedly busy"),
    }
}

fn pasted(text: &str) -> Submission {
    Submission {
        input: SubmissionInput::Pasted(text.to_string()),
        program: PsaProgram::Needle,
        gap_open: 10.0,
        gap_extend: 0.5,
    }
}

#[test]
fn two_sequences_produce_one_classified_pair() {
    let h = harness();
    let token = start(&h);

    let receipt = h.service.submit(&token, pasted(">s1\nATCG\n>s2\nATGG\n")).unwrap();
    assert_eq!(receipt.num_sequences, 2);
    assert_eq!(receipt.program, PsaProgram::Needle);
    assert_eq!(receipt.file_name, "pasted_sequences.fasta");

    let results = h.service.run_results(&token).unwrap();
    assert_eq!(results.pairs.len(), 1);
    let pair = &results.pairs[0];
    assert_eq!(pair.pair, "query001_vs_query002");
    assert_eq!(pair.identical, 3);
    assert_eq!(pair.transitions, 0);
    assert_eq!(pair.transversions, 1);
    assert_eq!(pair.gaps, 0);
    assert_eq!(pair.ratio, "undefined");
    assert_eq!(
        results.id_mapping,
        vec![("query001".to_string(), "s1".to_string()), ("query002".to_string(), "s2".to_string())]
    );

    let details = h.service.run_details(&token).unwrap();
    assert_eq!(details.matrix, "EDNAFULL");
    assert_eq!(details.downloads.len(), 5);

    let view = h.service.extract_pair(&token, "QUERY002", "query001").unwrap();
    assert_eq!(view.pair.query_sequence, "ATGG");
    assert_eq!(view.counts.transversions, 1);

    let workbook = h.service.download(&token, "transratio.xlsx").unwrap();
    assert!(workbook.is_file());
    let err = h.service.download(&token, "alignment.fasta").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn uploaded_file_is_screened_and_stored() {
    let h = harness();
    let token = start(&h);
    let submission = Submission {
        input: SubmissionInput::File {
            name: "../my seqs.fasta".to_string(),
            bytes: b">a first\nACGTACGT\n>b second\nACGAACGT\n>c\nACGTACCT\n".to_vec(),
        },
        program: PsaProgram::Needle,
        gap_open: 10.0,
        gap_extend: 0.5,
    };

    let receipt = h.service.submit(&token, submission).unwrap();
    assert_eq!(receipt.file_name, "my_seqs.fasta");
    assert_eq!(receipt.num_sequences, 3);

    let results = h.service.run_results(&token).unwrap();
    assert_eq!(results.pairs.len(), 3);
    assert_eq!(h.service.id_mapping(&token).unwrap()[1], ("query002".to_string(), "b second".to_string()));
}

#[test]
fn long_needle_input_switches_to_stretcher() {
    let h = harness();
    let token = start(&h);
    let text = format!(">long\n{}\n>other\n{}\n", "A".repeat(3500), "C".repeat(3400));

    let receipt = h.service.submit(&token, pasted(&text)).unwrap();
    assert_eq!(receipt.program, PsaProgram::Stretcher);
    assert_eq!(receipt.gap_open, 16.0);
    assert_eq!(receipt.gap_extend, 4.0);
}

#[test]
fn rejected_submission_tears_down_session() {
    let h = harness();
    let token = start(&h);
    let id = token.parse().unwrap();

    let err = h.service.submit(&token, pasted(">only\nACGT\n")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.public_message().contains("At least two sequences"));

    assert!(!h.store.session_exists(&id).unwrap());
    assert!(!h.store.layout().upload_dir(&id).exists());
    assert_eq!(h.service.run_results(&token).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn executable_upload_is_rejected() {
    let h = harness();
    let token = start(&h);
    let submission = Submission {
        input: SubmissionInput::File { name: "run.sh".into(), bytes: b"#!/bin/sh\nrm -rf /\n".to_vec() },
        program: PsaProgram::Needle,
        gap_open: 10.0,
        gap_extend: 0.5,
    };
    let err = h.service.submit(&token, submission).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn results_after_sweeper_deletion_are_not_found() {
    let h = harness();
    let token = start(&h);
    h.service.submit(&token, pasted(">s1\nATCG\n>s2\nATGG\n")).unwrap();

    h.clock.advance(ChronoDuration::minutes(16));
    let report = Sweeper::new(h.store.clone(), Duration::from_secs(900)).sweep_once();
    assert_eq!(report.idle_ended, 1);

    let err = h.service.run_results(&token).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(err, VariantisError::NotFound { .. }));
}

#[test]
fn expired_session_is_not_found_and_removed() {
    let h = harness();
    let token = start(&h);
    let id = token.parse().unwrap();
    h.service.submit(&token, pasted(">s1\nATCG\n>s2\nATGG\n")).unwrap();
    let results_dir = h.store.layout().results_dir(&id);

    // Keep it active, but past its absolute lifetime.
    for _ in 0..3 {
        h.clock.advance(ChronoDuration::minutes(10));
        h.store.touch(&id).unwrap();
    }
    h.clock.advance(ChronoDuration::minutes(2));

    for _ in 0..2 {
        assert_eq!(h.service.run_results(&token).unwrap_err().kind(), ErrorKind::NotFound);
    }
    assert!(!h.store.session_exists(&id).unwrap());
    assert!(!results_dir.exists());
}

#[test]
fn aligner_failure_is_internal_and_masked() {
    let h = harness_with(Arc::new(BrokenAligner));
    let token = start(&h);
    h.service.submit(&token, pasted(">s1\nATCG\n>s2\nATGG\n")).unwrap();

    let err = h.service.run_results(&token).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.public_message(), "Internal server error");
    assert!(!err.public_message().contains("/opt/emboss"));
}

#[test]
fn repeated_runs_overwrite_artifacts() {
    let h = harness();
    let token = start(&h);
    h.service.submit(&token, pasted(">s1\nATCG\n>s2\nATGG\n")).unwrap();

    let first = h.service.run_results(&token).unwrap();
    let second = h.service.run_results(&token).unwrap();
    assert_eq!(first, second);
}

#[test]
fn second_submission_is_rejected_without_teardown() {
    let h = harness();
    let token = start(&h);
    h.service.submit(&token, pasted(">s1\nATCG\n>s2\nATGG\n")).unwrap();

    let err = h.service.submit(&token, pasted(">s1\nAAAA\n>s2\nCCCC\n")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.service.run_details(&token).is_ok());
}

#[test]
fn racing_submissions_keep_the_recorded_one() {
    let payloads = [">s1\nATCG\n>s2\nATGG\n", ">a\nAAAA\n>b\nCCCC\n>c\nGGGG\n"];

    for _ in 0..20 {
        let h = harness();
        let token = start(&h);
        let barrier = Barrier::new(payloads.len());

        let outcomes: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = payloads
                .iter()
                .map(|text| {
                    let (service, token, barrier) = (&h.service, &token, &barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        service.submit(token, pasted(text))
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        let accepted: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        assert_eq!(accepted.len(), 1);
        let rejected = outcomes.iter().find_map(|o| o.as_ref().err()).unwrap();
        assert_eq!(rejected.kind(), ErrorKind::Validation);
        assert!(rejected.public_message().contains("already submitted"));

        let details = h.service.run_details(&token).unwrap();
        assert_eq!(details.num_sequences, accepted[0].num_sequences);
        let id = token.parse().unwrap();
        let upload = h.store.get_session_data(&id).unwrap().unwrap().upload_file;
        let stored = std::fs::read_to_string(upload).unwrap();
        let winner = if accepted[0].num_sequences == 2 { payloads[0] } else { payloads[1] };
        assert_eq!(stored, winner);
    }
}

#[test]
fn end_session_removes_everything() {
    let h = harness();
    let token = start(&h);
    let id = token.parse().unwrap();
    h.service.submit(&token, pasted(">s1\nATCG\n>s2\nATGG\n")).unwrap();
    h.service.run_results(&token).unwrap();
    let workbook = h.service.download(&token, "summary_features.xlsx").unwrap();

    h.service.end_session(&token).unwrap();

    assert!(!workbook.exists());
    assert!(!h.store.session_exists(&id).unwrap());
    assert_eq!(h.service.run_details(&token).unwrap_err().kind(), ErrorKind::NotFound);
    // Ending twice is harmless.
    h.service.end_session(&token).unwrap();
}

#[test]
fn capacity_is_reported_as_busy() {
    let h = harness();
    for _ in 0..15 {
        start(&h);
    }
    assert_eq!(h.service.start_session("10.1.1.1").unwrap(), SessionStatus::Busy);
}

#[test]
fn malformed_tokens_are_not_found() {
    let h = harness();
    let err = h.service.run_results("../../etc/passwd").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
