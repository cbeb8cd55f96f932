//! Variantis Core Library
//!
//! Session store and lifecycle sweeper, the pairwise alignment pipeline, and
//! the nucleotide substitution classifier.

pub mod error;
pub mod types;
pub mod clock;
pub mod artifacts;
pub mod fasta;
pub mod intake;
pub mod aligner;
pub mod orchestrator;
pub mod normalizer;
pub mod classifier;
pub mod extract;
pub mod workbook;
pub mod pipeline;
pub mod store;
pub mod sweeper;
pub mod service;

// Re-export commonly used types and functions
pub use error::{ErrorKind, Result, VariantisError};
pub use types::{AlignedPair, AlignedRecord, AlignmentParams, PsaProgram, SequenceRecord, Session, SessionData, SessionId, SessionStatus};
pub use artifacts::StorageLayout;
pub use aligner::{AlignRequest, EmbossAligner, PairwiseAligner};
pub use classifier::{classify_column, ClassificationReport, ColumnClass, SubstitutionStats};
pub use intake::ProgramLimits;
pub use pipeline::Pipeline;
pub use store::{SessionPolicy, SessionStore};
pub use sweeper::{SweepReport, Sweeper};
pub use service::{AlignmentService, Submission, SubmissionInput};
pub use workbook::{WorkbookWriter, XlsxWorkbookWriter};

/// Version information for the Variantis core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
