//! On-disk layout of session artifacts
//!
//! Every session owns `<uploads>/<session_id>/` and `<results>/<session_id>/`.
//! Artifacts are replaced atomically so that a concurrent reader (or a
//! second pipeline run for the same session) never observes a partial file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::types::{ArtifactPaths, SessionId};

pub const ALIGNMENT_FILE: &str = "alignment.fasta";
pub const USER_ALIGNMENT_FILE: &str = "user_alignment.fasta";
pub const PROCESSED_ALIGNMENT_FILE: &str = "alignment_processed.fasta";
pub const NUCLEOTIDE_WORKBOOK: &str = "nucleotide.xlsx";
pub const USER_NUCLEOTIDE_WORKBOOK: &str = "user_nucleotide.xlsx";
pub const TRANSRATIO_WORKBOOK: &str = "transratio.xlsx";
pub const SUMMARY_FEATURES_WORKBOOK: &str = "summary_features.xlsx";
pub const SUMMARY_ALIGNMENT_WORKBOOK: &str = "summary_alignment.xlsx";

/// File name used when sequences are pasted rather than uploaded
pub const PASTED_INPUT_FILE: &str = "pasted_sequences.fasta";

/// Artifacts a client may download, by public name
pub const DOWNLOADABLE: [&str; 5] = [
    NUCLEOTIDE_WORKBOOK,
    TRANSRATIO_WORKBOOK,
    USER_ALIGNMENT_FILE,
    SUMMARY_FEATURES_WORKBOOK,
    SUMMARY_ALIGNMENT_WORKBOOK,
];

/// Roots under which per-session directories are created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    pub uploads_root: PathBuf,
    pub results_root: PathBuf,
}

impl StorageLayout {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(uploads_root: P, results_root: Q) -> Self {
        Self {
            uploads_root: uploads_root.into(),
            results_root: results_root.into(),
        }
    }

    pub fn upload_dir(&self, id: &SessionId) -> PathBuf {
        self.uploads_root.join(id.to_string())
    }

    pub fn results_dir(&self, id: &SessionId) -> PathBuf {
        self.results_root.join(id.to_string())
    }

    pub fn session_dirs(&self, id: &SessionId) -> [PathBuf; 2] {
        [self.upload_dir(id), self.results_dir(id)]
    }

    pub fn ensure_roots(&self) -> io::Result<()> {
        fs::create_dir_all(&self.uploads_root)?;
        fs::create_dir_all(&self.results_root)
    }

    pub fn create_session_dirs(&self, id: &SessionId) -> io::Result<()> {
        for dir in self.session_dirs(id) {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn artifact_paths(&self, id: &SessionId) -> ArtifactPaths {
        let dir = self.results_dir(id);
        ArtifactPaths {
            alignment: dir.join(ALIGNMENT_FILE),
            user_alignment: dir.join(USER_ALIGNMENT_FILE),
            processed_alignment: dir.join(PROCESSED_ALIGNMENT_FILE),
            nucleotide_matrix: dir.join(NUCLEOTIDE_WORKBOOK),
            user_nucleotide_matrix: dir.join(USER_NUCLEOTIDE_WORKBOOK),
            transratio_matrix: dir.join(TRANSRATIO_WORKBOOK),
            summary_features: dir.join(SUMMARY_FEATURES_WORKBOOK),
            summary_alignment: dir.join(SUMMARY_ALIGNMENT_WORKBOOK),
        }
    }

    /// Session ids that own a directory under either root
    pub fn session_dir_ids(&self) -> io::Result<Vec<SessionId>> {
        let mut ids = Vec::new();
        for root in [&self.uploads_root, &self.results_root] {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                // Anything not named like a session is left alone.
                if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<SessionId>().ok()) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ArtifactPaths {
    /// Resolve a public download name to its on-disk path
    pub fn by_public_name(&self, name: &str) -> Option<&Path> {
        match name {
            NUCLEOTIDE_WORKBOOK => Some(&self.nucleotide_matrix),
            TRANSRATIO_WORKBOOK => Some(&self.transratio_matrix),
            USER_ALIGNMENT_FILE => Some(&self.user_alignment),
            SUMMARY_FEATURES_WORKBOOK => Some(&self.summary_features),
            SUMMARY_ALIGNMENT_WORKBOOK => Some(&self.summary_alignment),
            _ => None,
        }
    }
}

/// Write `contents` to `path` via a temporary sibling and a rename.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Remove a file or directory. Returns `false` if nothing was there.
pub fn remove_path(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"))
}

/// Reduce a client-supplied file name to a safe basename.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = unsafe_chars().replace_all(base.trim(), "_");
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    if cleaned.is_empty() {
        PASTED_INPUT_FILE.to_string()
    } else {
        cleaned
    }
}
