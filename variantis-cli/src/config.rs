//! Configuration handling for the Variantis CLI
//!
//! Loaded from variantis.toml; every field falls back to its default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use variantis_core::{ProgramLimits, SessionPolicy, StorageLayout};

pub const DEFAULT_CONFIG_FILE: &str = "variantis.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite session database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root of the per-session upload directories
    #[serde(default = "default_uploads_root")]
    pub uploads_root: PathBuf,

    /// Root of the per-session result directories
    #[serde(default = "default_results_root")]
    pub results_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Sessions allowed to be open at once
    #[serde(default = "default_max_active_sessions")]
    pub max_active_sessions: usize,

    /// Lifetime of a session regardless of activity
    #[serde(default = "default_absolute_ttl_minutes")]
    pub absolute_ttl_minutes: i64,

    /// Inactivity after which the sweeper ends a session
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: i64,

    /// Time between sweeps in daemon mode
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Explicit path to the needle binary (PATH lookup otherwise)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needle_path: Option<PathBuf>,

    /// Explicit path to the stretcher binary (PATH lookup otherwise)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stretcher_path: Option<PathBuf>,

    #[serde(default = "default_program")]
    pub default_program: String,

    #[serde(default = "default_gap_open")]
    pub default_gap_open: f64,

    #[serde(default = "default_gap_extend")]
    pub default_gap_extend: f64,

    #[serde(default = "default_needle_max_length")]
    pub needle_max_length: usize,

    #[serde(default = "default_stretcher_max_length")]
    pub stretcher_max_length: usize,

    #[serde(default = "default_stretcher_gap_open")]
    pub stretcher_gap_open: f64,

    #[serde(default = "default_stretcher_gap_extend")]
    pub stretcher_gap_extend: f64,

    /// Worker threads for aligning pairs
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

// Default value functions
fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("variantis")
}
fn default_db_path() -> PathBuf { data_root().join("sessions.db") }
fn default_uploads_root() -> PathBuf { data_root().join("uploads") }
fn default_results_root() -> PathBuf { data_root().join("results") }
fn default_max_active_sessions() -> usize { SessionPolicy::default().max_active_sessions }
fn default_absolute_ttl_minutes() -> i64 { SessionPolicy::default().absolute_ttl_minutes }
fn default_idle_timeout_minutes() -> i64 { SessionPolicy::default().idle_timeout_minutes }
fn default_sweep_interval_minutes() -> u64 { 15 }
fn default_program() -> String { "needle".to_string() }
fn default_gap_open() -> f64 { 10.0 }
fn default_gap_extend() -> f64 { 0.5 }
fn default_needle_max_length() -> usize { ProgramLimits::default().needle_max_length }
fn default_stretcher_max_length() -> usize { ProgramLimits::default().stretcher_max_length }
fn default_stretcher_gap_open() -> f64 { ProgramLimits::default().stretcher_default_gap_open }
fn default_stretcher_gap_extend() -> f64 { ProgramLimits::default().stretcher_default_gap_extend }
fn default_threads() -> usize { num_cpus::get() }
fn default_max_upload_mb() -> u64 { 10 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            uploads_root: default_uploads_root(),
            results_root: default_results_root(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_active_sessions: default_max_active_sessions(),
            absolute_ttl_minutes: default_absolute_ttl_minutes(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            needle_path: None,
            stretcher_path: None,
            default_program: default_program(),
            default_gap_open: default_gap_open(),
            default_gap_extend: default_gap_extend(),
            needle_max_length: default_needle_max_length(),
            stretcher_max_length: default_stretcher_max_length(),
            stretcher_gap_open: default_stretcher_gap_open(),
            stretcher_gap_extend: default_stretcher_gap_extend(),
            threads: default_threads(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { max_upload_mb: default_max_upload_mb() }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default configuration")
    }

    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(&self.storage.uploads_root, &self.storage.results_root)
    }

    pub fn policy(&self) -> SessionPolicy {
        SessionPolicy {
            max_active_sessions: self.sessions.max_active_sessions,
            absolute_ttl_minutes: self.sessions.absolute_ttl_minutes,
            idle_timeout_minutes: self.sessions.idle_timeout_minutes,
        }
    }

    pub fn limits(&self) -> ProgramLimits {
        ProgramLimits {
            needle_max_length: self.alignment.needle_max_length,
            stretcher_max_length: self.alignment.stretcher_max_length,
            stretcher_default_gap_open: self.alignment.stretcher_gap_open,
            stretcher_default_gap_extend: self.alignment.stretcher_gap_extend,
            max_upload_bytes: self.upload.max_upload_mb * 1024 * 1024,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sessions.sweep_interval_minutes.max(1) * 60)
    }
}
