//! Command implementations for the Variantis CLI

pub mod session;
pub mod submit;
pub mod results;
pub mod sweep;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use variantis_core::{AlignmentService, EmbossAligner, Pipeline, SessionStore, XlsxWorkbookWriter};

use crate::config::Config;

/// Open the session database described by the configuration.
pub fn open_store(config: &Config) -> Result<Arc<SessionStore>> {
    let layout = config.layout();
    layout
        .ensure_roots()
        .with_context(|| format!("Failed to create storage under {}", layout.uploads_root.display()))?;
    let store = SessionStore::open(&config.storage.db_path, layout, config.policy())
        .with_context(|| format!("Failed to open session database: {}", config.storage.db_path.display()))?;
    Ok(Arc::new(store))
}

/// Wire the store, the EMBOSS aligner and the workbook writer together.
pub fn open_service(config: &Config) -> Result<AlignmentService> {
    let store = open_store(config)?;
    let aligner = EmbossAligner::new(
        config.alignment.needle_path.clone(),
        config.alignment.stretcher_path.clone(),
    );
    let pipeline = Pipeline::new(Arc::new(aligner), Arc::new(XlsxWorkbookWriter));
    log::debug!("Using {} aligner", pipeline.aligner_name());
    Ok(AlignmentService::new(store, pipeline, config.limits()))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
