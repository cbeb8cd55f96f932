//! Sweep commands - reclaim expired sessions once or on a schedule

use anyhow::{Context, Result};
use variantis_core::Sweeper;

use crate::commands::{open_store, print_json};
use crate::config::Config;

pub fn once(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let report = Sweeper::new(store, config.sweep_interval()).sweep_once();

    if json {
        return print_json(&report);
    }
    println!(
        "Ended {} idle and {} stale sessions, removed {} orphaned directories ({} failures)",
        report.idle_ended, report.stale_ended, report.orphans_removed, report.failures
    );
    Ok(())
}

/// Sweep on the configured interval until interrupted.
pub fn daemon(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let sweeper = Sweeper::new(store, config.sweep_interval());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let handle = sweeper.spawn();
        log::info!("Sweeper daemon started, press Ctrl-C to stop");
        let signal = tokio::signal::ctrl_c().await;
        handle.stop().await;
        signal.context("Failed to listen for Ctrl-C")
    })
}
