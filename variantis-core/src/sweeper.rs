//! Periodic reclamation of idle, stale and orphaned sessions

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::artifacts::remove_path;
use crate::error::Result;
use crate::store::SessionStore;
use crate::types::SessionId;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub idle_ended: usize,
    pub stale_ended: usize,
    pub orphans_removed: usize,
    pub failures: usize,
    pub compacted: bool,
}

#[derive(Clone)]
pub struct Sweeper {
    store: Arc<SessionStore>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<SessionStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run every step once. A failing step or session is logged and counted,
    /// and the sweep carries on.
    pub fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.store.now();
        let cutoff = now - self.store.policy().idle_timeout();

        match self.store.idle_sessions(cutoff) {
            Ok(ids) => {
                if !ids.is_empty() {
                    log::info!("Found {} inactive sessions to clean up", ids.len());
                }
                report.idle_ended = self.end_all(&ids, &mut report.failures);
            }
            Err(e) => {
                log::error!("Listing inactive sessions failed: {}", e);
                report.failures += 1;
            }
        }

        match self.store.stale_ended_sessions(cutoff) {
            Ok(ids) => report.stale_ended = self.end_all(&ids, &mut report.failures),
            Err(e) => {
                log::error!("Listing ended sessions failed: {}", e);
                report.failures += 1;
            }
        }

        match self.remove_orphans() {
            Ok((removed, failed)) => {
                report.orphans_removed = removed;
                report.failures += failed;
            }
            Err(e) => {
                log::error!("Orphan directory scan failed: {}", e);
                report.failures += 1;
            }
        }

        match self.store.compact() {
            Ok(()) => report.compacted = true,
            Err(e) => {
                log::error!("Session store compaction failed: {}", e);
                report.failures += 1;
            }
        }

        log::info!(
            "Sweep finished: {} idle, {} stale, {} orphan dirs, {} failures",
            report.idle_ended,
            report.stale_ended,
            report.orphans_removed,
            report.failures
        );
        report
    }

    fn end_all(&self, ids: &[SessionId], failures: &mut usize) -> usize {
        let mut ended = 0;
        for id in ids {
            match self.store.end(id) {
                Ok(()) => ended += 1,
                Err(e) => {
                    log::error!("Error ending session {}: {}", id, e);
                    *failures += 1;
                }
            }
        }
        ended
    }

    /// Delete session directories that have no session row.
    fn remove_orphans(&self) -> Result<(usize, usize)> {
        let layout = self.store.layout();
        let (mut removed, mut failed) = (0, 0);

        for id in layout.session_dir_ids()? {
            match self.store.session_exists(&id) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    log::error!("Checking session {} failed: {}", id, e);
                    failed += 1;
                    continue;
                }
            }
            for dir in layout.session_dirs(&id) {
                match remove_path(&dir) {
                    Ok(true) => {
                        log::info!("Removed orphaned directory {}", dir.display());
                        removed += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        log::warn!("Could not remove orphaned directory {}: {}", dir.display(), e);
                        failed += 1;
                    }
                }
            }
        }
        Ok((removed, failed))
    }

    /// Sweep on every interval tick until `shutdown` turns true or its
    /// sender is dropped. The first sweep runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("Sweeper running every {}s", self.interval.as_secs_f64());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sweeper = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || sweeper.sweep_once()).await {
                        log::error!("Sweep task failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("Sweeper stopped");
    }

    /// Start `run` on the current tokio runtime.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, receiver) = watch::channel(false);
        let task = tokio::spawn(self.run(receiver));
        SweeperHandle { shutdown, task }
    }
}

pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            log::error!("Sweeper task panicked: {}", e);
        }
    }
}
