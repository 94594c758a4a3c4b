//! Per-folder debounce coordination.
//!
//! Raw filesystem notifications arrive in bursts while capture software is
//! still writing. Each folder gets one pending timer, reset on every new
//! event, so a burst of N events yields exactly one processing attempt timed
//! from the last event. A per-folder guard keeps reconciliations for the
//! same folder from ever overlapping; a timer expiring mid-run queues one
//! follow-up attempt for when the run completes, so every witnessed file
//! list eventually gets reconciled.
//!
//! Folder lifecycle: `Idle -> Pending(timer) -> Running -> Idle`, with the
//! scan/settle/threshold gates inside the processor aborting back to `Idle`
//! and a queued rerun looping `Running` once more before retiring.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use snapbooth_model::ReconcileOutcome;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;

/// The deferred work a fired timer runs: one gated reconciliation attempt.
#[async_trait]
pub trait FolderProcessor: Send + Sync {
    async fn process(&self, folder_name: &str, folder_path: &Path) -> Result<ReconcileOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FolderPhase {
    Pending,
    Running,
}

#[derive(Debug)]
struct FolderEntry {
    phase: FolderPhase,
    timer: Option<JoinHandle<()>>,
    /// Set when a timer expired mid-run: the running attempt must go again
    /// so the file list witnessed by that event is not lost.
    rerun: bool,
}

/// Collapses event bursts into single deferred processing calls.
///
/// All timer and guard state is owned here; clearing the coordinator (on
/// supervisor reload or shutdown) cancels pending timers but never an
/// in-flight reconciliation, which runs to completion independently.
pub struct DebounceCoordinator {
    window: Duration,
    processor: Arc<dyn FolderProcessor>,
    folders: Arc<Mutex<HashMap<String, FolderEntry>>>,
}

impl std::fmt::Debug for DebounceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceCoordinator")
            .field("window", &self.window)
            .finish()
    }
}

impl DebounceCoordinator {
    pub fn new(window: Duration, processor: Arc<dyn FolderProcessor>) -> Self {
        Self {
            window,
            processor,
            folders: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record one raw filesystem notification for a folder. Cancels any
    /// pending timer for that folder and restarts the deferral from now.
    pub async fn note_event(&self, folder_name: &str, folder_path: PathBuf) {
        let mut folders = self.folders.lock().await;
        let entry = folders.entry(folder_name.to_string()).or_insert(FolderEntry {
            phase: FolderPhase::Pending,
            timer: None,
            rerun: false,
        });

        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        if entry.phase != FolderPhase::Running {
            entry.phase = FolderPhase::Pending;
        }

        let window = self.window;
        let processor = Arc::clone(&self.processor);
        let registry = Arc::clone(&self.folders);
        let name = folder_name.to_string();
        entry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            fire(registry, processor, name, folder_path).await;
        }));
    }

    /// Whether a reconciliation for this folder is currently in flight.
    pub async fn is_running(&self, folder_name: &str) -> bool {
        matches!(
            self.folders.lock().await.get(folder_name),
            Some(entry) if entry.phase == FolderPhase::Running
        )
    }

    /// Cancel all pending timers. In-flight reconciliations are not
    /// cancelled; they finish or fail on their own.
    pub async fn clear(&self) {
        let mut folders = self.folders.lock().await;
        for (_, entry) in folders.drain() {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }

    #[cfg(test)]
    pub async fn pending_count(&self) -> usize {
        self.folders.lock().await.len()
    }
}

/// Timer expiry: take the guard, then run the processor on a detached task
/// so that a later `note_event` aborting the timer handle can never cancel a
/// reconciliation mid-flight.
///
/// A timer that expires while a run is in flight marks the entry for a
/// rerun instead of processing: its debounce window has already elapsed, so
/// the running attempt goes straight again on completion and the file list
/// that event witnessed is never lost.
async fn fire(
    registry: Arc<Mutex<HashMap<String, FolderEntry>>>,
    processor: Arc<dyn FolderProcessor>,
    folder_name: String,
    folder_path: PathBuf,
) {
    {
        let mut folders = registry.lock().await;
        match folders.get_mut(&folder_name) {
            Some(entry) if entry.phase == FolderPhase::Running => {
                entry.timer = None;
                entry.rerun = true;
                debug!("{folder_name}: reconciliation in flight, queueing rerun");
                return;
            }
            Some(entry) => {
                entry.phase = FolderPhase::Running;
                entry.timer = None;
                entry.rerun = false;
            }
            None => {
                // Cleared between sleep and fire (supervisor reload).
                return;
            }
        }
    }

    tokio::spawn(async move {
        loop {
            match processor.process(&folder_name, &folder_path).await {
                Ok(outcome) => debug!("{folder_name}: {outcome:?}"),
                Err(err) => warn!("{folder_name}: reconciliation failed: {err}"),
            }

            let mut folders = registry.lock().await;
            let (retire, again) = match folders.get_mut(&folder_name) {
                Some(entry) if entry.timer.is_some() => {
                    // A newer event restarted the window; its timer rescans
                    // and supersedes any queued rerun.
                    entry.phase = FolderPhase::Pending;
                    entry.rerun = false;
                    (false, false)
                }
                Some(entry) if entry.rerun => {
                    entry.rerun = false;
                    (false, true)
                }
                Some(_) => (true, false),
                None => (false, false),
            };
            if retire {
                folders.remove(&folder_name);
            }
            if !again {
                break;
            }
        }
    });
}
