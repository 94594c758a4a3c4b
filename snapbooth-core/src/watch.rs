//! Watch supervision: the filesystem subscription lifecycle plus the
//! startup sweep.
//!
//! A thin wrapper around `notify` that forwards raw notifications into the
//! debounce coordinator. Only subfolder contents qualify; loose files at the
//! watch-root level are never promoted to sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use snapbooth_model::ReconcileOutcome;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::debounce::{DebounceCoordinator, FolderProcessor};
use crate::error::{GalleryError, Result};
use crate::ports::SessionStore;
use crate::reconcile::SessionReconciler;
use crate::scan::list_session_folders;

enum WatchMessage {
    Event(Event),
    Error(String),
}

struct ActiveWatch {
    root: PathBuf,
    // Dropping the watcher stops the notify stream.
    _watcher: RecommendedWatcher,
    event_task: JoinHandle<()>,
}

impl ActiveWatch {
    fn shutdown(self) {
        self.event_task.abort();
    }
}

/// Owns the watch subscription, the debounce state and the startup sweep.
///
/// All watcher state lives inside this struct; `reload` and `stop` clear it
/// explicitly. In-flight reconciliations for an old root are left to finish
/// on their own.
pub struct WatchSupervisor {
    reconciler: Arc<SessionReconciler>,
    store: Arc<dyn SessionStore>,
    debounce: Arc<DebounceCoordinator>,
    config: IngestConfig,
    active: Mutex<Option<ActiveWatch>>,
}

impl std::fmt::Debug for WatchSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSupervisor")
            .field("config", &self.config)
            .finish()
    }
}

impl WatchSupervisor {
    pub fn new(
        reconciler: Arc<SessionReconciler>,
        store: Arc<dyn SessionStore>,
        config: IngestConfig,
    ) -> Self {
        let processor: Arc<dyn FolderProcessor> = reconciler.clone();
        let debounce = Arc::new(DebounceCoordinator::new(config.debounce_window, processor));
        Self {
            reconciler,
            store,
            debounce,
            config,
            active: Mutex::new(None),
        }
    }

    /// Resolve the watch root, sweep it, then subscribe to live events.
    pub async fn start(&self) -> Result<PathBuf> {
        let root = self.resolve_watch_root().await;
        info!("watching {}", root.display());

        self.sweep(&root).await;
        self.subscribe(root.clone()).await?;
        Ok(root)
    }

    /// Persist a new watch root and restart the whole start sequence
    /// against it. Safe to call while reconciliations are in flight.
    pub async fn reload(&self, new_root: &Path) -> Result<PathBuf> {
        self.store.set_watch_root(new_root).await?;
        self.stop().await;
        self.start().await
    }

    /// Tear down the subscription and all pending debounce timers.
    pub async fn stop(&self) {
        if let Some(active) = self.active.lock().await.take() {
            debug!("stopping watch on {}", active.root.display());
            active.shutdown();
        }
        self.debounce.clear().await;
    }

    /// Operator-triggered rescan of a single folder under the current root.
    /// Yields to a watch-triggered reconciliation already in flight for the
    /// same folder; that run sees the latest file list anyway.
    pub async fn rescan_folder(&self, folder_name: &str) -> Result<ReconcileOutcome> {
        if self.debounce.is_running(folder_name).await {
            return Ok(ReconcileOutcome::Skipped);
        }
        let root = match &*self.active.lock().await {
            Some(active) => active.root.clone(),
            None => self.resolve_watch_root().await,
        };
        self.reconciler
            .reconcile_settled(folder_name, &root.join(folder_name))
            .await
    }

    /// Soft-delete sessions that aged out or lost their folder.
    pub async fn sweep_retention(&self) -> Result<usize> {
        let root = match &*self.active.lock().await {
            Some(active) => active.root.clone(),
            None => self.resolve_watch_root().await,
        };
        Ok(self.reconciler.sweep_expired(&root).await?.len())
    }

    /// Persisted override wins; fall back to the configured root, and if
    /// that cannot be created, to the known-writable default rather than
    /// crashing the process.
    async fn resolve_watch_root(&self) -> PathBuf {
        let configured = match self.store.get_watch_root().await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => self.config.watch_root.clone(),
            Err(err) => {
                warn!("cannot read persisted watch root: {err}");
                self.config.watch_root.clone()
            }
        };

        if let Err(err) = tokio::fs::create_dir_all(&configured).await {
            warn!(
                "cannot create watch root {}: {}; falling back to {}",
                configured.display(),
                err,
                self.config.default_watch_root.display()
            );
            let fallback = self.config.default_watch_root.clone();
            if let Err(err) = tokio::fs::create_dir_all(&fallback).await {
                warn!("cannot create fallback root {}: {}", fallback.display(), err);
            }
            return fallback;
        }
        configured
    }

    /// Full synchronous pass over existing subfolders, newest first so the
    /// most recently active sessions become queryable soonest. Sequential by
    /// design: one bad folder cannot corrupt shared state or starve others.
    async fn sweep(&self, root: &Path) {
        for folder in list_session_folders(root).await {
            let Some(name) = folder.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match self.reconciler.reconcile_settled(name, &folder).await {
                Ok(outcome) => debug!("sweep {name}: {outcome:?}"),
                Err(err) => warn!("sweep {name}: {err}"),
            }
        }
    }

    async fn subscribe(&self, root: PathBuf) -> Result<()> {
        let (tx, rx) = mpsc::channel::<WatchMessage>(1024);

        let watcher_root = root.clone();
        let watcher = spawn_blocking(move || init_watcher(&watcher_root, tx))
            .await
            .map_err(|err| GalleryError::Internal(format!("watcher init panicked: {err}")))??;

        let event_task = spawn_event_loop(root.clone(), rx, Arc::clone(&self.debounce));

        let mut guard = self.active.lock().await;
        if let Some(previous) = guard.replace(ActiveWatch {
            root,
            _watcher: watcher,
            event_task,
        }) {
            previous.shutdown();
        }
        Ok(())
    }

    /// Whether a live subscription is currently attached.
    pub async fn is_watching(&self) -> bool {
        self.active.lock().await.is_some()
    }
}

fn spawn_event_loop(
    root: PathBuf,
    mut rx: mpsc::Receiver<WatchMessage>,
    debounce: Arc<DebounceCoordinator>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                WatchMessage::Event(event) => {
                    for path in &event.paths {
                        if let Some((folder_name, folder_path)) = qualify_event(&root, path) {
                            debounce.note_event(&folder_name, folder_path).await;
                        }
                    }
                }
                WatchMessage::Error(error) => {
                    warn!("watch error on {}: {}", root.display(), error);
                }
            }
        }
    })
}

/// Map an event path to the session folder it belongs to.
///
/// Returns `None` for the root itself and for entries directly at the root
/// level: only subfolder contents count, so stray top-level files can never
/// become sessions.
fn qualify_event(root: &Path, path: &Path) -> Option<(String, PathBuf)> {
    let rel = path.strip_prefix(root).ok()?;
    let mut components = rel.components();
    let first = components.next()?;
    components.next()?;

    let folder_name = first.as_os_str().to_str()?;
    if folder_name.starts_with('.') || folder_name.starts_with('_') {
        return None;
    }
    Some((folder_name.to_string(), root.join(folder_name)))
}

fn init_watcher(root: &Path, tx: mpsc::Sender<WatchMessage>) -> Result<RecommendedWatcher> {
    let root_label = root.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                if let Err(err) = tx.blocking_send(WatchMessage::Event(event)) {
                    warn!(
                        "watch channel send failed for {}: {}",
                        root_label.display(),
                        err
                    );
                }
            }
            Err(err) => {
                let _ = tx.blocking_send(WatchMessage::Error(err.to_string()));
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|err| GalleryError::Watch(format!("failed to create watcher: {err}")))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|err| GalleryError::Watch(format!("failed to watch {}: {}", root.display(), err)))?;

    Ok(watcher)
}
