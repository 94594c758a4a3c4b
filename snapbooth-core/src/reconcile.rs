//! Session reconciliation: the state-transition engine that turns a settled
//! capture folder into a persisted session with a densely numbered photo
//! set, generated thumbnails and a fresh gallery artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use rand::Rng;
use rand::distr::Alphanumeric;
use snapbooth_model::{MediaKind, Photo, ReconcileOutcome, Session, SessionId};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::IngestConfig;
use crate::error::{GalleryError, Result};
use crate::ports::{GalleryRenderer, MediaTransformer, QrEncoder, SessionStore};
use crate::scan::{confirm_stable, scan_session_folder};
use crate::transform::{poster_path, thumbnail_path};

/// File name of the QR artifact dropped into each session's source folder.
/// The underscore prefix keeps it out of subsequent scans.
pub const QR_ARTIFACT_NAME: &str = "_qrcode.png";

const ACCESS_TOKEN_LEN: usize = 32;

/// One successfully transformed candidate, before numbering.
#[derive(Debug)]
struct TransformedFile {
    source: PathBuf,
    thumbnail: PathBuf,
    web_copy: Option<PathBuf>,
    kind: MediaKind,
}

pub struct SessionReconciler {
    store: Arc<dyn SessionStore>,
    transformer: Arc<dyn MediaTransformer>,
    qr: Arc<dyn QrEncoder>,
    gallery: Arc<dyn GalleryRenderer>,
    config: IngestConfig,
}

impl std::fmt::Debug for SessionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionReconciler")
            .field("config", &self.config)
            .finish()
    }
}

impl SessionReconciler {
    pub fn new(
        store: Arc<dyn SessionStore>,
        transformer: Arc<dyn MediaTransformer>,
        qr: Arc<dyn QrEncoder>,
        gallery: Arc<dyn GalleryRenderer>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            transformer,
            qr,
            gallery,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Consistency-gated entry point used by the debounce coordinator and
    /// the startup sweep: scan, wait out the settle delay, re-scan, and
    /// only reconcile folders whose file count held still.
    pub async fn reconcile_settled(
        &self,
        folder_name: &str,
        folder_path: &Path,
    ) -> Result<ReconcileOutcome> {
        let scan = scan_session_folder(folder_path, self.config.min_files_per_session).await;
        if !scan.is_valid {
            return Ok(ReconcileOutcome::BelowThreshold {
                files_found: scan.files.len(),
            });
        }
        if !confirm_stable(
            folder_path,
            scan.files.len(),
            self.config.settle_delay,
            self.config.min_files_per_session,
        )
        .await
        {
            debug!("{folder_name}: folder still changing, deferring");
            return Ok(ReconcileOutcome::Unstable);
        }
        self.reconcile(folder_name, folder_path).await
    }

    /// Reconcile a validated folder into its session.
    ///
    /// Idempotent: repeating it on an unchanged folder produces an identical
    /// photo set. Per-file transform failures are dropped from the result
    /// set; only store failures abort the run.
    pub async fn reconcile(
        &self,
        folder_name: &str,
        folder_path: &Path,
    ) -> Result<ReconcileOutcome> {
        // Never trust the caller's snapshot; the folder may have changed
        // while the settle delay ran.
        let scan = scan_session_folder(folder_path, self.config.min_files_per_session).await;
        if !scan.is_valid {
            return Ok(ReconcileOutcome::BelowThreshold {
                files_found: scan.files.len(),
            });
        }
        let files_found = scan.files.len();

        let session_id = self.ensure_session(folder_name, folder_path).await?;

        let mut transformed: Vec<TransformedFile> = futures::stream::iter(scan.files)
            .map(|file| self.transform_one(folder_name, file))
            .buffer_unordered(self.config.transform_concurrency)
            .filter_map(|result| async move { result })
            .collect()
            .await;

        // Stable ordering: photo numbers follow the sorted original names.
        transformed.sort_by(|a, b| a.source.cmp(&b.source));

        let now = Utc::now();
        let photos: Vec<Photo> = transformed
            .into_iter()
            .enumerate()
            .map(|(idx, file)| Photo {
                session_id,
                photo_number: idx as i32 + 1,
                source_path: file.source,
                thumbnail_path: file.thumbnail,
                web_copy_path: file.web_copy,
                kind: file.kind,
                processed_at: now,
            })
            .collect();
        let photos_persisted = photos.len();

        self.store.replace_photos(session_id, photos, now).await?;

        self.render_gallery(session_id).await;

        info!(
            "{folder_name}: reconciled {photos_persisted}/{files_found} files into session {session_id}"
        );
        Ok(ReconcileOutcome::Persisted {
            session_id,
            files_found,
            photos_persisted,
        })
    }

    /// Soft-delete sessions whose folder has vanished or that aged past the
    /// retention window. Returns the affected ids.
    pub async fn sweep_expired(&self, watch_root: &Path) -> Result<Vec<SessionId>> {
        let now = Utc::now();
        let retention = chrono::Duration::from_std(self.config.retention)
            .map_err(|err| GalleryError::Internal(err.to_string()))?;

        let mut swept = Vec::new();
        for session in self.store.list_sessions().await? {
            if session.is_deleted() {
                continue;
            }
            let folder = watch_root.join(&session.folder_name);
            let orphaned = !folder.is_dir();
            let expired = now - session.updated_at > retention;
            if orphaned || expired {
                info!(
                    "sweeping session {} ({})",
                    session.id,
                    if orphaned { "orphaned" } else { "expired" }
                );
                self.store.mark_deleted(session.id, now).await?;
                swept.push(session.id);
            }
        }
        Ok(swept)
    }

    /// Insert the session on first sight (fresh token, QR drop) or leave the
    /// existing row for the photo-swap transaction to reactivate.
    async fn ensure_session(&self, folder_name: &str, folder_path: &Path) -> Result<SessionId> {
        let session_id = SessionId::from_folder_name(folder_name);
        if let Some(existing) = self.store.get_session(session_id).await? {
            if existing.is_deleted() {
                debug!("{folder_name}: resurrecting soft-deleted session {session_id}");
            }
            return Ok(session_id);
        }

        let session = Session::new(folder_name, generate_access_token(), Utc::now());
        self.store.insert_session(&session).await?;
        info!("{folder_name}: created session {session_id}");

        self.drop_qr_artifact(&session, folder_path).await;
        Ok(session_id)
    }

    /// One-time QR drop at creation; the only write this core ever makes
    /// into the watched tree. Failure is logged, never fatal.
    async fn drop_qr_artifact(&self, session: &Session, folder_path: &Path) {
        let url = match self.gallery_url(session) {
            Ok(url) => url,
            Err(err) => {
                warn!("{}: cannot build gallery url: {}", session.folder_name, err);
                return;
            }
        };
        let bytes = match self.qr.encode(url.as_str()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("{}: QR encoding failed: {}", session.folder_name, err);
                return;
            }
        };
        let target = folder_path.join(QR_ARTIFACT_NAME);
        if let Err(err) = tokio::fs::write(&target, bytes).await {
            warn!("{}: cannot write {}: {}", session.folder_name, target.display(), err);
        }
    }

    fn gallery_url(&self, session: &Session) -> Result<Url> {
        let mut url = Url::parse(&self.config.public_base_url)
            .map_err(|err| GalleryError::Internal(format!("bad public_base_url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| GalleryError::Internal("public_base_url cannot be a base".into()))?
            .push("gallery")
            .push(&session.id.to_string());
        url.query_pairs_mut()
            .append_pair("token", &session.access_token);
        Ok(url)
    }

    /// Transform a single candidate under the per-file ceiling. Any failure
    /// (corrupt file, unsupported codec, timeout) drops the file from this
    /// run's result set without touching the rest of the batch.
    async fn transform_one(&self, folder_name: &str, source: PathBuf) -> Option<TransformedFile> {
        let file_name = source.file_name()?.to_str()?.to_string();
        let kind = MediaKind::classify(&file_name);

        let work = self.transform_by_kind(folder_name, &source, &file_name, kind);
        match timeout(self.config.transform_timeout, work).await {
            Ok(Ok(file)) => Some(file),
            Ok(Err(err)) => {
                warn!("{folder_name}/{file_name}: transform failed, dropping: {err}");
                None
            }
            Err(_) => {
                warn!(
                    "{folder_name}/{file_name}: transform exceeded {:?}, dropping",
                    self.config.transform_timeout
                );
                None
            }
        }
    }

    async fn transform_by_kind(
        &self,
        folder_name: &str,
        source: &Path,
        file_name: &str,
        kind: MediaKind,
    ) -> Result<TransformedFile> {
        let thumbs_dir = self.config.thumbnails_dir();
        match kind {
            MediaKind::Image => {
                let thumb = thumbnail_path(&thumbs_dir, folder_name, source);
                self.transformer
                    .transform_image(
                        source,
                        &thumb,
                        self.config.thumb_max_width,
                        self.config.thumb_max_height,
                    )
                    .await?;
                Ok(TransformedFile {
                    source: source.to_path_buf(),
                    thumbnail: thumb,
                    web_copy: None,
                    kind,
                })
            }
            MediaKind::Animated => {
                // Verbatim copy keeps the animation; the poster is the
                // static stand-in for grid views.
                let copy = self.web_copy_target(folder_name, file_name);
                self.transformer.copy_verbatim(source, &copy).await?;
                let poster = poster_path(&thumbs_dir, folder_name, source);
                self.transformer.animated_poster(source, &poster).await?;
                Ok(TransformedFile {
                    source: source.to_path_buf(),
                    thumbnail: poster,
                    web_copy: Some(copy),
                    kind,
                })
            }
            MediaKind::Video => {
                let copy = self.web_copy_target(folder_name, file_name);
                self.transformer.copy_verbatim(source, &copy).await?;
                let poster = poster_path(&thumbs_dir, folder_name, source);
                self.transformer
                    .synthesize_placeholder(&poster, file_name)
                    .await?;
                Ok(TransformedFile {
                    source: source.to_path_buf(),
                    thumbnail: poster,
                    web_copy: Some(copy),
                    kind,
                })
            }
            MediaKind::Unsupported => Err(GalleryError::InvalidMedia(file_name.to_string())),
        }
    }

    fn web_copy_target(&self, folder_name: &str, file_name: &str) -> PathBuf {
        self.config.web_copies_dir().join(folder_name).join(file_name)
    }

    /// Regenerate the static gallery page from the freshly persisted set.
    /// Render failures are logged; the persisted state is already correct
    /// and the next reconciliation rewrites the page anyway.
    async fn render_gallery(&self, session_id: SessionId) {
        let session = match self.store.get_session(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(err) => {
                warn!("gallery render skipped, session load failed: {err}");
                return;
            }
        };
        let photos = match self.store.photos_for_session(session_id).await {
            Ok(photos) => photos,
            Err(err) => {
                warn!("gallery render skipped, photo load failed: {err}");
                return;
            }
        };
        if let Err(err) = self.gallery.render(&session, &photos).await {
            warn!("gallery render failed for {session_id}: {err}");
        }
    }
}

#[async_trait::async_trait]
impl crate::debounce::FolderProcessor for SessionReconciler {
    async fn process(&self, folder_name: &str, folder_path: &Path) -> Result<ReconcileOutcome> {
        self.reconcile_settled(folder_name, folder_path).await
    }
}

fn generate_access_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ACCESS_TOKEN_LEN)
        .map(char::from)
        .collect()
}
