//! Boundary contracts consumed by the ingestion pipeline.
//!
//! The store, media transforms, QR encoding and gallery rendering are
//! external collaborators; the pipeline only ever talks to these traits so
//! tests can substitute doubles and embedders can swap implementations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use snapbooth_model::{Photo, Session, SessionId};

use crate::error::Result;

/// Transactional persistence for sessions and their photo sets.
///
/// `replace_photos` is the single point where row-level consistency is
/// enforced: it swaps the full photo set and re-activates the session in one
/// atomic step (all-or-nothing).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>>;

    async fn list_sessions(&self) -> Result<Vec<Session>>;

    async fn insert_session(&self, session: &Session) -> Result<()>;

    /// Atomically delete the session's photo rows, insert `photos` in their
    /// place, and set the session `Active` with the given timestamp. On
    /// failure the previous photo set is left intact.
    async fn replace_photos(
        &self,
        id: SessionId,
        photos: Vec<Photo>,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn photos_for_session(&self, id: SessionId) -> Result<Vec<Photo>>;

    /// Soft delete: the row stays so the folder can later resurrect it.
    async fn mark_deleted(&self, id: SessionId, at: DateTime<Utc>) -> Result<()>;

    /// Operator-persisted watch-root override; wins over the env fallback.
    async fn get_watch_root(&self) -> Result<Option<PathBuf>>;

    async fn set_watch_root(&self, path: &Path) -> Result<()>;
}

/// Media transform capability. Implementations are expected to be safe to
/// call concurrently; the reconciler bounds in-flight calls and wraps each
/// one in a timeout.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaTransformer: Send + Sync {
    /// Resize-and-reencode onto a bounded canvas, preserving aspect ratio
    /// with letterboxing. Never crops: discarding captured content silently
    /// is treated as a correctness bug.
    async fn transform_image(
        &self,
        src: &Path,
        dst: &Path,
        max_width: u32,
        max_height: u32,
    ) -> Result<()>;

    /// Static poster frame for an animated image.
    async fn animated_poster(&self, src: &Path, dst: &Path) -> Result<()>;

    async fn copy_verbatim(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Placeholder poster for media we do not decode (videos).
    async fn synthesize_placeholder(&self, dst: &Path, label: &str) -> Result<()>;
}

/// Encodes a gallery URL into QR image bytes (PNG).
#[cfg_attr(test, automock)]
pub trait QrEncoder: Send + Sync {
    fn encode(&self, url: &str) -> Result<Vec<u8>>;
}

/// Renders the static gallery page artifact for a session. Must be
/// idempotently overwritable; it is re-run after every reconciliation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GalleryRenderer: Send + Sync {
    async fn render(&self, session: &Session, photos: &[Photo]) -> Result<PathBuf>;
}
