use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::media_kind::MediaKind;

/// One media item belonging to a session.
///
/// `photo_number` is 1-based, dense and contiguous within the session at the
/// time of the last successful reconciliation. The whole photo set for a
/// session is replaced atomically; rows are never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub session_id: SessionId,
    pub photo_number: i32,
    /// Original file on the watched filesystem.
    pub source_path: PathBuf,
    /// Generated web-viewable thumbnail.
    pub thumbnail_path: PathBuf,
    /// Verbatim web copy for animated images and videos; `None` for plain
    /// images, which are served from the thumbnail alone.
    pub web_copy_path: Option<PathBuf>,
    pub kind: MediaKind,
    pub processed_at: DateTime<Utc>,
}
