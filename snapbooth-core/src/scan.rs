//! Capture-folder scanning and the settle-delay consistency gate.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use snapbooth_model::MediaKind;
use tracing::{debug, warn};

/// OS and NAS artifacts that may appear inside capture folders.
const IGNORED_ENTRY_NAMES: &[&str] = &[
    "Thumbs.db",
    "desktop.ini",
    "System Volume Information",
    "$RECYCLE.BIN",
    "@eaDir",
];

/// Result of scanning one candidate session folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderScan {
    /// Supported media files, sorted by file name.
    pub files: Vec<PathBuf>,
    /// Whether the folder meets the minimum-file threshold.
    pub is_valid: bool,
}

impl FolderScan {
    fn empty() -> Self {
        FolderScan {
            files: Vec::new(),
            is_valid: false,
        }
    }
}

fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_') || IGNORED_ENTRY_NAMES.contains(&name)
}

/// Enumerate the supported media files directly inside `folder` (one level,
/// no recursion into sub-subfolders).
///
/// I/O errors degrade to an empty invalid scan: one unreadable folder must
/// never abort a sweep over many.
pub async fn scan_session_folder(folder: &Path, min_files: usize) -> FolderScan {
    let mut dir = match tokio::fs::read_dir(folder).await {
        Ok(dir) => dir,
        Err(err) => {
            warn!("cannot read {}: {}", folder.display(), err);
            return FolderScan::empty();
        }
    };

    let mut files = Vec::new();
    loop {
        let entry = match dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                warn!("error walking {}: {}", folder.display(), err);
                return FolderScan::empty();
            }
        };

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_ignored_name(name) {
            continue;
        }
        if !MediaKind::classify(name).is_supported() {
            continue;
        }
        match entry.file_type().await {
            Ok(file_type) if file_type.is_file() => files.push(entry.path()),
            Ok(_) => {}
            Err(err) => {
                debug!("skipping {}: {}", entry.path().display(), err);
            }
        }
    }

    files.sort();
    let is_valid = files.len() >= min_files;
    FolderScan { files, is_valid }
}

/// Two-phase stability check: wait out the settle delay, rescan, and accept
/// only if the file count is unchanged and still above threshold.
///
/// This is a heuristic race mitigation, not a proof: capture software and
/// sync clients write files progressively, and filesystem locking is not
/// reliable across network mounts. The delay is tunable via configuration.
pub async fn confirm_stable(
    folder: &Path,
    expected_count: usize,
    settle_delay: Duration,
    min_files: usize,
) -> bool {
    tokio::time::sleep(settle_delay).await;
    let rescan = scan_session_folder(folder, min_files).await;
    if !rescan.is_valid {
        debug!(
            "{} fell below threshold during settle ({} files)",
            folder.display(),
            rescan.files.len()
        );
        return false;
    }
    if rescan.files.len() != expected_count {
        debug!(
            "{} still changing: {} files at scan, {} after settle",
            folder.display(),
            expected_count,
            rescan.files.len()
        );
        return false;
    }
    true
}

/// Direct subfolders of the watch root that are candidate sessions, ordered
/// newest-first by creation time so recently active sessions become
/// queryable soonest.
pub async fn list_session_folders(root: &Path) -> Vec<PathBuf> {
    let mut dir = match tokio::fs::read_dir(root).await {
        Ok(dir) => dir,
        Err(err) => {
            warn!("cannot read watch root {}: {}", root.display(), err);
            return Vec::new();
        }
    };

    let mut folders: Vec<(SystemTime, PathBuf)> = Vec::new();
    while let Ok(Some(entry)) = dir.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_ignored_name(name) {
            continue;
        }
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        let birth = match entry.metadata().await {
            Ok(meta) => meta.created().or_else(|_| meta.modified()).unwrap_or(SystemTime::UNIX_EPOCH),
            Err(_) => SystemTime::UNIX_EPOCH,
        };
        folders.push((birth, entry.path()));
    }

    folders.sort_by(|a, b| b.0.cmp(&a.0));
    folders.into_iter().map(|(_, path)| path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    async fn touch(path: &Path) {
        tokio::fs::write(path, b"x").await.unwrap();
    }

    #[tokio::test]
    async fn scan_filters_and_sorts() {
        let tmp = tempdir().unwrap();
        touch(&tmp.path().join("b.jpg")).await;
        touch(&tmp.path().join("a.jpg")).await;
        touch(&tmp.path().join(".hidden.jpg")).await;
        touch(&tmp.path().join("_qrcode.png")).await;
        touch(&tmp.path().join("Thumbs.db")).await;
        touch(&tmp.path().join("notes.txt")).await;
        tokio::fs::create_dir(tmp.path().join("nested.jpg")).await.unwrap();

        let scan = scan_session_folder(tmp.path(), 2).await;
        assert!(scan.is_valid);
        let names: Vec<_> = scan
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[tokio::test]
    async fn below_threshold_is_invalid() {
        let tmp = tempdir().unwrap();
        touch(&tmp.path().join("only.jpg")).await;

        let scan = scan_session_folder(tmp.path(), 2).await;
        assert!(!scan.is_valid);
        assert_eq!(scan.files.len(), 1);
    }

    #[tokio::test]
    async fn missing_folder_degrades_to_empty() {
        let scan = scan_session_folder(Path::new("/definitely/not/here"), 2).await;
        assert_eq!(scan, FolderScan::empty());
    }

    #[tokio::test]
    async fn confirm_stable_accepts_unchanged_folder() {
        let tmp = tempdir().unwrap();
        touch(&tmp.path().join("a.jpg")).await;
        touch(&tmp.path().join("b.jpg")).await;

        assert!(confirm_stable(tmp.path(), 2, Duration::from_millis(10), 2).await);
    }

    #[tokio::test]
    async fn confirm_stable_rejects_count_change() {
        let tmp = tempdir().unwrap();
        touch(&tmp.path().join("a.jpg")).await;
        touch(&tmp.path().join("b.jpg")).await;
        touch(&tmp.path().join("c.jpg")).await;

        // Caller saw 4 files; the folder settled at 3.
        assert!(!confirm_stable(tmp.path(), 4, Duration::from_millis(10), 2).await);
    }

    #[tokio::test]
    async fn list_session_folders_skips_hidden_and_files() {
        let tmp = tempdir().unwrap();
        tokio::fs::create_dir(tmp.path().join("Event1")).await.unwrap();
        tokio::fs::create_dir(tmp.path().join(".sync")).await.unwrap();
        tokio::fs::create_dir(tmp.path().join("_staging")).await.unwrap();
        touch(&tmp.path().join("loose.jpg")).await;

        let folders = list_session_folders(tmp.path()).await;
        assert_eq!(folders.len(), 1);
        assert!(folders[0].ends_with("Event1"));
    }
}
