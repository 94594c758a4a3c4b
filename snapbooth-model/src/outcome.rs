use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Result of one reconciliation attempt for a capture folder.
///
/// Manual-rescan callers use the `files_found` / `photos_persisted` pair to
/// distinguish partial success (some files dropped by the transform stage)
/// from total failure, which surfaces as an `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Photo set replaced; the session now mirrors the folder.
    Persisted {
        session_id: SessionId,
        files_found: usize,
        photos_persisted: usize,
    },
    /// Folder has fewer media files than the minimum threshold; not a
    /// session yet. Not an error.
    BelowThreshold { files_found: usize },
    /// File count changed between scan and settle re-check; attempt
    /// abandoned, the next event retries naturally.
    Unstable,
    /// Another reconciliation for the same folder was already in flight.
    Skipped,
}

impl ReconcileOutcome {
    pub fn persisted_count(&self) -> usize {
        match self {
            ReconcileOutcome::Persisted {
                photos_persisted, ..
            } => *photos_persisted,
            _ => 0,
        }
    }
}
