use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Tunables for the ingestion pipeline.
///
/// The settle delay and minimum-file threshold are deliberately explicit
/// configuration: the delay-and-rescan consistency check is a heuristic race
/// mitigation, and deployments on slow NAS mounts need a larger window.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Fallback watch root when the store holds no persisted override.
    pub watch_root: PathBuf,
    /// Last-resort root used when the configured one cannot be created.
    pub default_watch_root: PathBuf,
    /// Where thumbnails, web copies and gallery pages are written.
    pub data_dir: PathBuf,
    /// Base URL encoded into each session's QR code.
    pub public_base_url: String,

    /// Folders with fewer media files than this are not yet a session.
    pub min_files_per_session: usize,
    /// Debounce window coalescing filesystem event bursts per folder.
    pub debounce_window: Duration,
    /// Settle delay before the consistency re-scan.
    pub settle_delay: Duration,
    /// Ceiling for a single media transform; slower files are dropped.
    pub transform_timeout: Duration,
    /// Concurrently in-flight per-file transforms within one reconciliation.
    pub transform_concurrency: usize,

    /// Bounding box for generated thumbnails (aspect preserved, letterboxed).
    pub thumb_max_width: u32,
    pub thumb_max_height: u32,

    /// Sessions untouched for this long are soft-deleted by the sweep.
    pub retention: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            watch_root: PathBuf::from("./photos"),
            default_watch_root: PathBuf::from("./photos"),
            data_dir: PathBuf::from("./data"),
            public_base_url: "http://localhost:3000".to_string(),
            min_files_per_session: 2,
            debounce_window: Duration::from_secs(5),
            settle_delay: Duration::from_millis(500),
            transform_timeout: Duration::from_secs(30),
            transform_concurrency: 4,
            thumb_max_width: 1280,
            thumb_max_height: 1280,
            retention: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        // Load .env file if present
        dotenv::dotenv().ok();

        let defaults = IngestConfig::default();

        Self {
            watch_root: env::var("WATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.watch_root),
            default_watch_root: env::var("DEFAULT_WATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.default_watch_root),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or(defaults.public_base_url),

            min_files_per_session: parse_env("MIN_FILES_PER_SESSION", defaults.min_files_per_session),
            debounce_window: Duration::from_millis(parse_env(
                "DEBOUNCE_WINDOW_MS",
                defaults.debounce_window.as_millis() as u64,
            )),
            settle_delay: Duration::from_millis(parse_env(
                "SETTLE_DELAY_MS",
                defaults.settle_delay.as_millis() as u64,
            )),
            transform_timeout: Duration::from_secs(parse_env(
                "TRANSFORM_TIMEOUT_SECS",
                defaults.transform_timeout.as_secs(),
            )),
            transform_concurrency: parse_env(
                "TRANSFORM_CONCURRENCY",
                defaults.transform_concurrency,
            )
            .max(1),

            thumb_max_width: parse_env("THUMB_MAX_WIDTH", defaults.thumb_max_width),
            thumb_max_height: parse_env("THUMB_MAX_HEIGHT", defaults.thumb_max_height),

            retention: Duration::from_secs(
                parse_env("RETENTION_DAYS", 30u64) * 24 * 60 * 60,
            ),
        }
    }

    /// Create the output directories this core writes into.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.thumbnails_dir())?;
        std::fs::create_dir_all(self.web_copies_dir())?;
        std::fs::create_dir_all(self.galleries_dir())?;
        Ok(())
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.data_dir.join("thumbnails")
    }

    pub fn web_copies_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    pub fn galleries_dir(&self) -> PathBuf {
        self.data_dir.join("galleries")
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let cfg = IngestConfig::default();
        assert_eq!(cfg.min_files_per_session, 2);
        assert_eq!(cfg.debounce_window, Duration::from_secs(5));
        assert_eq!(cfg.settle_delay, Duration::from_millis(500));
        assert_eq!(cfg.transform_timeout, Duration::from_secs(30));
    }
}
