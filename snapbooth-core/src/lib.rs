//! Folder-to-session ingestion pipeline for the snapbooth gallery.
//!
//! Watches a capture root for session subfolders, derives a stable session
//! identity from each folder name, generates web-viewable thumbnails, and
//! keeps a densely numbered photo set per session in the store. Tolerates
//! partial writes (settle-delay consistency gate), duplicate events
//! (per-folder debouncing) and concurrent rescans (per-folder in-flight
//! guard).
//!
//! The HTTP layer, authentication and real QR encoding are external
//! collaborators behind the traits in [`ports`].

pub mod config;
pub mod debounce;
pub mod error;
pub mod gallery;
pub mod ports;
pub mod reconcile;
pub mod scan;
pub mod store;
pub mod transform;
pub mod watch;

pub use config::IngestConfig;
pub use error::{GalleryError, Result};
pub use reconcile::SessionReconciler;
pub use watch::WatchSupervisor;

pub use snapbooth_model as model;
