//! Domain types shared across snapbooth crates.

pub mod ids;
pub mod media_kind;
pub mod outcome;
pub mod photo;
pub mod session;

pub use ids::SessionId;
pub use media_kind::MediaKind;
pub use outcome::ReconcileOutcome;
pub use photo::Photo;
pub use session::{Session, SessionStatus};
