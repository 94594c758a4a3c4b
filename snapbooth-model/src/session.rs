use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active = 0,
    Completed = 1,
    Deleted = 2,
}

impl From<i16> for SessionStatus {
    fn from(value: i16) -> Self {
        match value {
            0 => SessionStatus::Active,
            1 => SessionStatus::Completed,
            _ => SessionStatus::Deleted,
        }
    }
}

impl From<SessionStatus> for i16 {
    fn from(value: SessionStatus) -> Self {
        value as i16
    }
}

/// The durable record corresponding 1:1 with a watched capture subfolder.
///
/// Identity comes from the folder name; a soft-deleted session whose folder
/// is recreated is resurrected under the same id rather than re-inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub folder_name: String,
    pub status: SessionStatus,
    /// Whether the gallery page is publicly listed.
    pub public: bool,
    /// Opaque token embedded in the gallery URL and QR code. Generated once
    /// at creation, stable across rescans and resurrections.
    pub access_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(folder_name: impl Into<String>, access_token: String, now: DateTime<Utc>) -> Self {
        let folder_name = folder_name.into();
        Session {
            id: SessionId::from_folder_name(&folder_name),
            folder_name,
            status: SessionStatus::Active,
            public: false,
            access_token,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.status, SessionStatus::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_derives_id_from_folder() {
        let now = Utc::now();
        let session = Session::new("Event1", "token".to_string(), now);
        assert_eq!(session.id, SessionId::from_folder_name("Event1"));
        assert_eq!(session.status, SessionStatus::Active);
        assert!(!session.public);
    }
}
