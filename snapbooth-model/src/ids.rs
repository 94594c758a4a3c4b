use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strongly typed session identifier.
///
/// Derived deterministically from the capture folder's name, so re-scanning
/// the same folder always resolves to the same session. There is no random
/// constructor on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Derive the session id for a capture folder name.
    pub fn from_folder_name(name: &str) -> Self {
        SessionId(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl AsRef<Uuid> for SessionId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_folder_name_same_id() {
        let a = SessionId::from_folder_name("Event1");
        let b = SessionId::from_folder_name("Event1");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_folder_names_distinct_ids() {
        let a = SessionId::from_folder_name("Event1");
        let b = SessionId::from_folder_name("Event2");
        assert_ne!(a, b);
    }
}
