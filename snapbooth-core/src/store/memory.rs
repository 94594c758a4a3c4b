//! In-memory `SessionStore` used by tests and single-process embedders that
//! do not want a database. Mirrors the Postgres implementation's semantics,
//! including the `(session_id, photo_number)` uniqueness check and the
//! all-or-nothing photo swap.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snapbooth_model::{Photo, Session, SessionId, SessionStatus};
use tokio::sync::Mutex;

use crate::error::{GalleryError, Result};
use crate::ports::SessionStore;

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    photos: HashMap<SessionId, Vec<Photo>>,
    watch_root: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: Mutex<Inner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self.inner.lock().await.sessions.get(&id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.inner.lock().await.sessions.values().cloned().collect())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.contains_key(&session.id) {
            return Err(GalleryError::Internal(format!(
                "duplicate session insert for {}",
                session.id
            )));
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn replace_photos(
        &self,
        id: SessionId,
        photos: Vec<Photo>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.sessions.get_mut(&id) else {
            return Err(GalleryError::NotFound(id.to_string()));
        };

        let mut seen = HashSet::new();
        for photo in &photos {
            if !seen.insert(photo.photo_number) {
                return Err(GalleryError::Internal(format!(
                    "duplicate photo_number {} for session {}",
                    photo.photo_number, id
                )));
            }
        }

        session.status = SessionStatus::Active;
        session.updated_at = updated_at;
        inner.photos.insert(id, photos);
        Ok(())
    }

    async fn photos_for_session(&self, id: SessionId) -> Result<Vec<Photo>> {
        Ok(self
            .inner
            .lock()
            .await
            .photos
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_deleted(&self, id: SessionId, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.sessions.get_mut(&id) else {
            return Err(GalleryError::NotFound(id.to_string()));
        };
        session.status = SessionStatus::Deleted;
        session.updated_at = at;
        Ok(())
    }

    async fn get_watch_root(&self) -> Result<Option<PathBuf>> {
        Ok(self.inner.lock().await.watch_root.clone())
    }

    async fn set_watch_root(&self, path: &Path) -> Result<()> {
        self.inner.lock().await.watch_root = Some(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use snapbooth_model::MediaKind;

    fn photo(id: SessionId, n: i32) -> Photo {
        Photo {
            session_id: id,
            photo_number: n,
            source_path: PathBuf::from(format!("/photos/Event1/{n}.jpg")),
            thumbnail_path: PathBuf::from(format!("/data/thumbnails/Event1/{n}_thumb.jpg")),
            web_copy_path: None,
            kind: MediaKind::Image,
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn replace_photos_reactivates_session() {
        let store = InMemorySessionStore::new();
        let session = Session::new("Event1", "tok".into(), Utc::now());
        store.insert_session(&session).await.unwrap();
        store.mark_deleted(session.id, Utc::now()).await.unwrap();

        store
            .replace_photos(session.id, vec![photo(session.id, 1)], Utc::now())
            .await
            .unwrap();

        let reloaded = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn duplicate_photo_numbers_are_rejected() {
        let store = InMemorySessionStore::new();
        let session = Session::new("Event1", "tok".into(), Utc::now());
        store.insert_session(&session).await.unwrap();

        let result = store
            .replace_photos(
                session.id,
                vec![photo(session.id, 1), photo(session.id, 1)],
                Utc::now(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn double_insert_is_rejected() {
        let store = InMemorySessionStore::new();
        let session = Session::new("Event1", "tok".into(), Utc::now());
        store.insert_session(&session).await.unwrap();
        assert!(store.insert_session(&session).await.is_err());
    }
}
