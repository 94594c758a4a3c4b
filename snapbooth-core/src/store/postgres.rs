//! Postgres-backed `SessionStore`.
//!
//! The schema lives under `migrations/`; the `(session_id, photo_number)`
//! primary key enforces the dense-numbering uniqueness invariant at the
//! storage layer, and photos cascade-delete with their session.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snapbooth_model::{MediaKind, Photo, Session, SessionId, SessionStatus};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::ports::SessionStore;

const WATCH_ROOT_KEY: &str = "watch_root";

#[derive(Clone, Debug)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| crate::error::GalleryError::Internal(err.to_string()))?;
        Ok(())
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn session_from_row(row: &PgRow) -> Session {
    Session {
        id: SessionId(row.get::<Uuid, _>("id")),
        folder_name: row.get("folder_name"),
        status: SessionStatus::from(row.get::<i16, _>("status")),
        public: row.get("public"),
        access_token: row.get("access_token"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn photo_from_row(row: &PgRow) -> Photo {
    Photo {
        session_id: SessionId(row.get::<Uuid, _>("session_id")),
        photo_number: row.get("photo_number"),
        source_path: PathBuf::from(row.get::<String, _>("source_path")),
        thumbnail_path: PathBuf::from(row.get::<String, _>("thumbnail_path")),
        web_copy_path: row
            .get::<Option<String>, _>("web_copy_path")
            .map(PathBuf::from),
        kind: MediaKind::from(row.get::<i16, _>("kind")),
        processed_at: row.get("processed_at"),
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT id, folder_name, status, public, access_token, created_at, updated_at \
             FROM sessions WHERE id = $1",
        )
        .bind(id.to_uuid())
        .fetch_optional(self.pool())
        .await?;
        Ok(row.as_ref().map(session_from_row))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT id, folder_name, status, public, access_token, created_at, updated_at \
             FROM sessions ORDER BY updated_at DESC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(session_from_row).collect())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (id, folder_name, status, public, access_token, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(session.id.to_uuid())
        .bind(&session.folder_name)
        .bind(i16::from(session.status))
        .bind(session.public)
        .bind(&session.access_token)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn replace_photos(
        &self,
        id: SessionId,
        photos: Vec<Photo>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM photos WHERE session_id = $1")
            .bind(id.to_uuid())
            .execute(&mut *tx)
            .await?;

        for photo in &photos {
            sqlx::query(
                "INSERT INTO photos \
                 (session_id, photo_number, source_path, thumbnail_path, web_copy_path, kind, processed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(id.to_uuid())
            .bind(photo.photo_number)
            .bind(photo.source_path.to_string_lossy().into_owned())
            .bind(photo.thumbnail_path.to_string_lossy().into_owned())
            .bind(
                photo
                    .web_copy_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )
            .bind(i16::from(photo.kind))
            .bind(photo.processed_at)
            .execute(&mut *tx)
            .await?;
        }

        // Status flip and timestamp ride the same transaction as the swap,
        // so a failed attempt can never leave an active session pointing at
        // a stale photo set.
        let updated = sqlx::query("UPDATE sessions SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.to_uuid())
            .bind(i16::from(SessionStatus::Active))
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(crate::error::GalleryError::NotFound(id.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn photos_for_session(&self, id: SessionId) -> Result<Vec<Photo>> {
        let rows = sqlx::query(
            "SELECT session_id, photo_number, source_path, thumbnail_path, web_copy_path, kind, processed_at \
             FROM photos WHERE session_id = $1 ORDER BY photo_number",
        )
        .bind(id.to_uuid())
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(photo_from_row).collect())
    }

    async fn mark_deleted(&self, id: SessionId, at: DateTime<Utc>) -> Result<()> {
        let updated = sqlx::query("UPDATE sessions SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.to_uuid())
            .bind(i16::from(SessionStatus::Deleted))
            .bind(at)
            .execute(self.pool())
            .await?;
        if updated.rows_affected() == 0 {
            return Err(crate::error::GalleryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_watch_root(&self) -> Result<Option<PathBuf>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = $1")
            .bind(WATCH_ROOT_KEY)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|row| PathBuf::from(row.get::<String, _>("value"))))
    }

    async fn set_watch_root(&self, path: &Path) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(WATCH_ROOT_KEY)
        .bind(path.to_string_lossy().into_owned())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
