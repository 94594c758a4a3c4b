//! Built-in static gallery page renderer.
//!
//! Writes one self-contained HTML artifact per session. Regeneration after
//! every reconciliation keeps the page in lockstep with the persisted photo
//! set; the write is a plain overwrite, so re-rendering is idempotent.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use snapbooth_model::{MediaKind, Photo, Session};

use crate::error::Result;
use crate::ports::GalleryRenderer;

#[derive(Debug, Clone)]
pub struct HtmlGalleryRenderer {
    galleries_dir: PathBuf,
    data_dir: PathBuf,
}

impl HtmlGalleryRenderer {
    pub fn new(galleries_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            galleries_dir,
            data_dir,
        }
    }

    fn href(&self, path: &Path) -> String {
        // Serve paths relative to the data dir where possible so the
        // artifact survives a data-dir move.
        path.strip_prefix(&self.data_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[async_trait]
impl GalleryRenderer for HtmlGalleryRenderer {
    async fn render(&self, session: &Session, photos: &[Photo]) -> Result<PathBuf> {
        let mut body = String::new();
        writeln!(body, "<!DOCTYPE html>").ok();
        writeln!(
            body,
            "<html><head><meta charset=\"utf-8\"><title>{}</title></head><body>",
            escape(&session.folder_name)
        )
        .ok();
        writeln!(body, "<h1>{}</h1>", escape(&session.folder_name)).ok();
        writeln!(body, "<main class=\"gallery\">").ok();
        for photo in photos {
            let thumb = self.href(&photo.thumbnail_path);
            let full = photo
                .web_copy_path
                .as_deref()
                .map(|p| self.href(p))
                .unwrap_or_else(|| thumb.clone());
            match photo.kind {
                MediaKind::Video => {
                    writeln!(
                        body,
                        "<figure id=\"photo-{n}\"><video controls poster=\"{thumb}\" src=\"{full}\"></video></figure>",
                        n = photo.photo_number,
                    )
                    .ok();
                }
                _ => {
                    writeln!(
                        body,
                        "<figure id=\"photo-{n}\"><a href=\"{full}\"><img src=\"{thumb}\" loading=\"lazy\"></a></figure>",
                        n = photo.photo_number,
                    )
                    .ok();
                }
            }
        }
        writeln!(body, "</main></body></html>").ok();

        tokio::fs::create_dir_all(&self.galleries_dir).await?;
        let out = self.galleries_dir.join(format!("{}.html", session.id));
        tokio::fs::write(&out, body).await?;
        Ok(out)
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use snapbooth_model::SessionId;
    use tempfile::tempdir;

    fn photo(session_id: SessionId, n: i32, name: &str, kind: MediaKind) -> Photo {
        Photo {
            session_id,
            photo_number: n,
            source_path: PathBuf::from(format!("/photos/Event1/{name}")),
            thumbnail_path: PathBuf::from(format!("/data/thumbnails/Event1/{name}.thumb.jpg")),
            web_copy_path: None,
            kind,
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn renders_one_figure_per_photo() {
        let tmp = tempdir().unwrap();
        let renderer = HtmlGalleryRenderer::new(
            tmp.path().join("galleries"),
            PathBuf::from("/data"),
        );
        let session = Session::new("Event1", "tok".into(), Utc::now());
        let photos = vec![
            photo(session.id, 1, "a.jpg", MediaKind::Image),
            photo(session.id, 2, "b.jpg", MediaKind::Image),
        ];

        let out = renderer.render(&session, &photos).await.unwrap();
        let html = tokio::fs::read_to_string(&out).await.unwrap();
        assert!(html.contains("photo-1"));
        assert!(html.contains("photo-2"));
        assert!(html.contains("thumbnails/Event1/a.jpg.thumb.jpg"));
    }

    #[tokio::test]
    async fn rerender_overwrites_previous_artifact() {
        let tmp = tempdir().unwrap();
        let renderer = HtmlGalleryRenderer::new(
            tmp.path().join("galleries"),
            PathBuf::from("/data"),
        );
        let session = Session::new("Event1", "tok".into(), Utc::now());

        renderer
            .render(&session, &[photo(session.id, 1, "a.jpg", MediaKind::Image)])
            .await
            .unwrap();
        let out = renderer.render(&session, &[]).await.unwrap();

        let html = tokio::fs::read_to_string(&out).await.unwrap();
        assert!(!html.contains("photo-1"));
    }
}
