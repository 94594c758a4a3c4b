use std::fmt::Display;
use std::fmt::Formatter;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Image extensions promoted to gallery thumbnails.
pub const IMAGE_FILE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Animated-image extensions; the original is preserved verbatim so the
/// animation survives, alongside a static poster frame.
pub const ANIMATED_FILE_EXTENSIONS: &[&str] = &["gif"];

/// Video extensions; copied verbatim with a synthesized poster frame.
pub const VIDEO_FILE_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm"];

/// Kind of a captured media file, derived from its extension.
///
/// Every transform-strategy decision matches on this exhaustively rather
/// than re-branching on extension strings at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image = 0,
    Animated = 1,
    Video = 2,
    Unsupported = 3,
}

impl MediaKind {
    /// Classify a bare file name. Pure and total: unknown extensions,
    /// dotfiles and `_`-prefixed artifact files all map to `Unsupported`.
    pub fn classify(file_name: &str) -> Self {
        if file_name.starts_with('.') || file_name.starts_with('_') {
            return MediaKind::Unsupported;
        }
        let Some(ext) = Path::new(file_name).extension().and_then(|e| e.to_str()) else {
            return MediaKind::Unsupported;
        };
        let ext = ext.to_ascii_lowercase();
        if IMAGE_FILE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if ANIMATED_FILE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Animated
        } else if VIDEO_FILE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Unsupported
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, MediaKind::Unsupported)
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Animated => write!(f, "animated"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

impl From<i16> for MediaKind {
    fn from(value: i16) -> Self {
        match value {
            0 => MediaKind::Image,
            1 => MediaKind::Animated,
            2 => MediaKind::Video,
            _ => MediaKind::Unsupported,
        }
    }
}

impl From<MediaKind> for i16 {
    fn from(value: MediaKind) -> Self {
        value as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_extensions() {
        assert_eq!(MediaKind::classify("a.jpg"), MediaKind::Image);
        assert_eq!(MediaKind::classify("a.JPEG"), MediaKind::Image);
        assert_eq!(MediaKind::classify("a.png"), MediaKind::Image);
        assert_eq!(MediaKind::classify("a.webp"), MediaKind::Image);
        assert_eq!(MediaKind::classify("a.gif"), MediaKind::Animated);
        assert_eq!(MediaKind::classify("a.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::classify("a.MOV"), MediaKind::Video);
        assert_eq!(MediaKind::classify("a.webm"), MediaKind::Video);
    }

    #[test]
    fn rejects_markers_and_unknowns() {
        assert_eq!(MediaKind::classify(".DS_Store"), MediaKind::Unsupported);
        assert_eq!(MediaKind::classify("_qrcode.png"), MediaKind::Unsupported);
        assert_eq!(MediaKind::classify("notes.txt"), MediaKind::Unsupported);
        assert_eq!(MediaKind::classify("noext"), MediaKind::Unsupported);
    }

    #[test]
    fn integer_round_trip() {
        for kind in [
            MediaKind::Image,
            MediaKind::Animated,
            MediaKind::Video,
            MediaKind::Unsupported,
        ] {
            assert_eq!(MediaKind::from(i16::from(kind)), kind);
        }
    }
}
