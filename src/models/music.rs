//! Music track model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format::{format_duration, format_file_size};

/// A music record, either a local upload or an imported catalog track
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Music {
    /// Database ID
    pub id: i64,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year: Option<i64>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub track_number: Option<i64>,

    // Local file info (uploads only)
    #[serde(default)]
    pub file_path: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub file_size: Option<i64>,
    /// Lowercase extension: mp3, wav, flac, aac, ogg
    #[serde(default)]
    pub file_format: Option<String>,

    // External catalog info (imports only)
    #[serde(default)]
    pub spotify_id: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,

    #[serde(default)]
    pub is_local: bool,
    /// Visible to other users when true
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default)]
    pub play_count: i64,
    /// Nullable for imported tracks
    #[serde(default)]
    pub uploaded_by_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_public() -> bool {
    true
}

impl Music {
    pub fn new(title: String, artist: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            artist,
            album: None,
            genre: None,
            year: None,
            duration: None,
            track_number: None,
            file_path: None,
            file_size: None,
            file_format: None,
            spotify_id: None,
            external_url: None,
            preview_url: None,
            cover_image_url: None,
            is_local: false,
            is_public: true,
            play_count: 0,
            uploaded_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Duration as MM:SS (or HH:MM:SS when an hour or more)
    pub fn duration_formatted(&self) -> String {
        format_duration(self.duration.unwrap_or(0))
    }

    /// File size as B/KB/MB
    pub fn file_size_formatted(&self) -> String {
        format_file_size(self.file_size.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_fields() {
        let mut music = Music::new("Song".into(), "Artist".into());
        assert_eq!(music.duration_formatted(), "00:00");

        music.duration = Some(200);
        assert_eq!(music.duration_formatted(), "03:20");

        music.file_size = Some(5 * 1024 * 1024);
        assert_eq!(music.file_size_formatted(), "5.0 MB");
    }
}
