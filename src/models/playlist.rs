//! Playlist model and the playlist<->music association row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format::format_duration;

/// An ordered collection of music tracks owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Playlist {
    /// Database ID
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// Visible to other users when true
    #[serde(default = "default_public")]
    pub is_public: bool,
    /// Collaborative playlists accept track mutations from any
    /// authenticated user
    #[serde(default)]
    pub is_collaborative: bool,
    /// Cached sum of track durations in seconds; repaired by
    /// recompute_duration
    #[serde(default)]
    pub total_duration: i64,
    #[serde(default)]
    pub play_count: i64,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_public() -> bool {
    true
}

impl Playlist {
    pub fn new(name: String, owner_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            description: None,
            cover_image_url: None,
            is_public: true,
            is_collaborative: false,
            total_duration: 0,
            play_count: 0,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total duration as MM:SS (or HH:MM:SS when an hour or more)
    pub fn total_duration_formatted(&self) -> String {
        format_duration(self.total_duration)
    }
}

/// One playlist<->music association row.
///
/// Positions order tracks within a playlist but are not required to be
/// unique or contiguous; listing breaks ties by `added_at` then rowid.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlaylistEntry {
    pub playlist_id: i64,
    pub music_id: i64,
    pub position: i64,
    pub added_at: DateTime<Utc>,
}
