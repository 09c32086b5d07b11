//! Playlist entry table operations.
//!
//! Reads only; writes go through the transactional helpers in
//! [`crate::core::playlistlib`] so positions and the cached duration
//! never drift apart.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::{Music, PlaylistEntry};

pub struct PlaylistEntryTable;

impl PlaylistEntryTable {
    /// Entries of a playlist in play order. Position ties are broken by
    /// insertion time, then rowid.
    pub async fn get_entries(pool: &SqlitePool, playlist_id: i64) -> Result<Vec<PlaylistEntry>> {
        let entries = sqlx::query_as::<_, PlaylistEntry>(
            r#"
            SELECT playlist_id, music_id, position, added_at FROM playlist_entry
            WHERE playlist_id = ?
            ORDER BY position ASC, added_at ASC, rowid ASC
            "#,
        )
        .bind(playlist_id)
        .fetch_all(pool)
        .await?;
        Ok(entries)
    }

    pub async fn get_entry(
        pool: &SqlitePool,
        playlist_id: i64,
        music_id: i64,
    ) -> Result<Option<PlaylistEntry>> {
        let entry = sqlx::query_as::<_, PlaylistEntry>(
            r#"
            SELECT playlist_id, music_id, position, added_at FROM playlist_entry
            WHERE playlist_id = ? AND music_id = ?
            "#,
        )
        .bind(playlist_id)
        .bind(music_id)
        .fetch_optional(pool)
        .await?;
        Ok(entry)
    }

    pub async fn count(pool: &SqlitePool, playlist_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM playlist_entry WHERE playlist_id = ?")
                .bind(playlist_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    /// Tracks of a playlist in play order, paginated
    pub async fn tracks(
        pool: &SqlitePool,
        playlist_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Music>, i64)> {
        let tracks = sqlx::query_as::<_, Music>(
            r#"
            SELECT m.* FROM music m
            JOIN playlist_entry pe ON pe.music_id = m.id
            WHERE pe.playlist_id = ?
            ORDER BY pe.position ASC, pe.added_at ASC, pe.rowid ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(playlist_id)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;

        let total = Self::count(pool, playlist_id).await?;
        Ok((tracks, total))
    }
}
