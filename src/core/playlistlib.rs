//! Transactional playlist mutations.
//!
//! Every mutation that touches entries also maintains the playlist's cached
//! `total_duration`, and runs inside one transaction so the two cannot
//! drift apart mid-request.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::tables::{MusicTable, PlaylistEntryTable, PlaylistTable};
use crate::errors::ApiError;
use crate::models::{Playlist, PlaylistEntry, User};

/// Add a track to a playlist.
///
/// Positions are 1-based. When no position is given the track is appended.
/// A track can appear in a playlist at most once; a second add is a conflict.
pub async fn add_track(
    pool: &SqlitePool,
    playlist_id: i64,
    music_id: i64,
    position: Option<i64>,
    now: DateTime<Utc>,
) -> Result<PlaylistEntry, ApiError> {
    if PlaylistEntryTable::get_entry(pool, playlist_id, music_id)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Track is already in this playlist"));
    }

    let music = MusicTable::get(pool, music_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Track not found"))?;

    let mut tx = pool.begin().await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlist_entry WHERE playlist_id = ?")
        .bind(playlist_id)
        .fetch_one(&mut *tx)
        .await?;
    let position = position.unwrap_or(count + 1).max(1);

    let entry = PlaylistEntry {
        playlist_id,
        music_id,
        position,
        added_at: now,
    };
    sqlx::query(
        "INSERT INTO playlist_entry (playlist_id, music_id, position, added_at) VALUES (?, ?, ?, ?)",
    )
    .bind(entry.playlist_id)
    .bind(entry.music_id)
    .bind(entry.position)
    .bind(entry.added_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE playlist SET total_duration = total_duration + ?, updated_at = ? WHERE id = ?",
    )
    .bind(music.duration.unwrap_or(0))
    .bind(now)
    .bind(playlist_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(entry)
}

/// Remove a track from a playlist. The cached duration never drops below
/// zero even if it had drifted.
pub async fn remove_track(
    pool: &SqlitePool,
    playlist_id: i64,
    music_id: i64,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if PlaylistEntryTable::get_entry(pool, playlist_id, music_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Track is not in this playlist"));
    }

    let music = MusicTable::get(pool, music_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Track not found"))?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM playlist_entry WHERE playlist_id = ? AND music_id = ?")
        .bind(playlist_id)
        .bind(music_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE playlist SET total_duration = MAX(total_duration - ?, 0), updated_at = ? WHERE id = ?",
    )
    .bind(music.duration.unwrap_or(0))
    .bind(now)
    .bind(playlist_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Move a track to a new position. Only the position changes; the duration
/// is untouched.
pub async fn reorder_track(
    pool: &SqlitePool,
    playlist_id: i64,
    music_id: i64,
    new_position: i64,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if PlaylistEntryTable::get_entry(pool, playlist_id, music_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Track is not in this playlist"));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE playlist_entry SET position = ? WHERE playlist_id = ? AND music_id = ?")
        .bind(new_position.max(1))
        .bind(playlist_id)
        .bind(music_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE playlist SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Recompute the cached duration from the entries, repairing any drift.
/// Returns the fresh total in seconds.
pub async fn recompute_duration(
    pool: &SqlitePool,
    playlist_id: i64,
    now: DateTime<Utc>,
) -> Result<i64, ApiError> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(m.duration), 0) FROM playlist_entry pe
        JOIN music m ON m.id = pe.music_id
        WHERE pe.playlist_id = ?
        "#,
    )
    .bind(playlist_id)
    .fetch_one(pool)
    .await?;

    sqlx::query("UPDATE playlist SET total_duration = ?, updated_at = ? WHERE id = ?")
        .bind(total)
        .bind(now)
        .bind(playlist_id)
        .execute(pool)
        .await?;

    Ok(total)
}

/// Caller-supplied metadata for a playlist copy. Absent fields fall back
/// to the source playlist, or to a private non-collaborative default.
#[derive(Debug, Default, Deserialize)]
pub struct DuplicateOverrides {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub is_public: Option<bool>,
    pub is_collaborative: Option<bool>,
}

/// Copy a playlist for `new_owner`, keeping only the tracks they are allowed
/// to see and preserving their play order. Without overrides the copy starts
/// private and non-collaborative.
pub async fn duplicate(
    pool: &SqlitePool,
    source: &Playlist,
    new_owner: &User,
    overrides: &DuplicateOverrides,
    now: DateTime<Utc>,
) -> Result<Playlist, ApiError> {
    let entries = PlaylistEntryTable::get_entries(pool, source.id).await?;

    let mut kept = Vec::new();
    let mut total_duration = 0i64;
    for entry in entries {
        let Some(music) = MusicTable::get(pool, entry.music_id).await? else {
            continue;
        };
        let readable =
            new_owner.is_admin || music.is_public || music.uploaded_by_id == Some(new_owner.id);
        if readable {
            total_duration += music.duration.unwrap_or(0);
            kept.push(entry.music_id);
        }
    }

    let name = overrides
        .name
        .clone()
        .unwrap_or_else(|| format!("{} (Copy)", source.name));
    let mut copy = Playlist::new(name, new_owner.id);
    copy.description = overrides
        .description
        .clone()
        .or_else(|| source.description.clone());
    copy.cover_image_url = overrides
        .cover_image_url
        .clone()
        .or_else(|| source.cover_image_url.clone());
    copy.is_public = overrides.is_public.unwrap_or(false);
    copy.is_collaborative = overrides.is_collaborative.unwrap_or(false);
    copy.total_duration = total_duration;
    copy.created_at = now;
    copy.updated_at = now;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO playlist (name, description, cover_image_url, is_public,
            is_collaborative, total_duration, play_count, owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
        "#,
    )
    .bind(&copy.name)
    .bind(&copy.description)
    .bind(&copy.cover_image_url)
    .bind(copy.is_public)
    .bind(copy.is_collaborative)
    .bind(copy.total_duration)
    .bind(copy.owner_id)
    .bind(copy.created_at)
    .bind(copy.updated_at)
    .execute(&mut *tx)
    .await?;
    copy.id = result.last_insert_rowid();

    for (index, music_id) in kept.iter().enumerate() {
        sqlx::query(
            "INSERT INTO playlist_entry (playlist_id, music_id, position, added_at) VALUES (?, ?, ?, ?)",
        )
        .bind(copy.id)
        .bind(music_id)
        .bind(index as i64 + 1)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::engine::test_pool;
    use crate::db::tables::UserTable;
    use crate::models::Music;

    async fn seed_user(pool: &SqlitePool, name: &str) -> User {
        let mut user = User::new(
            name.to_string(),
            format!("{name}@example.com"),
            "hash".to_string(),
        );
        user.id = UserTable::insert(pool, &user).await.unwrap();
        user
    }

    async fn seed_track(pool: &SqlitePool, title: &str, duration: i64, public: bool) -> i64 {
        let mut music = Music::new(title.to_string(), "Artist".to_string());
        music.duration = Some(duration);
        music.is_public = public;
        MusicTable::insert(pool, &music).await.unwrap()
    }

    async fn seed_playlist(pool: &SqlitePool, owner_id: i64) -> Playlist {
        let mut playlist = Playlist::new("Mix".to_string(), owner_id);
        playlist.id = PlaylistTable::insert(pool, &playlist).await.unwrap();
        playlist
    }

    #[tokio::test]
    async fn test_append_positions_and_duration() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let playlist = seed_playlist(&pool, alice.id).await;
        let a = seed_track(&pool, "a", 100, true).await;
        let b = seed_track(&pool, "b", 200, true).await;

        let first = add_track(&pool, playlist.id, a, None, Utc::now()).await.unwrap();
        let second = add_track(&pool, playlist.id, b, None, Utc::now()).await.unwrap();
        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);

        let fresh = PlaylistTable::get(&pool, playlist.id).await.unwrap().unwrap();
        assert_eq!(fresh.total_duration, 300);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_conflict() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let playlist = seed_playlist(&pool, alice.id).await;
        let a = seed_track(&pool, "a", 100, true).await;

        add_track(&pool, playlist.id, a, None, Utc::now()).await.unwrap();
        let err = add_track(&pool, playlist.id, a, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // the failed add must not have touched the duration
        let fresh = PlaylistTable::get(&pool, playlist.id).await.unwrap().unwrap();
        assert_eq!(fresh.total_duration, 100);
    }

    #[tokio::test]
    async fn test_remove_clamps_duration() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let playlist = seed_playlist(&pool, alice.id).await;
        let a = seed_track(&pool, "a", 100, true).await;
        add_track(&pool, playlist.id, a, None, Utc::now()).await.unwrap();

        // simulate drift: the cache thinks there is less than the track holds
        sqlx::query("UPDATE playlist SET total_duration = 40 WHERE id = ?")
            .bind(playlist.id)
            .execute(&pool)
            .await
            .unwrap();

        remove_track(&pool, playlist.id, a, Utc::now()).await.unwrap();
        let fresh = PlaylistTable::get(&pool, playlist.id).await.unwrap().unwrap();
        assert_eq!(fresh.total_duration, 0);

        let err = remove_track(&pool, playlist.id, a, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reorder_changes_order_not_duration() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let playlist = seed_playlist(&pool, alice.id).await;
        let a = seed_track(&pool, "a", 100, true).await;
        let b = seed_track(&pool, "b", 200, true).await;
        add_track(&pool, playlist.id, a, None, Utc::now()).await.unwrap();
        add_track(&pool, playlist.id, b, None, Utc::now()).await.unwrap();

        reorder_track(&pool, playlist.id, a, 3, Utc::now()).await.unwrap();

        let entries = PlaylistEntryTable::get_entries(&pool, playlist.id).await.unwrap();
        assert_eq!(entries[0].music_id, b);
        assert_eq!(entries[1].music_id, a);

        // positions may collide; the listing falls back to insertion order
        reorder_track(&pool, playlist.id, b, 3, Utc::now()).await.unwrap();
        let entries = PlaylistEntryTable::get_entries(&pool, playlist.id).await.unwrap();
        assert_eq!(entries[0].music_id, a);
        assert_eq!(entries[1].music_id, b);

        let fresh = PlaylistTable::get(&pool, playlist.id).await.unwrap().unwrap();
        assert_eq!(fresh.total_duration, 300);
    }

    #[tokio::test]
    async fn test_recompute_repairs_drift() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let playlist = seed_playlist(&pool, alice.id).await;
        let a = seed_track(&pool, "a", 100, true).await;
        let b = seed_track(&pool, "b", 250, true).await;
        add_track(&pool, playlist.id, a, None, Utc::now()).await.unwrap();
        add_track(&pool, playlist.id, b, None, Utc::now()).await.unwrap();

        sqlx::query("UPDATE playlist SET total_duration = 9999 WHERE id = ?")
            .bind(playlist.id)
            .execute(&pool)
            .await
            .unwrap();

        let total = recompute_duration(&pool, playlist.id, Utc::now()).await.unwrap();
        assert_eq!(total, 350);
        let fresh = PlaylistTable::get(&pool, playlist.id).await.unwrap().unwrap();
        assert_eq!(fresh.total_duration, 350);
    }

    #[tokio::test]
    async fn test_duplicate_filters_private_tracks_and_keeps_order() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let playlist = seed_playlist(&pool, alice.id).await;

        let public_a = seed_track(&pool, "a", 100, true).await;
        let private = seed_track(&pool, "p", 500, false).await;
        let public_b = seed_track(&pool, "b", 200, true).await;
        add_track(&pool, playlist.id, public_a, None, Utc::now()).await.unwrap();
        add_track(&pool, playlist.id, private, None, Utc::now()).await.unwrap();
        add_track(&pool, playlist.id, public_b, None, Utc::now()).await.unwrap();

        let copy = duplicate(
            &pool,
            &playlist_fresh(&pool, playlist.id).await,
            &bob,
            &DuplicateOverrides::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(copy.name, "Mix (Copy)");
        assert_eq!(copy.owner_id, bob.id);
        assert!(!copy.is_public);
        assert_eq!(copy.total_duration, 300);

        let entries = PlaylistEntryTable::get_entries(&pool, copy.id).await.unwrap();
        let order: Vec<i64> = entries.iter().map(|e| e.music_id).collect();
        assert_eq!(order, vec![public_a, public_b]);
        assert_eq!(entries[0].position, 1);
        assert_eq!(entries[1].position, 2);
    }

    #[tokio::test]
    async fn test_duplicate_applies_overrides() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let playlist = seed_playlist(&pool, alice.id).await;

        let overrides = DuplicateOverrides {
            name: Some("Party Mix".to_string()),
            description: Some("For Friday".to_string()),
            is_public: Some(true),
            is_collaborative: Some(true),
            ..Default::default()
        };
        let copy = duplicate(&pool, &playlist, &alice, &overrides, Utc::now())
            .await
            .unwrap();
        assert_eq!(copy.name, "Party Mix");
        assert_eq!(copy.description.as_deref(), Some("For Friday"));
        assert!(copy.is_public);
        assert!(copy.is_collaborative);
    }

    async fn playlist_fresh(pool: &SqlitePool, id: i64) -> Playlist {
        PlaylistTable::get(pool, id).await.unwrap().unwrap()
    }
}
