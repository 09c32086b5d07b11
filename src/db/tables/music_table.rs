//! Music table operations

use anyhow::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::Music;

/// Optional filters for catalog listings
#[derive(Debug, Default, Clone)]
pub struct MusicFilters {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub artist: Option<String>,
    pub year: Option<i64>,
    pub uploader_id: Option<i64>,
    pub is_local: Option<bool>,
}

pub struct MusicTable;

impl MusicTable {
    pub async fn insert(pool: &SqlitePool, music: &Music) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO music (title, artist, album, genre, year, duration, track_number,
                file_path, file_size, file_format, spotify_id, external_url, preview_url,
                cover_image_url, is_local, is_public, play_count, uploaded_by_id,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&music.title)
        .bind(&music.artist)
        .bind(&music.album)
        .bind(&music.genre)
        .bind(music.year)
        .bind(music.duration)
        .bind(music.track_number)
        .bind(&music.file_path)
        .bind(music.file_size)
        .bind(&music.file_format)
        .bind(&music.spotify_id)
        .bind(&music.external_url)
        .bind(&music.preview_url)
        .bind(&music.cover_image_url)
        .bind(music.is_local)
        .bind(music.is_public)
        .bind(music.play_count)
        .bind(music.uploaded_by_id)
        .bind(music.created_at)
        .bind(music.updated_at)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Music>> {
        let music = sqlx::query_as::<_, Music>("SELECT * FROM music WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(music)
    }

    pub async fn get_by_spotify_id(pool: &SqlitePool, spotify_id: &str) -> Result<Option<Music>> {
        let music = sqlx::query_as::<_, Music>("SELECT * FROM music WHERE spotify_id = ?")
            .bind(spotify_id)
            .fetch_optional(pool)
            .await?;
        Ok(music)
    }

    pub async fn update(pool: &SqlitePool, music: &Music) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE music SET title = ?, artist = ?, album = ?, genre = ?, year = ?,
                track_number = ?, is_public = ?, cover_image_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&music.title)
        .bind(&music.artist)
        .bind(&music.album)
        .bind(&music.genre)
        .bind(music.year)
        .bind(music.track_number)
        .bind(music.is_public)
        .bind(&music.cover_image_url)
        .bind(music.updated_at)
        .bind(music.id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete a track; playlist entries cascade at the schema level
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM music WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn increment_play_count(pool: &SqlitePool, id: i64) -> Result<()> {
        sqlx::query("UPDATE music SET play_count = play_count + 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Filtered, paginated catalog listing.
    ///
    /// Visibility: public tracks plus the viewer's own uploads. An admin
    /// viewer sees everything.
    pub async fn paginate_visible(
        pool: &SqlitePool,
        viewer_id: i64,
        viewer_is_admin: bool,
        filters: &MusicFilters,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Music>, i64)> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM music WHERE 1=1");
        Self::push_visibility(&mut query, viewer_id, viewer_is_admin);
        Self::push_filters(&mut query, filters);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(per_page);
        query.push(" OFFSET ");
        query.push_bind((page - 1) * per_page);

        let tracks = query.build_query_as::<Music>().fetch_all(pool).await?;

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM music WHERE 1=1");
        Self::push_visibility(&mut count, viewer_id, viewer_is_admin);
        Self::push_filters(&mut count, filters);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok((tracks, total))
    }

    fn push_visibility(query: &mut QueryBuilder<'_, Sqlite>, viewer_id: i64, viewer_is_admin: bool) {
        if !viewer_is_admin {
            query.push(" AND (is_public = 1 OR uploaded_by_id = ");
            query.push_bind(viewer_id);
            query.push(")");
        }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filters: &MusicFilters) {
        if let Some(search) = &filters.search {
            let pattern = format!("%{}%", search);
            query.push(" AND (title LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR artist LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR album LIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
        if let Some(genre) = &filters.genre {
            query.push(" AND genre = ");
            query.push_bind(genre.clone());
        }
        if let Some(artist) = &filters.artist {
            query.push(" AND artist = ");
            query.push_bind(artist.clone());
        }
        if let Some(year) = filters.year {
            query.push(" AND year = ");
            query.push_bind(year);
        }
        if let Some(uploader_id) = filters.uploader_id {
            query.push(" AND uploaded_by_id = ");
            query.push_bind(uploader_id);
        }
        if let Some(is_local) = filters.is_local {
            query.push(" AND is_local = ");
            query.push_bind(is_local);
        }
    }

    /// Paginated uploads of one user
    pub async fn paginate_uploads(
        pool: &SqlitePool,
        user_id: i64,
        public_only: bool,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Music>, i64)> {
        let visibility = if public_only { " AND is_public = 1" } else { "" };
        let tracks = sqlx::query_as::<_, Music>(&format!(
            r#"
            SELECT * FROM music WHERE uploaded_by_id = ?{visibility}
            ORDER BY created_at DESC LIMIT ? OFFSET ?
            "#,
        ))
        .bind(user_id)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM music WHERE uploaded_by_id = ?{visibility}"
        ))
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok((tracks, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::engine::test_pool;
    use crate::db::tables::UserTable;
    use crate::models::User;

    async fn seed_user(pool: &SqlitePool, name: &str) -> i64 {
        let user = User::new(
            name.to_string(),
            format!("{name}@example.com"),
            "hash".to_string(),
        );
        UserTable::insert(pool, &user).await.unwrap()
    }

    fn track(title: &str, artist: &str) -> Music {
        Music::new(title.to_string(), artist.to_string())
    }

    #[tokio::test]
    async fn test_visibility_scope() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let mut public = track("Public Song", "Band");
        public.uploaded_by_id = Some(alice);
        MusicTable::insert(&pool, &public).await.unwrap();

        let mut private = track("Private Song", "Band");
        private.is_public = false;
        private.uploaded_by_id = Some(alice);
        MusicTable::insert(&pool, &private).await.unwrap();

        let (visible, total) =
            MusicTable::paginate_visible(&pool, bob, false, &MusicFilters::default(), 1, 10)
                .await
                .unwrap();
        assert_eq!(total, 1);
        assert_eq!(visible[0].title, "Public Song");

        let (_, total) =
            MusicTable::paginate_visible(&pool, alice, false, &MusicFilters::default(), 1, 10)
                .await
                .unwrap();
        assert_eq!(total, 2);

        let (_, total) =
            MusicTable::paginate_visible(&pool, bob, true, &MusicFilters::default(), 1, 10)
                .await
                .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_uploads_listing_hides_private_from_others() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;

        let mut public = track("Shared", "Band");
        public.uploaded_by_id = Some(alice);
        MusicTable::insert(&pool, &public).await.unwrap();

        let mut private = track("Hidden", "Band");
        private.is_public = false;
        private.uploaded_by_id = Some(alice);
        MusicTable::insert(&pool, &private).await.unwrap();

        let (tracks, total) = MusicTable::paginate_uploads(&pool, alice, true, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tracks[0].title, "Shared");

        let (_, total) = MusicTable::paginate_uploads(&pool, alice, false, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_year_and_uploader_filters() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let mut old = track("Old Song", "Band");
        old.year = Some(1999);
        old.uploaded_by_id = Some(alice);
        MusicTable::insert(&pool, &old).await.unwrap();

        let mut new = track("New Song", "Band");
        new.year = Some(2020);
        new.uploaded_by_id = Some(bob);
        MusicTable::insert(&pool, &new).await.unwrap();

        let filters = MusicFilters {
            year: Some(1999),
            ..Default::default()
        };
        let (tracks, total) = MusicTable::paginate_visible(&pool, alice, false, &filters, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tracks[0].title, "Old Song");

        let filters = MusicFilters {
            uploader_id: Some(bob),
            ..Default::default()
        };
        let (tracks, total) = MusicTable::paginate_visible(&pool, alice, false, &filters, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tracks[0].title, "New Song");
    }

    #[tokio::test]
    async fn test_search_and_spotify_lookup() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;

        let mut imported = track("Dreams", "Fleetwood Mac");
        imported.spotify_id = Some("abc123".to_string());
        imported.uploaded_by_id = Some(alice);
        MusicTable::insert(&pool, &imported).await.unwrap();

        let filters = MusicFilters {
            search: Some("fleet".to_string()),
            ..Default::default()
        };
        let (_, total) = MusicTable::paginate_visible(&pool, alice, false, &filters, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);

        let found = MusicTable::get_by_spotify_id(&pool, "abc123").await.unwrap();
        assert!(found.is_some());
        assert!(MusicTable::get_by_spotify_id(&pool, "zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_play_count_increment() {
        let pool = test_pool().await;
        let id = MusicTable::insert(&pool, &track("Song", "Artist")).await.unwrap();
        MusicTable::increment_play_count(&pool, id).await.unwrap();
        MusicTable::increment_play_count(&pool, id).await.unwrap();
        let music = MusicTable::get(&pool, id).await.unwrap().unwrap();
        assert_eq!(music.play_count, 2);
    }
}
