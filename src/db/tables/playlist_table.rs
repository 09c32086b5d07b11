//! Playlist table operations

use anyhow::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::Playlist;

pub struct PlaylistTable;

impl PlaylistTable {
    pub async fn insert(pool: &SqlitePool, playlist: &Playlist) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO playlist (name, description, cover_image_url, is_public,
                is_collaborative, total_duration, play_count, owner_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(&playlist.cover_image_url)
        .bind(playlist.is_public)
        .bind(playlist.is_collaborative)
        .bind(playlist.total_duration)
        .bind(playlist.play_count)
        .bind(playlist.owner_id)
        .bind(playlist.created_at)
        .bind(playlist.updated_at)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Playlist>> {
        let playlist = sqlx::query_as::<_, Playlist>("SELECT * FROM playlist WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(playlist)
    }

    pub async fn update(pool: &SqlitePool, playlist: &Playlist) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE playlist SET name = ?, description = ?, cover_image_url = ?,
                is_public = ?, is_collaborative = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(&playlist.cover_image_url)
        .bind(playlist.is_public)
        .bind(playlist.is_collaborative)
        .bind(playlist.updated_at)
        .bind(playlist.id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete a playlist; entries cascade at the schema level
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM playlist WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn increment_play_count(pool: &SqlitePool, id: i64) -> Result<()> {
        sqlx::query("UPDATE playlist SET play_count = play_count + 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Paginated listing of playlists visible to a viewer: public ones plus
    /// the viewer's own. An admin viewer sees everything.
    pub async fn paginate_visible(
        pool: &SqlitePool,
        viewer_id: i64,
        viewer_is_admin: bool,
        search: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Playlist>, i64)> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM playlist WHERE 1=1");
        Self::push_scope(&mut query, viewer_id, viewer_is_admin, search);
        query.push(" ORDER BY updated_at DESC LIMIT ");
        query.push_bind(per_page);
        query.push(" OFFSET ");
        query.push_bind((page - 1) * per_page);

        let playlists = query.build_query_as::<Playlist>().fetch_all(pool).await?;

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM playlist WHERE 1=1");
        Self::push_scope(&mut count, viewer_id, viewer_is_admin, search);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok((playlists, total))
    }

    fn push_scope(
        query: &mut QueryBuilder<'_, Sqlite>,
        viewer_id: i64,
        viewer_is_admin: bool,
        search: Option<&str>,
    ) {
        if !viewer_is_admin {
            query.push(" AND (is_public = 1 OR owner_id = ");
            query.push_bind(viewer_id);
            query.push(")");
        }
        if let Some(search) = search {
            query.push(" AND name LIKE ");
            query.push_bind(format!("%{}%", search));
        }
    }

    /// A user's own playlists, optionally restricted to public ones when
    /// somebody else is looking
    pub async fn get_for_owner(
        pool: &SqlitePool,
        owner_id: i64,
        public_only: bool,
    ) -> Result<Vec<Playlist>> {
        let sql = if public_only {
            "SELECT * FROM playlist WHERE owner_id = ? AND is_public = 1 ORDER BY updated_at DESC"
        } else {
            "SELECT * FROM playlist WHERE owner_id = ? ORDER BY updated_at DESC"
        };
        let playlists = sqlx::query_as::<_, Playlist>(sql)
            .bind(owner_id)
            .fetch_all(pool)
            .await?;
        Ok(playlists)
    }
}
