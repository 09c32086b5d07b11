//! Database engine and connection management

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Paths;

static DB_ENGINE: OnceCell<Arc<DbEngine>> = OnceCell::new();

/// Database engine wrapper
pub struct DbEngine {
    pool: SqlitePool,
}

impl DbEngine {
    /// Get the global database engine instance
    pub fn get() -> Result<Arc<DbEngine>> {
        DB_ENGINE
            .get()
            .map(Arc::clone)
            .context("Database not initialized")
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Setup the SQLite database and install the global engine
pub async fn setup_sqlite() -> Result<()> {
    let paths = Paths::get()?;
    let db_path = paths.app_db_path();

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30))
        .pragma("foreign_keys", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    create_tables(&pool).await?;

    DB_ENGINE
        .set(Arc::new(DbEngine { pool }))
        .map_err(|_| anyhow::anyhow!("Database already initialized"))?;

    Ok(())
}

/// Create all database tables
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    // User table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            email TEXT NOT NULL,
            password TEXT NOT NULL,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            avatar_url TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            last_login TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_user_username ON user(username);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_user_email ON user(email);
        "#,
    )
    .execute(pool)
    .await?;

    // Task list table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_list (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '#1976d2',
            user_id INTEGER NOT NULL,
            is_archived INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES user(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_task_list_user ON task_list(user_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_task_list_user_title ON task_list(user_id, title);
        "#,
    )
    .execute(pool)
    .await?;

    // Task table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            completed INTEGER NOT NULL DEFAULT 0,
            priority TEXT NOT NULL DEFAULT 'medium',
            due_date TEXT,
            completed_at TEXT,
            task_list_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (task_list_id) REFERENCES task_list(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES user(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_task_user ON task(user_id);
        CREATE INDEX IF NOT EXISTS idx_task_list ON task(task_list_id);
        "#,
    )
    .execute(pool)
    .await?;

    // Music table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS music (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            album TEXT,
            genre TEXT,
            year INTEGER,
            duration INTEGER,
            track_number INTEGER,
            file_path TEXT,
            file_size INTEGER,
            file_format TEXT,
            spotify_id TEXT,
            external_url TEXT,
            preview_url TEXT,
            cover_image_url TEXT,
            is_local INTEGER NOT NULL DEFAULT 0,
            is_public INTEGER NOT NULL DEFAULT 1,
            play_count INTEGER NOT NULL DEFAULT 0,
            uploaded_by_id INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (uploaded_by_id) REFERENCES user(id) ON DELETE SET NULL
        );
        CREATE INDEX IF NOT EXISTS idx_music_title ON music(title);
        CREATE INDEX IF NOT EXISTS idx_music_artist ON music(artist);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_music_spotify_id
            ON music(spotify_id) WHERE spotify_id IS NOT NULL;
        "#,
    )
    .execute(pool)
    .await?;

    // Playlist table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            cover_image_url TEXT,
            is_public INTEGER NOT NULL DEFAULT 1,
            is_collaborative INTEGER NOT NULL DEFAULT 0,
            total_duration INTEGER NOT NULL DEFAULT 0,
            play_count INTEGER NOT NULL DEFAULT 0,
            owner_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (owner_id) REFERENCES user(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_playlist_name ON playlist(name);
        CREATE INDEX IF NOT EXISTS idx_playlist_owner ON playlist(owner_id);
        "#,
    )
    .execute(pool)
    .await?;

    // Playlist entry table: the association row is its own entity since it
    // carries position and insertion metadata
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_entry (
            playlist_id INTEGER NOT NULL,
            music_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            added_at TEXT NOT NULL,
            PRIMARY KEY (playlist_id, music_id),
            FOREIGN KEY (playlist_id) REFERENCES playlist(id) ON DELETE CASCADE,
            FOREIGN KEY (music_id) REFERENCES music(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_playlist_entry_playlist ON playlist_entry(playlist_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Build an isolated in-memory database, used by tests
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .pragma("foreign_keys", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    create_tables(&pool).await.unwrap();
    pool
}
