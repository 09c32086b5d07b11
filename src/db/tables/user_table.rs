//! User table operations

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::User;

pub struct UserTable;

impl UserTable {
    /// Insert a new user and return its id
    pub async fn insert(pool: &SqlitePool, user: &User) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO user (username, email, password, first_name, last_name,
                avatar_url, is_admin, is_active, created_at, last_login)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.avatar_url)
        .bind(user.is_admin)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.last_login)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM user WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM user WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM user WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// Look up by username or email, used by login
    pub async fn get_by_login(pool: &SqlitePool, login: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM user WHERE username = ? OR email = ?")
            .bind(login)
            .bind(login)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn update(pool: &SqlitePool, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user SET username = ?, email = ?, first_name = ?, last_name = ?,
                avatar_url = ?, is_admin = ?, is_active = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.avatar_url)
        .bind(user.is_admin)
        .bind(user.is_active)
        .bind(user.id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_password(pool: &SqlitePool, id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE user SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_last_login(pool: &SqlitePool, id: i64, when: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE user SET last_login = ? WHERE id = ?")
            .bind(when)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Deactivate an account, a soft delete
    pub async fn deactivate(pool: &SqlitePool, id: i64) -> Result<()> {
        sqlx::query("UPDATE user SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count_active_admins(pool: &SqlitePool) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user WHERE is_admin = 1 AND is_active = 1")
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    /// Paginated listing with an optional username/email search
    pub async fn paginate(
        pool: &SqlitePool,
        search: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<User>, i64)> {
        let pattern = search.map(|s| format!("%{}%", s));
        let offset = (page - 1) * per_page;

        let (users, total) = match &pattern {
            Some(p) => {
                let users = sqlx::query_as::<_, User>(
                    r#"
                    SELECT * FROM user WHERE username LIKE ? OR email LIKE ?
                    ORDER BY username LIMIT ? OFFSET ?
                    "#,
                )
                .bind(p)
                .bind(p)
                .bind(per_page)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM user WHERE username LIKE ? OR email LIKE ?",
                )
                .bind(p)
                .bind(p)
                .fetch_one(pool)
                .await?;
                (users, total)
            }
            None => {
                let users = sqlx::query_as::<_, User>(
                    "SELECT * FROM user ORDER BY username LIMIT ? OFFSET ?",
                )
                .bind(per_page)
                .bind(offset)
                .fetch_all(pool)
                .await?;
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user")
                    .fetch_one(pool)
                    .await?;
                (users, total)
            }
        };

        Ok((users, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::engine::test_pool;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let pool = test_pool().await;
        let mut user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
        );
        user.id = UserTable::insert(&pool, &user).await.unwrap();

        let by_name = UserTable::get_by_username(&pool, "alice").await.unwrap();
        assert_eq!(by_name.unwrap().id, user.id);

        let by_login = UserTable::get_by_login(&pool, "alice@example.com")
            .await
            .unwrap();
        assert_eq!(by_login.unwrap().username, "alice");

        assert!(UserTable::get_by_login(&pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deactivate_and_admin_count() {
        let pool = test_pool().await;
        let mut admin = User::new(
            "root".to_string(),
            "root@example.com".to_string(),
            "hash".to_string(),
        );
        admin.is_admin = true;
        let id = UserTable::insert(&pool, &admin).await.unwrap();

        assert_eq!(UserTable::count_active_admins(&pool).await.unwrap(), 1);
        UserTable::deactivate(&pool, id).await.unwrap();
        assert_eq!(UserTable::count_active_admins(&pool).await.unwrap(), 0);

        let user = UserTable::get(&pool, id).await.unwrap().unwrap();
        assert!(!user.is_active);
    }

    #[tokio::test]
    async fn test_paginate_search() {
        let pool = test_pool().await;
        for name in ["anna", "bob", "annette"] {
            let user = User::new(
                name.to_string(),
                format!("{name}@example.com"),
                "hash".to_string(),
            );
            UserTable::insert(&pool, &user).await.unwrap();
        }

        let (users, total) = UserTable::paginate(&pool, Some("ann"), 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(users.len(), 2);

        let (page, total) = UserTable::paginate(&pool, None, 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
    }
}
