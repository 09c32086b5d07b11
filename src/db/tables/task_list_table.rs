//! Task list table operations

use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::TaskList;

pub struct TaskListTable;

impl TaskListTable {
    pub async fn insert(pool: &SqlitePool, list: &TaskList) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO task_list (title, description, color, user_id, is_archived,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&list.title)
        .bind(&list.description)
        .bind(&list.color)
        .bind(list.user_id)
        .bind(list.is_archived)
        .bind(list.created_at)
        .bind(list.updated_at)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<TaskList>> {
        let list = sqlx::query_as::<_, TaskList>("SELECT * FROM task_list WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(list)
    }

    /// Lists belonging to a user, archived ones only on request
    pub async fn get_for_user(
        pool: &SqlitePool,
        user_id: i64,
        include_archived: bool,
    ) -> Result<Vec<TaskList>> {
        let sql = if include_archived {
            "SELECT * FROM task_list WHERE user_id = ? ORDER BY created_at"
        } else {
            "SELECT * FROM task_list WHERE user_id = ? AND is_archived = 0 ORDER BY created_at"
        };
        let lists = sqlx::query_as::<_, TaskList>(sql)
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(lists)
    }

    /// Titles are unique per user, used for duplicate checks
    pub async fn get_by_title(
        pool: &SqlitePool,
        user_id: i64,
        title: &str,
    ) -> Result<Option<TaskList>> {
        let list = sqlx::query_as::<_, TaskList>(
            "SELECT * FROM task_list WHERE user_id = ? AND title = ?",
        )
        .bind(user_id)
        .bind(title)
        .fetch_optional(pool)
        .await?;
        Ok(list)
    }

    pub async fn update(pool: &SqlitePool, list: &TaskList) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE task_list SET title = ?, description = ?, color = ?, is_archived = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&list.title)
        .bind(&list.description)
        .bind(&list.color)
        .bind(list.is_archived)
        .bind(list.updated_at)
        .bind(list.id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete a list; tasks cascade at the schema level
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM task_list WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Number of non-archived lists a user still has
    pub async fn count_active_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM task_list WHERE user_id = ? AND is_archived = 0",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::engine::test_pool;
    use crate::db::tables::UserTable;
    use crate::models::User;

    async fn seed_user(pool: &SqlitePool) -> i64 {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
        );
        UserTable::insert(pool, &user).await.unwrap()
    }

    #[tokio::test]
    async fn test_archived_filtering() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;

        let active = TaskList::new("Work".to_string(), user_id);
        TaskListTable::insert(&pool, &active).await.unwrap();

        let mut archived = TaskList::new("Old".to_string(), user_id);
        archived.is_archived = true;
        TaskListTable::insert(&pool, &archived).await.unwrap();

        let visible = TaskListTable::get_for_user(&pool, user_id, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Work");

        let all = TaskListTable::get_for_user(&pool, user_id, true).await.unwrap();
        assert_eq!(all.len(), 2);

        assert_eq!(
            TaskListTable::count_active_for_user(&pool, user_id).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_title_lookup() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;

        let list = TaskList::new("Groceries".to_string(), user_id);
        TaskListTable::insert(&pool, &list).await.unwrap();

        assert!(TaskListTable::get_by_title(&pool, user_id, "Groceries")
            .await
            .unwrap()
            .is_some());
        assert!(TaskListTable::get_by_title(&pool, user_id, "Missing")
            .await
            .unwrap()
            .is_none());
    }
}
