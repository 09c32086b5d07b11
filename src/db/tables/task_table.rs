//! Task table operations

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::{Priority, Task};

/// Optional filters for task listings
#[derive(Debug, Default, Clone)]
pub struct TaskFilters {
    pub task_list_id: Option<i64>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
    /// When set, keep only incomplete tasks due before this instant
    pub overdue_as_of: Option<DateTime<Utc>>,
}

pub struct TaskTable;

impl TaskTable {
    pub async fn insert(pool: &SqlitePool, task: &Task) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO task (title, description, completed, priority, due_date,
                completed_at, task_list_id, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.completed_at)
        .bind(task.task_list_id)
        .bind(task.user_id)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM task WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(task)
    }

    pub async fn update(pool: &SqlitePool, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE task SET title = ?, description = ?, completed = ?, priority = ?,
                due_date = ?, completed_at = ?, task_list_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.completed_at)
        .bind(task.task_list_id)
        .bind(task.updated_at)
        .bind(task.id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM task WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Filtered, paginated listing for one user.
    ///
    /// Ordering puts incomplete tasks first, then higher priority, then the
    /// nearest due date with undated tasks last, then newest first.
    pub async fn paginate_for_user(
        pool: &SqlitePool,
        user_id: i64,
        filters: &TaskFilters,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Task>, i64)> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM task WHERE user_id = ");
        query.push_bind(user_id);
        Self::push_filters(&mut query, filters);
        query.push(
            r#"
            ORDER BY completed ASC,
                CASE priority
                    WHEN 'urgent' THEN 0
                    WHEN 'high' THEN 1
                    WHEN 'medium' THEN 2
                    ELSE 3
                END ASC,
                due_date IS NULL ASC, due_date ASC,
                created_at DESC
            LIMIT "#,
        );
        query.push_bind(per_page);
        query.push(" OFFSET ");
        query.push_bind((page - 1) * per_page);

        let tasks = query.build_query_as::<Task>().fetch_all(pool).await?;

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM task WHERE user_id = ");
        count.push_bind(user_id);
        Self::push_filters(&mut count, filters);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok((tasks, total))
    }

    fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filters: &TaskFilters) {
        if let Some(list_id) = filters.task_list_id {
            query.push(" AND task_list_id = ");
            query.push_bind(list_id);
        }
        if let Some(completed) = filters.completed {
            query.push(" AND completed = ");
            query.push_bind(completed);
        }
        if let Some(priority) = filters.priority {
            query.push(" AND priority = ");
            query.push_bind(priority.as_str());
        }
        if let Some(now) = filters.overdue_as_of {
            query.push(" AND due_date IS NOT NULL AND due_date < ");
            query.push_bind(now);
            query.push(" AND completed = 0");
        }
        if let Some(search) = &filters.search {
            let pattern = format!("%{}%", search);
            query.push(" AND (title LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR description LIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }

    /// Every task a user owns, used by the dashboard
    pub async fn get_all_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>("SELECT * FROM task WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(tasks)
    }

    /// Fetch a batch of tasks by id, restricted to one owner
    pub async fn get_many_for_user(
        pool: &SqlitePool,
        user_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Task>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM task WHERE user_id = ");
        query.push_bind(user_id);
        query.push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        query.push(")");

        let tasks = query.build_query_as::<Task>().fetch_all(pool).await?;
        Ok(tasks)
    }

    /// Set completion state for a batch, inside one transaction
    pub async fn bulk_set_completed(
        pool: &SqlitePool,
        ids: &[i64],
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        let completed_at = completed.then_some(now);
        for id in ids {
            sqlx::query(
                "UPDATE task SET completed = ?, completed_at = ?, updated_at = ? WHERE id = ?",
            )
            .bind(completed)
            .bind(completed_at)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn bulk_delete(pool: &SqlitePool, ids: &[i64]) -> Result<()> {
        let mut tx = pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM task WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn bulk_move(
        pool: &SqlitePool,
        ids: &[i64],
        target_list_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;
        for id in ids {
            sqlx::query("UPDATE task SET task_list_id = ?, updated_at = ? WHERE id = ?")
                .bind(target_list_id)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// (total, completed) counts for one list
    pub async fn counts_for_list(pool: &SqlitePool, list_id: i64) -> Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(completed), 0)
            FROM task WHERE task_list_id = ?
            "#,
        )
        .bind(list_id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// (total, completed) counts per priority for one list
    pub async fn priority_counts_for_list(
        pool: &SqlitePool,
        list_id: i64,
    ) -> Result<Vec<(Priority, i64, i64)>> {
        let rows: Vec<(Priority, i64, i64)> = sqlx::query_as(
            r#"
            SELECT priority, COUNT(*), COALESCE(SUM(completed), 0)
            FROM task WHERE task_list_id = ?
            GROUP BY priority
            "#,
        )
        .bind(list_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::engine::test_pool;
    use crate::db::tables::{TaskListTable, UserTable};
    use crate::models::{TaskList, User};

    async fn seed(pool: &SqlitePool) -> (i64, i64) {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
        );
        let user_id = UserTable::insert(pool, &user).await.unwrap();
        let list = TaskList::new("Inbox".to_string(), user_id);
        let list_id = TaskListTable::insert(pool, &list).await.unwrap();
        (user_id, list_id)
    }

    async fn seed_task(
        pool: &SqlitePool,
        title: &str,
        list_id: i64,
        user_id: i64,
        priority: Priority,
        completed: bool,
    ) -> i64 {
        let mut task = Task::new(title.to_string(), list_id, user_id);
        task.priority = priority;
        if completed {
            task.toggle_completion();
        }
        TaskTable::insert(pool, &task).await.unwrap()
    }

    #[tokio::test]
    async fn test_ordering_and_filters() {
        let pool = test_pool().await;
        let (user_id, list_id) = seed(&pool).await;

        seed_task(&pool, "low", list_id, user_id, Priority::Low, false).await;
        seed_task(&pool, "done", list_id, user_id, Priority::Urgent, true).await;
        seed_task(&pool, "urgent", list_id, user_id, Priority::Urgent, false).await;

        let (tasks, total) =
            TaskTable::paginate_for_user(&pool, user_id, &TaskFilters::default(), 1, 10)
                .await
                .unwrap();
        assert_eq!(total, 3);
        // incomplete before complete, urgent before low
        assert_eq!(tasks[0].title, "urgent");
        assert_eq!(tasks[1].title, "low");
        assert_eq!(tasks[2].title, "done");

        let filters = TaskFilters {
            completed: Some(false),
            priority: Some(Priority::Urgent),
            ..Default::default()
        };
        let (tasks, total) = TaskTable::paginate_for_user(&pool, user_id, &filters, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tasks[0].title, "urgent");

        let filters = TaskFilters {
            search: Some("urg".to_string()),
            ..Default::default()
        };
        let (_, total) = TaskTable::paginate_for_user(&pool, user_id, &filters, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_overdue_filter() {
        let pool = test_pool().await;
        let (user_id, list_id) = seed(&pool).await;
        let now = Utc::now();

        let mut late = Task::new("late".to_string(), list_id, user_id);
        late.due_date = Some(now - chrono::Duration::days(2));
        TaskTable::insert(&pool, &late).await.unwrap();

        let mut cleared = Task::new("cleared".to_string(), list_id, user_id);
        cleared.due_date = Some(now - chrono::Duration::days(2));
        cleared.toggle_completion();
        TaskTable::insert(&pool, &cleared).await.unwrap();

        let mut upcoming = Task::new("upcoming".to_string(), list_id, user_id);
        upcoming.due_date = Some(now + chrono::Duration::days(2));
        TaskTable::insert(&pool, &upcoming).await.unwrap();

        TaskTable::insert(&pool, &Task::new("undated".to_string(), list_id, user_id))
            .await
            .unwrap();

        let filters = TaskFilters {
            overdue_as_of: Some(now),
            ..Default::default()
        };
        let (tasks, total) = TaskTable::paginate_for_user(&pool, user_id, &filters, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tasks[0].title, "late");
    }

    #[tokio::test]
    async fn test_priority_counts() {
        let pool = test_pool().await;
        let (user_id, list_id) = seed(&pool).await;

        seed_task(&pool, "a", list_id, user_id, Priority::Low, false).await;
        seed_task(&pool, "b", list_id, user_id, Priority::Low, true).await;
        seed_task(&pool, "c", list_id, user_id, Priority::Urgent, false).await;

        let counts = TaskTable::priority_counts_for_list(&pool, list_id)
            .await
            .unwrap();
        let low = counts.iter().find(|(p, _, _)| *p == Priority::Low).unwrap();
        assert_eq!((low.1, low.2), (2, 1));
        let urgent = counts
            .iter()
            .find(|(p, _, _)| *p == Priority::Urgent)
            .unwrap();
        assert_eq!((urgent.1, urgent.2), (1, 0));
        assert!(!counts.iter().any(|(p, _, _)| *p == Priority::High));
    }

    #[tokio::test]
    async fn test_bulk_complete_and_delete() {
        let pool = test_pool().await;
        let (user_id, list_id) = seed(&pool).await;
        let a = seed_task(&pool, "a", list_id, user_id, Priority::Medium, false).await;
        let b = seed_task(&pool, "b", list_id, user_id, Priority::Medium, false).await;

        TaskTable::bulk_set_completed(&pool, &[a, b], true, Utc::now())
            .await
            .unwrap();
        let (total, completed) = TaskTable::counts_for_list(&pool, list_id).await.unwrap();
        assert_eq!((total, completed), (2, 2));

        let task = TaskTable::get(&pool, a).await.unwrap().unwrap();
        assert!(task.completed_at.is_some());

        TaskTable::bulk_delete(&pool, &[a]).await.unwrap();
        let (total, _) = TaskTable::counts_for_list(&pool, list_id).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_ownership_scoping_in_batch_fetch() {
        let pool = test_pool().await;
        let (user_id, list_id) = seed(&pool).await;
        let other = User::new(
            "bob".to_string(),
            "bob@example.com".to_string(),
            "hash".to_string(),
        );
        let other_id = UserTable::insert(&pool, &other).await.unwrap();
        let other_list = TaskList::new("Bob".to_string(), other_id);
        let other_list_id = TaskListTable::insert(&pool, &other_list).await.unwrap();

        let mine = seed_task(&pool, "mine", list_id, user_id, Priority::Medium, false).await;
        let theirs =
            seed_task(&pool, "theirs", other_list_id, other_id, Priority::Medium, false).await;

        let found = TaskTable::get_many_for_user(&pool, user_id, &[mine, theirs])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "mine");
    }
}
