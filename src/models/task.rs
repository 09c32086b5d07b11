//! Task model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Priority;

/// A single to-do item belonging to one task list
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Database ID
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Set while completed, cleared on reopen
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Owning list
    pub task_list_id: i64,
    /// Denormalized owner reference
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: String, task_list_id: i64, user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            description: String::new(),
            completed: false,
            priority: Priority::Medium,
            due_date: None,
            completed_at: None,
            task_list_id,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Toggle completion, keeping `completed_at` consistent:
    /// non-null only while completed.
    pub fn toggle_completion(&mut self) {
        self.completed = !self.completed;
        self.completed_at = if self.completed { Some(Utc::now()) } else { None };
        self.updated_at = Utc::now();
    }

    /// A task is overdue when its due date has passed and it is not completed
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) if !self.completed => now > due,
            _ => false,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_at(Utc::now())
    }

    /// Whole days until the due date (negative when past), None without one
    pub fn days_until_due_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.due_date.map(|due| (due - now).num_days())
    }

    pub fn days_until_due(&self) -> Option<i64> {
        self.days_until_due_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_toggle_completion_twice_restores_state() {
        let mut task = Task::new("water plants".into(), 1, 1);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());

        task.toggle_completion();
        assert!(task.completed);
        assert!(task.completed_at.is_some());

        task.toggle_completion();
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_overdue() {
        let now = Utc::now();
        let mut task = Task::new("t".into(), 1, 1);
        assert!(!task.is_overdue_at(now));

        task.due_date = Some(now - Duration::hours(1));
        assert!(task.is_overdue_at(now));

        // completed tasks are never overdue
        task.toggle_completion();
        assert!(!task.is_overdue_at(now));

        task.toggle_completion();
        task.due_date = Some(now + Duration::hours(1));
        assert!(!task.is_overdue_at(now));
    }

    #[test]
    fn test_days_until_due() {
        let now = Utc::now();
        let mut task = Task::new("t".into(), 1, 1);
        assert_eq!(task.days_until_due_at(now), None);

        task.due_date = Some(now + Duration::days(3));
        assert_eq!(task.days_until_due_at(now), Some(3));

        task.due_date = Some(now - Duration::days(2));
        assert_eq!(task.days_until_due_at(now), Some(-2));
    }
}
