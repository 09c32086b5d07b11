//! Task list model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIST_COLOR: &str = "#1976d2";

/// A named collection of tasks owned by one user.
///
/// Titles are unique per user, and a user must always retain at least one
/// non-archived list.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskList {
    /// Database ID
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Hex display color
    #[serde(default = "default_color")]
    pub color: String,
    pub user_id: i64,
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_color() -> String {
    DEFAULT_LIST_COLOR.to_string()
}

impl TaskList {
    pub fn new(title: String, user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            description: String::new(),
            color: DEFAULT_LIST_COLOR.to_string(),
            user_id,
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The list every new user starts with
    pub fn default_for_user(user_id: i64) -> Self {
        let mut list = Self::new("My Tasks".to_string(), user_id);
        list.description = "Default task list".to_string();
        list
    }
}
