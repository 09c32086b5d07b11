//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Database ID
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (not serialized to JSON)
    #[serde(skip_serializing)]
    pub password: String,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Admin flag
    #[serde(default)]
    pub is_admin: bool,
    /// Active flag; deactivated accounts cannot log in
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Create a new regular user
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: 0,
            username,
            email,
            password: password_hash,
            first_name: String::new(),
            last_name: String::new(),
            avatar_url: None,
            is_admin: false,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_not_serialized() {
        let user = User::new("ana".into(), "ana@example.com".into(), "hash".into());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "ana");
    }
}
