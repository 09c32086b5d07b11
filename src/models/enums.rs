//! Shared enums for tasks and bulk operations

use serde::{Deserialize, Serialize};

/// Task priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }

    /// Sort weight, higher is more important
    pub fn weight(&self) -> i32 {
        match self {
            Priority::Urgent => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    /// Display color for the frontend
    pub fn color(&self) -> &'static str {
        match self {
            Priority::Low => "#4caf50",
            Priority::Medium => "#ff9800",
            Priority::High => "#f44336",
            Priority::Urgent => "#9c27b0",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }

    pub fn all() -> [Priority; 4] {
        [
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Urgent,
        ]
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Operations accepted by the bulk task endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperation {
    Complete,
    Incomplete,
    Delete,
    Move,
}

impl BulkOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOperation::Complete => "complete",
            BulkOperation::Incomplete => "incomplete",
            BulkOperation::Delete => "delete",
            BulkOperation::Move => "move",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_roundtrip() {
        for p in Priority::all() {
            assert_eq!(Priority::from_str(p.as_str()), Some(p));
        }
        assert_eq!(Priority::from_str("URGENT"), Some(Priority::Urgent));
        assert_eq!(Priority::from_str("nope"), None);
    }

    #[test]
    fn test_priority_weights() {
        assert!(Priority::Urgent.weight() > Priority::High.weight());
        assert!(Priority::High.weight() > Priority::Medium.weight());
        assert!(Priority::Medium.weight() > Priority::Low.weight());
    }
}
