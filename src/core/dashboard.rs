//! Task dashboard aggregation

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{Priority, Task};

/// Per-priority counts of incomplete tasks
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct PriorityBreakdown {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub urgent: i64,
}

/// Summary numbers for one user's tasks
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub incomplete_tasks: i64,
    /// Percentage, rounded to two decimals. Zero when there are no tasks.
    pub completion_rate: f64,
    pub overdue_tasks: i64,
    pub priority_breakdown: PriorityBreakdown,
    /// Tasks created within the last seven days
    pub recent_tasks: i64,
    /// Up to five incomplete tasks due within the next seven days,
    /// soonest first
    pub upcoming_tasks: Vec<Task>,
}

impl DashboardStats {
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let total = tasks.len() as i64;
        let completed = tasks.iter().filter(|t| t.completed).count() as i64;
        let incomplete = total - completed;

        let completion_rate = if total > 0 {
            (completed as f64 / total as f64 * 10000.0).round() / 100.0
        } else {
            0.0
        };

        let overdue = tasks.iter().filter(|t| t.is_overdue_at(now)).count() as i64;

        let mut breakdown = PriorityBreakdown::default();
        for task in tasks.iter().filter(|t| !t.completed) {
            match task.priority {
                Priority::Low => breakdown.low += 1,
                Priority::Medium => breakdown.medium += 1,
                Priority::High => breakdown.high += 1,
                Priority::Urgent => breakdown.urgent += 1,
            }
        }

        let week_ago = now - Duration::days(7);
        let recent = tasks.iter().filter(|t| t.created_at >= week_ago).count() as i64;

        let week_ahead = now + Duration::days(7);
        let mut upcoming: Vec<&Task> = tasks
            .iter()
            .filter(|t| !t.completed)
            .filter(|t| {
                t.due_date
                    .map(|due| due >= now && due <= week_ahead)
                    .unwrap_or(false)
            })
            .collect();
        upcoming.sort_by_key(|t| t.due_date);
        let upcoming_tasks = upcoming.into_iter().take(5).cloned().collect();

        Self {
            total_tasks: total,
            completed_tasks: completed,
            incomplete_tasks: incomplete,
            completion_rate,
            overdue_tasks: overdue,
            priority_breakdown: breakdown,
            recent_tasks: recent,
            upcoming_tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str, priority: Priority, completed: bool) -> Task {
        let mut task = Task::new(title.to_string(), 1, 1);
        task.priority = priority;
        if completed {
            task.toggle_completion();
        }
        task
    }

    #[test]
    fn test_empty_dashboard() {
        let stats = DashboardStats::compute(&[], Utc::now());
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert!(stats.upcoming_tasks.is_empty());
    }

    #[test]
    fn test_completion_rate_rounding() {
        let tasks = vec![
            task("a", Priority::Medium, true),
            task("b", Priority::Medium, false),
            task("c", Priority::Medium, false),
        ];
        let stats = DashboardStats::compute(&tasks, Utc::now());
        assert_eq!(stats.completion_rate, 33.33);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.incomplete_tasks, 2);
    }

    #[test]
    fn test_priority_breakdown_skips_completed() {
        let tasks = vec![
            task("a", Priority::Urgent, false),
            task("b", Priority::Urgent, true),
            task("c", Priority::Low, false),
        ];
        let stats = DashboardStats::compute(&tasks, Utc::now());
        assert_eq!(stats.priority_breakdown.urgent, 1);
        assert_eq!(stats.priority_breakdown.low, 1);
        assert_eq!(stats.priority_breakdown.medium, 0);
    }

    #[test]
    fn test_upcoming_window_and_cap() {
        let now = Utc::now();
        let mut tasks = Vec::new();
        for i in 1..=8 {
            let mut t = task(&format!("due{i}"), Priority::Medium, false);
            t.due_date = Some(now + Duration::days(i % 6 + 1));
            tasks.push(t);
        }
        // outside the window and completed ones are excluded
        let mut far = task("far", Priority::Medium, false);
        far.due_date = Some(now + Duration::days(30));
        tasks.push(far);
        let mut done = task("done", Priority::Medium, true);
        done.due_date = Some(now + Duration::days(2));
        tasks.push(done);

        let stats = DashboardStats::compute(&tasks, now);
        assert_eq!(stats.upcoming_tasks.len(), 5);
        assert!(stats
            .upcoming_tasks
            .windows(2)
            .all(|w| w[0].due_date <= w[1].due_date));
        assert!(stats.upcoming_tasks.iter().all(|t| t.title != "far"));
    }

    #[test]
    fn test_overdue_count() {
        let now = Utc::now();
        let mut late = task("late", Priority::High, false);
        late.due_date = Some(now - Duration::days(1));
        let mut done_late = task("done", Priority::High, true);
        done_late.due_date = Some(now - Duration::days(1));

        let stats = DashboardStats::compute(&[late, done_late], now);
        assert_eq!(stats.overdue_tasks, 1);
    }
}
