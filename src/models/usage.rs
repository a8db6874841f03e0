//! Usage data models.
//!
//! A `SessionRecord` is produced by one "finish work" action and carries one
//! `TaskUsageSummary` per task touched during the session.

use chrono::{DateTime, Duration, Local, LocalResult, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Time a single application held foreground focus within a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppUsage {
    pub name: String,
    pub seconds: f64,
}

impl AppUsage {
    pub fn new(name: impl Into<String>, seconds: f64) -> Self {
        Self {
            name: name.into(),
            seconds: seconds.max(0.0),
        }
    }
}

/// Whether a task is a leaf task or a grouping task that only parents others.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Task,
    Group,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Task => "task",
            TaskKind::Group => "group",
        }
    }

    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "group" => TaskKind::Group,
            _ => TaskKind::Task,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUsageSummary {
    #[serde(default)]
    pub reminder_id: String,
    pub task_name: String,
    #[serde(default)]
    pub is_completed: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_seconds: f64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub app_breakdown: Vec<AppUsage>,
    #[serde(default)]
    pub parent_task_name: Option<String>,
    #[serde(default)]
    pub kind: TaskKind,
}

impl TaskUsageSummary {
    /// `reminder_id` when set, otherwise the task name.
    pub fn identity_key(&self) -> &str {
        if self.reminder_id.is_empty() {
            &self.task_name
        } else {
            &self.reminder_id
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == TaskKind::Group
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub end_time: DateTime<Utc>,
    pub completed_count: i64,
    pub task_summaries: Vec<TaskUsageSummary>,
}

impl SessionRecord {
    /// Builds a session, counting completed summaries at creation time.
    pub fn new(end_time: DateTime<Utc>, task_summaries: Vec<TaskUsageSummary>) -> Self {
        let completed_count = task_summaries.iter().filter(|s| s.is_completed).count() as i64;
        Self {
            end_time,
            completed_count,
            task_summaries,
        }
    }
}

/// Summary together with the end time of the session that produced it.
///
/// This is the granularity at which the cache stores rows and at which remote
/// task records are read back, so the same session seen from both sides can be
/// de-duplicated before summing.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedSummary {
    pub session_end_time: DateTime<Utc>,
    pub summary: TaskUsageSummary,
}

/// Start of the read window: local midnight `days - 1` days before `now`.
///
/// A window of 0 or 1 days both mean "today".
pub fn window_start(days: u32, now: DateTime<Local>) -> DateTime<Utc> {
    let back = i64::from(days.max(1) - 1);
    let first_day = now.date_naive() - Duration::days(back);
    let midnight = first_day.and_hms_opt(0, 0, 0).unwrap_or_default();
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to treating it as UTC.
        LocalResult::None => midnight.and_utc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(reminder_id: &str, task_name: &str, completed: bool) -> TaskUsageSummary {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        TaskUsageSummary {
            reminder_id: reminder_id.into(),
            task_name: task_name.into(),
            is_completed: completed,
            start_time: t,
            end_time: t,
            total_seconds: 0.0,
            comment: None,
            app_breakdown: Vec::new(),
            parent_task_name: None,
            kind: TaskKind::Task,
        }
    }

    #[test]
    fn identity_key_falls_back_to_task_name() {
        assert_eq!(summary("r1", "Write docs", false).identity_key(), "r1");
        assert_eq!(summary("", "Write docs", false).identity_key(), "Write docs");
    }

    #[test]
    fn completed_count_is_fixed_at_creation() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut session = SessionRecord::new(
            end,
            vec![summary("a", "A", true), summary("b", "B", false), summary("c", "C", true)],
        );
        assert_eq!(session.completed_count, 2);

        session.task_summaries[1].is_completed = true;
        assert_eq!(session.completed_count, 2);
    }

    #[test]
    fn missing_optional_fields_default_on_decode() {
        let json = r#"{
            "taskName": "Plan",
            "startTime": "2024-03-01T09:00:00Z",
            "endTime": "2024-03-01T09:30:00Z",
            "totalSeconds": 1800.0
        }"#;
        let decoded: TaskUsageSummary = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.reminder_id, "");
        assert!(decoded.app_breakdown.is_empty());
        assert_eq!(decoded.kind, TaskKind::Task);
        assert!(!decoded.is_completed);
    }

    #[test]
    fn window_covers_whole_days() {
        let now = Local::now();
        let today = window_start(1, now);
        assert_eq!(today, window_start(0, now));
        assert!(today <= now.with_timezone(&Utc));
        assert!(now.with_timezone(&Utc) - today < Duration::hours(26));

        let week = window_start(7, now);
        let span = today - week;
        assert!(span >= Duration::hours(143) && span <= Duration::hours(145));
    }

    #[test]
    fn negative_app_seconds_are_clamped() {
        assert_eq!(AppUsage::new("Mail", -3.0).seconds, 0.0);
    }
}
