//! Conversion between usage models and portable remote records.
//!
//! A session is stored as one `WorkSession` record, one `TaskUsage` record per
//! task and one `AppUsage` record per application within a task.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::store::{FieldValue, Record, RecordId};
use crate::{
    merge::{combine, merge_summaries},
    models::{
        AppUsage, GroupInfo, MemberRecord, ScopedSummary, SessionRecord, TaskKind,
        TaskUsageSummary,
    },
};

pub const WORK_SESSION: &str = "WorkSession";
pub const TASK_USAGE: &str = "TaskUsage";
pub const APP_USAGE: &str = "AppUsage";
pub const GROUP: &str = "Group";
pub const MEMBER: &str = "Member";

/// Record types holding a member's usage data.
pub const USAGE_TYPES: [&str; 3] = [WORK_SESSION, TASK_USAGE, APP_USAGE];

pub mod fields {
    pub const GROUP_ID: &str = "groupID";
    pub const USER_NAME: &str = "userName";
    pub const GROUP_NAME: &str = "groupName";
    pub const OWNER_NAME: &str = "ownerName";
    pub const CREATED_AT: &str = "createdAt";
    pub const END_TIME: &str = "endTime";
    pub const START_TIME: &str = "startTime";
    pub const SESSION_END_TIME: &str = "sessionEndTime";
    pub const SESSION_REF: &str = "session";
    pub const TASK_REF: &str = "task";
    pub const COMPLETED_COUNT: &str = "completedCount";
    pub const REMINDER_ID: &str = "reminderId";
    pub const IDENTITY_KEY: &str = "identityKey";
    pub const TASK_NAME: &str = "taskName";
    pub const IS_COMPLETED: &str = "isCompleted";
    pub const TOTAL_SECONDS: &str = "totalSeconds";
    pub const COMMENT: &str = "comment";
    pub const PARENT_TASK_NAME: &str = "parentTaskName";
    pub const TASK_KIND: &str = "taskKind";
    pub const APP_NAME: &str = "appName";
    pub const SECONDS: &str = "seconds";
    pub const POSITION: &str = "position";
}

use fields::*;

/// Flattens a session into records ready for a batched save.
///
/// Record ids derive from the member, the session end and the task key, so
/// retrying a partially committed session overwrites instead of duplicating.
pub fn session_to_records(group_id: &str, user_name: &str, session: &SessionRecord) -> Vec<Record> {
    let session_id = RecordId::new(format!(
        "{group_id}:{user_name}:{}",
        session.end_time.timestamp_micros()
    ));
    let mut records = vec![Record::new(WORK_SESSION, session_id.clone())
        .with(GROUP_ID, group_id)
        .with(USER_NAME, user_name)
        .with(END_TIME, session.end_time)
        .with(COMPLETED_COUNT, FieldValue::Int(session.completed_count))];

    for summary in merge_summaries(session.task_summaries.iter().cloned()) {
        let task_id = RecordId::new(format!("{session_id}:{}", summary.identity_key()));
        let mut task = Record::new(TASK_USAGE, task_id.clone())
            .with(GROUP_ID, group_id)
            .with(USER_NAME, user_name)
            .with(SESSION_REF, session_id.clone())
            .with(SESSION_END_TIME, session.end_time)
            .with(REMINDER_ID, summary.reminder_id.as_str())
            .with(IDENTITY_KEY, summary.identity_key())
            .with(TASK_NAME, summary.task_name.as_str())
            .with(IS_COMPLETED, FieldValue::Bool(summary.is_completed))
            .with(START_TIME, summary.start_time)
            .with(END_TIME, summary.end_time)
            .with(TOTAL_SECONDS, FieldValue::Double(summary.total_seconds))
            .with(TASK_KIND, summary.kind.as_str());
        if let Some(comment) = summary.comment.as_ref().filter(|c| !c.is_empty()) {
            task.set(COMMENT, comment.as_str());
        }
        if let Some(parent) = summary.parent_task_name.as_ref().filter(|p| !p.is_empty()) {
            task.set(PARENT_TASK_NAME, parent.as_str());
        }
        records.push(task);

        for (position, usage) in summary.app_breakdown.iter().enumerate() {
            records.push(
                Record::new(APP_USAGE, RecordId::new(format!("{task_id}:{position}")))
                    .with(GROUP_ID, group_id)
                    .with(USER_NAME, user_name)
                    .with(TASK_REF, task_id.clone())
                    .with(END_TIME, summary.end_time)
                    .with(APP_NAME, usage.name.as_str())
                    .with(SECONDS, FieldValue::Double(usage.seconds))
                    .with(POSITION, FieldValue::Int(position as i64)),
            );
        }
    }

    records
}

/// Rebuilds session-scoped summaries from raw task and app records.
///
/// App records whose task is not in `tasks` are ignored. Records with missing
/// fields read as empty values rather than failing.
pub fn records_to_scoped(tasks: &[Record], apps: &[Record]) -> Vec<ScopedSummary> {
    let mut apps_by_task: HashMap<RecordId, Vec<(i64, AppUsage)>> = HashMap::new();
    for app in apps {
        if let Some(task_ref) = app.reference(TASK_REF) {
            apps_by_task.entry(task_ref).or_default().push((
                app.int(POSITION),
                AppUsage::new(app.string(APP_NAME), app.double(SECONDS)),
            ));
        }
    }

    let mut scoped: HashMap<(String, i64), ScopedSummary> = HashMap::new();
    for task in tasks {
        let Some(end_time) = task.date(END_TIME) else {
            continue;
        };
        let session_end_time = task.date(SESSION_END_TIME).unwrap_or(end_time);

        let mut app_breakdown = apps_by_task.remove(&task.id).unwrap_or_default();
        app_breakdown.sort_by_key(|(position, _)| *position);

        let summary = TaskUsageSummary {
            reminder_id: task.string(REMINDER_ID),
            task_name: task.string(TASK_NAME),
            is_completed: task.bool(IS_COMPLETED),
            start_time: task.date(START_TIME).unwrap_or(end_time),
            end_time,
            total_seconds: task.double(TOTAL_SECONDS).max(0.0),
            comment: task.optional_string(COMMENT),
            app_breakdown: app_breakdown.into_iter().map(|(_, usage)| usage).collect(),
            parent_task_name: task.optional_string(PARENT_TASK_NAME),
            kind: TaskKind::from_str_lossy(&task.string(TASK_KIND)),
        };

        let key = (
            summary.identity_key().to_string(),
            session_end_time.timestamp_micros(),
        );
        match scoped.get_mut(&key) {
            Some(existing) => combine(&mut existing.summary, &summary),
            None => {
                scoped.insert(
                    key,
                    ScopedSummary {
                        session_end_time,
                        summary,
                    },
                );
            }
        }
    }

    let mut result: Vec<ScopedSummary> = scoped.into_values().collect();
    result.sort_by(|a, b| {
        a.session_end_time
            .cmp(&b.session_end_time)
            .then_with(|| a.summary.identity_key().cmp(b.summary.identity_key()))
    });
    result
}

pub fn group_record(group_id: &str, group_name: &str, owner_name: &str, now: DateTime<Utc>) -> Record {
    Record::new(GROUP, RecordId::new(group_id))
        .with(GROUP_ID, group_id)
        .with(GROUP_NAME, group_name)
        .with(OWNER_NAME, owner_name)
        .with(CREATED_AT, now)
}

pub fn group_from_record(record: &Record) -> GroupInfo {
    GroupInfo {
        group_name: record.string(GROUP_NAME),
        owner_name: record.string(OWNER_NAME),
        record_id: record.id.to_string(),
    }
}

pub fn member_record(group_id: &str, user_name: &str, now: DateTime<Utc>) -> Record {
    Record::new(MEMBER, RecordId::generate())
        .with(GROUP_ID, group_id)
        .with(USER_NAME, user_name)
        .with(CREATED_AT, now)
}

pub fn member_from_record(record: &Record) -> MemberRecord {
    MemberRecord {
        member_id: record.id.to_string(),
        user_name: record.string(USER_NAME),
        group_id: record.string(GROUP_ID),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session() -> SessionRecord {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let summary = TaskUsageSummary {
            reminder_id: "r1".into(),
            task_name: "Review".into(),
            is_completed: true,
            start_time: end - chrono::Duration::minutes(2),
            end_time: end,
            total_seconds: 120.0,
            comment: Some("done".into()),
            app_breakdown: vec![AppUsage::new("Chrome", 80.0), AppUsage::new("Mail", 40.0)],
            parent_task_name: None,
            kind: TaskKind::Task,
        };
        let grouping = TaskUsageSummary {
            reminder_id: String::new(),
            task_name: "Q2 Goals".into(),
            is_completed: false,
            start_time: end,
            end_time: end,
            total_seconds: 0.0,
            comment: None,
            app_breakdown: Vec::new(),
            parent_task_name: None,
            kind: TaskKind::Group,
        };
        SessionRecord::new(end, vec![summary, grouping])
    }

    #[test]
    fn session_flattens_into_typed_records() {
        let records = session_to_records("g1", "alice", &session());
        let count = |t: &str| records.iter().filter(|r| r.record_type == t).count();
        assert_eq!(count(WORK_SESSION), 1);
        assert_eq!(count(TASK_USAGE), 2);
        assert_eq!(count(APP_USAGE), 2);
        assert_eq!(records[0].int(COMPLETED_COUNT), 1);
        assert!(records.iter().all(|r| r.string(GROUP_ID) == "g1"));

        let again = session_to_records("g1", "alice", &session());
        let ids = |rs: &[Record]| rs.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&records), ids(&again));
    }

    #[test]
    fn records_rebuild_the_session() {
        let original = session();
        let records = session_to_records("g1", "alice", &original);
        let tasks: Vec<Record> = records.iter().filter(|r| r.record_type == TASK_USAGE).cloned().collect();
        let apps: Vec<Record> = records.iter().filter(|r| r.record_type == APP_USAGE).cloned().collect();

        let scoped = records_to_scoped(&tasks, &apps);
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|s| s.session_end_time == original.end_time));

        let review = scoped
            .iter()
            .find(|s| s.summary.identity_key() == "r1")
            .unwrap();
        assert_eq!(review.summary.app_breakdown, original.task_summaries[0].app_breakdown);
        assert_eq!(review.summary.comment.as_deref(), Some("done"));

        let grouping = scoped
            .iter()
            .find(|s| s.summary.identity_key() == "Q2 Goals")
            .unwrap();
        assert_eq!(grouping.summary.kind, TaskKind::Group);
    }

    #[test]
    fn orphan_app_records_and_undated_tasks_are_skipped() {
        let orphan = Record::new(APP_USAGE, RecordId::new("a1"))
            .with(TASK_REF, RecordId::new("missing"))
            .with(APP_NAME, "Slack");
        let undated = Record::new(TASK_USAGE, RecordId::new("t1")).with(TASK_NAME, "No time");
        assert!(records_to_scoped(&[undated], &[orphan]).is_empty());
    }
}
