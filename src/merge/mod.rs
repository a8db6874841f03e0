//! Collapses summaries of the same logical task into one per identity key.
//!
//! Combination rules are sums for time, OR for completion, min/max for the
//! interval and first-non-empty for text. Inputs are folded in a canonical
//! order so the result never depends on how callers ordered or batched them.

use std::collections::{BTreeMap, HashMap};

use crate::models::{AppUsage, ScopedSummary, TaskUsageSummary};

/// Combines `incoming` into `existing`. Both must share an identity key.
pub fn combine(existing: &mut TaskUsageSummary, incoming: &TaskUsageSummary) {
    existing.total_seconds += incoming.total_seconds;
    existing.app_breakdown = merge_app_breakdown(&existing.app_breakdown, &incoming.app_breakdown);
    existing.is_completed |= incoming.is_completed;

    if existing.comment.as_deref().map_or(true, str::is_empty) {
        if let Some(comment) = incoming.comment.as_ref().filter(|c| !c.is_empty()) {
            existing.comment = Some(comment.clone());
        }
    }
    if existing.parent_task_name.as_deref().map_or(true, str::is_empty) {
        if let Some(parent) = incoming.parent_task_name.as_ref().filter(|p| !p.is_empty()) {
            existing.parent_task_name = Some(parent.clone());
        }
    }
    if existing.reminder_id.is_empty() && !incoming.reminder_id.is_empty() {
        existing.reminder_id = incoming.reminder_id.clone();
    }

    existing.start_time = existing.start_time.min(incoming.start_time);
    existing.end_time = existing.end_time.max(incoming.end_time);
    existing.kind = existing.kind.max(incoming.kind);
}

/// Pure function form of [`combine`].
pub fn merged(a: &TaskUsageSummary, b: &TaskUsageSummary) -> TaskUsageSummary {
    let mut result = a.clone();
    combine(&mut result, b);
    result
}

/// Per-application sum of seconds, largest first with ties broken by name.
pub fn merge_app_breakdown(a: &[AppUsage], b: &[AppUsage]) -> Vec<AppUsage> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for usage in a.iter().chain(b.iter()) {
        *totals.entry(usage.name.as_str()).or_insert(0.0) += usage.seconds;
    }

    let mut flattened: Vec<AppUsage> = totals
        .into_iter()
        .map(|(name, seconds)| AppUsage {
            name: name.to_string(),
            seconds,
        })
        .collect();
    flattened.sort_by(|x, y| {
        y.seconds
            .total_cmp(&x.seconds)
            .then_with(|| x.name.cmp(&y.name))
    });
    flattened
}

/// Merges any number of summaries into one per identity key.
///
/// Output is ordered by most recent `end_time`, then identity key.
pub fn merge_summaries<I>(summaries: I) -> Vec<TaskUsageSummary>
where
    I: IntoIterator<Item = TaskUsageSummary>,
{
    let mut inputs: Vec<TaskUsageSummary> = summaries.into_iter().collect();
    inputs.sort_by(canonical_order);

    let mut by_key: HashMap<String, TaskUsageSummary> = HashMap::new();
    for summary in inputs {
        match by_key.get_mut(summary.identity_key()) {
            Some(existing) => combine(existing, &summary),
            None => {
                by_key.insert(summary.identity_key().to_string(), summary);
            }
        }
    }

    let mut result: Vec<TaskUsageSummary> = by_key.into_values().collect();
    result.sort_by(|a, b| {
        b.end_time
            .cmp(&a.end_time)
            .then_with(|| a.identity_key().cmp(b.identity_key()))
    });
    result
}

/// Unions two session-scoped result sets and merges them.
///
/// A summary present on both sides for the same session is counted once, the
/// `fresh` copy winning, so cache rows that mirror remote records are not
/// double-counted.
pub fn union_sessions(cached: Vec<ScopedSummary>, fresh: Vec<ScopedSummary>) -> Vec<TaskUsageSummary> {
    let mut scoped: HashMap<(String, i64), TaskUsageSummary> = HashMap::new();
    for entry in cached.into_iter().chain(fresh) {
        let key = (
            entry.summary.identity_key().to_string(),
            entry.session_end_time.timestamp_micros(),
        );
        scoped.insert(key, entry.summary);
    }
    merge_summaries(scoped.into_values())
}

/// Number of distinct completed tasks in a merged result.
pub fn completed_count(summaries: &[TaskUsageSummary]) -> usize {
    summaries.iter().filter(|s| s.is_completed).count()
}

fn canonical_order(a: &TaskUsageSummary, b: &TaskUsageSummary) -> std::cmp::Ordering {
    a.identity_key()
        .cmp(b.identity_key())
        .then_with(|| a.start_time.cmp(&b.start_time))
        .then_with(|| a.end_time.cmp(&b.end_time))
        .then_with(|| a.total_seconds.total_cmp(&b.total_seconds))
        .then_with(|| a.comment.cmp(&b.comment))
        .then_with(|| a.parent_task_name.cmp(&b.parent_task_name))
}
