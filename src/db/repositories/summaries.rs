use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::{
    db::{
        helpers::{format_datetime, non_empty, parse_datetime},
        Database,
    },
    merge::{combine, merge_summaries},
    models::{window_start, AppUsage, ScopedSummary, TaskKind, TaskUsageSummary},
};

/// Cached projection of one task within one session for a (group, user) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTaskSummary {
    pub id: i64,
    pub group_id: String,
    pub user_name: String,
    pub session_end_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub summary: TaskUsageSummary,
}

impl From<CachedTaskSummary> for ScopedSummary {
    fn from(cached: CachedTaskSummary) -> Self {
        ScopedSummary {
            session_end_time: cached.session_end_time,
            summary: cached.summary,
        }
    }
}

const SUMMARY_COLUMNS: &str = "id, group_id, user_name, reminder_id, task_name, is_completed, start_time, end_time,
     total_seconds, comment, parent_task_name, task_kind, session_end_time, last_updated";

fn row_to_cached(row: &Row) -> Result<CachedTaskSummary> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let session_end_time: String = row.get("session_end_time")?;
    let last_updated: String = row.get("last_updated")?;
    let task_kind: String = row.get("task_kind")?;

    Ok(CachedTaskSummary {
        id: row.get("id")?,
        group_id: row.get("group_id")?,
        user_name: row.get("user_name")?,
        session_end_time: parse_datetime(&session_end_time, "session_end_time")?,
        last_updated: parse_datetime(&last_updated, "last_updated")?,
        summary: TaskUsageSummary {
            reminder_id: row.get("reminder_id")?,
            task_name: row.get("task_name")?,
            is_completed: row.get::<_, i64>("is_completed")? != 0,
            start_time: parse_datetime(&start_time, "start_time")?,
            end_time: parse_datetime(&end_time, "end_time")?,
            total_seconds: row.get("total_seconds")?,
            comment: row.get("comment")?,
            app_breakdown: Vec::new(),
            parent_task_name: row.get("parent_task_name")?,
            kind: TaskKind::from_str_lossy(&task_kind),
        },
    })
}

pub struct SummaryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SummaryRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Inserts or replaces the row for each summary's (group, user, key, session) scope.
    pub fn upsert(
        &self,
        summary: &TaskUsageSummary,
        group_id: &str,
        user_name: &str,
        session_end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let session_end = format_datetime(&session_end_time);
        self.conn.execute(
            "INSERT INTO cached_task_summaries
                (group_id, user_name, identity_key, reminder_id, task_name, is_completed, start_time, end_time,
                 total_seconds, comment, parent_task_name, task_kind, session_end_time, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(group_id, user_name, identity_key, session_end_time) DO UPDATE SET
                 reminder_id = excluded.reminder_id,
                 task_name = excluded.task_name,
                 is_completed = excluded.is_completed,
                 start_time = excluded.start_time,
                 end_time = excluded.end_time,
                 total_seconds = excluded.total_seconds,
                 comment = excluded.comment,
                 parent_task_name = excluded.parent_task_name,
                 task_kind = excluded.task_kind,
                 last_updated = excluded.last_updated",
            params![
                group_id,
                user_name,
                summary.identity_key(),
                summary.reminder_id,
                summary.task_name,
                summary.is_completed as i64,
                format_datetime(&summary.start_time),
                format_datetime(&summary.end_time),
                summary.total_seconds.max(0.0),
                non_empty(&summary.comment),
                non_empty(&summary.parent_task_name),
                summary.kind.as_str(),
                session_end,
                format_datetime(&now),
            ],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM cached_task_summaries
             WHERE group_id = ?1 AND user_name = ?2 AND identity_key = ?3 AND session_end_time = ?4",
            params![group_id, user_name, summary.identity_key(), session_end],
            |row| row.get(0),
        )?;

        self.conn.execute(
            "DELETE FROM cached_app_usage WHERE summary_id = ?1",
            params![id],
        )?;
        let mut insert_app = self.conn.prepare_cached(
            "INSERT INTO cached_app_usage (summary_id, position, app_name, seconds)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (position, usage) in summary.app_breakdown.iter().enumerate() {
            insert_app.execute(params![id, position as i64, usage.name, usage.seconds.max(0.0)])?;
        }

        Ok(id)
    }

    /// Rows for a (group, user) whose task ended at or after `since`.
    pub fn scoped(
        &self,
        group_id: &str,
        user_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CachedTaskSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS}
             FROM cached_task_summaries
             WHERE group_id = ?1 AND user_name = ?2 AND end_time >= ?3
             ORDER BY session_end_time ASC, id ASC"
        ))?;

        let mut rows = stmt.query(params![group_id, user_name, format_datetime(&since)])?;
        let mut cached = Vec::new();
        while let Some(row) = rows.next()? {
            cached.push(row_to_cached(row)?);
        }

        for entry in cached.iter_mut() {
            entry.summary.app_breakdown = self.app_usage(entry.id)?;
        }

        Ok(cached)
    }

    fn app_usage(&self, summary_id: i64) -> Result<Vec<AppUsage>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT app_name, seconds FROM cached_app_usage
             WHERE summary_id = ?1
             ORDER BY position ASC",
        )?;
        let apps = stmt
            .query_map(params![summary_id], |row| {
                Ok(AppUsage {
                    name: row.get(0)?,
                    seconds: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(apps)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM cached_task_summaries", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// Deletes every row beyond `ceiling`, keeping the most recently updated.
    pub fn evict(&self, ceiling: usize) -> Result<usize> {
        if self.count()? <= ceiling {
            return Ok(0);
        }

        let removed = self.conn.execute(
            "DELETE FROM cached_task_summaries
             WHERE id NOT IN (
                 SELECT id FROM cached_task_summaries
                 ORDER BY last_updated DESC, id DESC
                 LIMIT ?1
             )",
            params![ceiling as i64],
        )?;
        Ok(removed)
    }

    pub fn set_completion(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        is_completed: bool,
    ) -> Result<usize> {
        let updated = self.conn.execute(
            "UPDATE cached_task_summaries SET is_completed = ?1
             WHERE group_id = ?2 AND user_name = ?3 AND identity_key = ?4",
            params![is_completed as i64, group_id, user_name, identity_key],
        )?;
        Ok(updated)
    }

    /// Renames a task in every session it appears in.
    ///
    /// Without a reminder id the name is the key, so a row renamed onto a
    /// name already present in the same session is folded into that row.
    pub fn rename(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        new_name: &str,
    ) -> Result<usize> {
        let rows = self.rows_for_key(group_id, user_name, identity_key)?;
        let mut targets = self.rows_for_key(group_id, user_name, new_name)?;

        for row in &rows {
            if !row.summary.reminder_id.is_empty() || identity_key == new_name {
                self.conn.execute(
                    "UPDATE cached_task_summaries SET task_name = ?1 WHERE id = ?2",
                    params![new_name, row.id],
                )?;
                continue;
            }

            match targets
                .iter_mut()
                .find(|target| target.session_end_time == row.session_end_time)
            {
                Some(target) => {
                    let mut renamed = row.summary.clone();
                    renamed.task_name = new_name.to_string();
                    combine(&mut target.summary, &renamed);
                    self.conn.execute(
                        "DELETE FROM cached_task_summaries WHERE id = ?1",
                        params![row.id],
                    )?;
                    self.upsert(
                        &target.summary,
                        group_id,
                        user_name,
                        target.session_end_time,
                        target.last_updated.max(row.last_updated),
                    )?;
                }
                None => {
                    self.conn.execute(
                        "UPDATE cached_task_summaries SET task_name = ?1, identity_key = ?1 WHERE id = ?2",
                        params![new_name, row.id],
                    )?;
                }
            }
        }

        Ok(rows.len())
    }

    fn rows_for_key(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
    ) -> Result<Vec<CachedTaskSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS}
             FROM cached_task_summaries
             WHERE group_id = ?1 AND user_name = ?2 AND identity_key = ?3
             ORDER BY session_end_time ASC, id ASC"
        ))?;

        let mut rows = stmt.query(params![group_id, user_name, identity_key])?;
        let mut cached = Vec::new();
        while let Some(row) = rows.next()? {
            cached.push(row_to_cached(row)?);
        }

        for entry in cached.iter_mut() {
            entry.summary.app_breakdown = self.app_usage(entry.id)?;
        }
        Ok(cached)
    }

    pub fn delete_task(&self, group_id: &str, user_name: &str, identity_key: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM cached_task_summaries
             WHERE group_id = ?1 AND user_name = ?2 AND identity_key = ?3",
            params![group_id, user_name, identity_key],
        )?;
        Ok(removed)
    }

    pub fn clear(&self, group_id: &str, user_name: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM cached_task_summaries WHERE group_id = ?1 AND user_name = ?2",
            params![group_id, user_name],
        )?;
        self.conn.execute(
            "DELETE FROM sync_tokens WHERE group_id = ?1 AND user_name = ?2",
            params![group_id, user_name],
        )?;
        Ok(removed)
    }

    pub fn clear_group(&self, group_id: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM cached_task_summaries WHERE group_id = ?1",
            params![group_id],
        )?;
        self.conn
            .execute("DELETE FROM sync_tokens WHERE group_id = ?1", params![group_id])?;
        Ok(removed)
    }

    pub fn clear_all(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM cached_task_summaries", [])?;
        self.conn.execute("DELETE FROM sync_tokens", [])?;
        Ok(removed)
    }

    pub fn last_updated(&self, group_id: &str, user_name: &str) -> Result<Option<DateTime<Utc>>> {
        let value: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT MAX(last_updated) FROM cached_task_summaries
                 WHERE group_id = ?1 AND user_name = ?2",
                params![group_id, user_name],
                |row| row.get(0),
            )
            .optional()?;
        value
            .flatten()
            .map(|raw| parse_datetime(&raw, "last_updated"))
            .transpose()
    }
}

fn put_in_tx(
    tx: &Transaction<'_>,
    summaries: &[TaskUsageSummary],
    group_id: &str,
    user_name: &str,
    session_end_time: DateTime<Utc>,
    now: DateTime<Utc>,
    ceiling: usize,
) -> Result<usize> {
    let repo = SummaryRepository::new(tx);
    for summary in summaries {
        repo.upsert(summary, group_id, user_name, session_end_time, now)?;
    }
    repo.evict(ceiling)
}

// Database async wrappers for cache operations
impl Database {
    /// Caches one session's summaries, then applies the row ceiling.
    pub async fn put_summaries(
        &self,
        summaries: &[TaskUsageSummary],
        group_id: &str,
        user_name: &str,
        session_end_time: DateTime<Utc>,
    ) -> Result<()> {
        self.put_summaries_at(summaries, group_id, user_name, session_end_time, Utc::now())
            .await
    }

    /// [`Database::put_summaries`] with an explicit `last_updated` stamp.
    pub async fn put_summaries_at(
        &self,
        summaries: &[TaskUsageSummary],
        group_id: &str,
        user_name: &str,
        session_end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // Same task twice in one session collapses into a single row.
        let summaries = merge_summaries(summaries.iter().cloned());
        let group_id = group_id.to_string();
        let user_name = user_name.to_string();
        let ceiling = self.cache_ceiling();

        let evicted = self
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let evicted = put_in_tx(
                    &tx,
                    &summaries,
                    &group_id,
                    &user_name,
                    session_end_time,
                    now,
                    ceiling,
                )?;
                tx.commit()?;
                Ok(evicted)
            })
            .await?;

        if evicted > 0 {
            info!("Cache over ceiling {ceiling}; evicted {evicted} rows");
        }
        Ok(())
    }

    /// Caches several sessions in one transaction.
    pub async fn put_scoped(
        &self,
        scoped: Vec<ScopedSummary>,
        group_id: &str,
        user_name: &str,
    ) -> Result<()> {
        if scoped.is_empty() {
            return Ok(());
        }
        let group_id = group_id.to_string();
        let user_name = user_name.to_string();
        let ceiling = self.cache_ceiling();
        let now = Utc::now();

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            {
                let repo = SummaryRepository::new(&tx);
                for entry in &scoped {
                    repo.upsert(&entry.summary, &group_id, &user_name, entry.session_end_time, now)?;
                }
                let evicted = repo.evict(ceiling)?;
                if evicted > 0 {
                    info!("Cache over ceiling {ceiling}; evicted {evicted} rows");
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Cached summaries for the last `days` days, merged per identity key.
    pub async fn get_summaries(
        &self,
        group_id: &str,
        user_name: &str,
        days: u32,
    ) -> Result<Vec<TaskUsageSummary>> {
        let rows = self.get_scoped_rows(group_id, user_name, days).await?;
        Ok(merge_summaries(rows.into_iter().map(|row| row.summary)))
    }

    /// Unmerged session-scoped rows for the last `days` days.
    pub async fn get_scoped_rows(
        &self,
        group_id: &str,
        user_name: &str,
        days: u32,
    ) -> Result<Vec<CachedTaskSummary>> {
        let since = window_start(days, Local::now());
        let group_id = group_id.to_string();
        let user_name = user_name.to_string();
        self.execute(move |conn| SummaryRepository::new(conn).scoped(&group_id, &user_name, since))
            .await
    }

    pub async fn cached_row_count(&self) -> Result<usize> {
        self.execute(|conn| SummaryRepository::new(conn).count()).await
    }

    pub async fn set_cached_completion(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        is_completed: bool,
    ) -> Result<usize> {
        let (group_id, user_name, key) = owned(group_id, user_name, identity_key);
        self.execute(move |conn| {
            SummaryRepository::new(conn).set_completion(&group_id, &user_name, &key, is_completed)
        })
        .await
    }

    pub async fn rename_cached_task(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        new_name: &str,
    ) -> Result<usize> {
        let (group_id, user_name, key) = owned(group_id, user_name, identity_key);
        let new_name = new_name.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let renamed = SummaryRepository::new(&tx).rename(&group_id, &user_name, &key, &new_name)?;
            tx.commit()?;
            Ok(renamed)
        })
        .await
    }

    pub async fn delete_cached_task(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
    ) -> Result<usize> {
        let (group_id, user_name, key) = owned(group_id, user_name, identity_key);
        self.execute(move |conn| SummaryRepository::new(conn).delete_task(&group_id, &user_name, &key))
            .await
    }

    /// Drops cached rows and sync tokens for one (group, user).
    pub async fn clear_cache(&self, group_id: &str, user_name: &str) -> Result<usize> {
        let group_id = group_id.to_string();
        let user_name = user_name.to_string();
        self.execute(move |conn| SummaryRepository::new(conn).clear(&group_id, &user_name))
            .await
    }

    /// Drops cached rows and sync tokens for every member of a group.
    pub async fn clear_group_cache(&self, group_id: &str) -> Result<usize> {
        let group_id = group_id.to_string();
        self.execute(move |conn| SummaryRepository::new(conn).clear_group(&group_id))
            .await
    }

    pub async fn clear_all_cache(&self) -> Result<usize> {
        self.execute(|conn| SummaryRepository::new(conn).clear_all()).await
    }

    pub async fn cache_last_updated(
        &self,
        group_id: &str,
        user_name: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let group_id = group_id.to_string();
        let user_name = user_name.to_string();
        self.execute(move |conn| SummaryRepository::new(conn).last_updated(&group_id, &user_name))
            .await
    }
}

fn owned(group_id: &str, user_name: &str, key: &str) -> (String, String, String) {
    (group_id.to_string(), user_name.to_string(), key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn open(ceiling: usize) -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("cache.sqlite3"), ceiling).unwrap();
        (dir, db)
    }

    fn summary(id: &str, total: f64, apps: &[(&str, f64)], end: DateTime<Utc>) -> TaskUsageSummary {
        TaskUsageSummary {
            reminder_id: id.into(),
            task_name: format!("Task {id}"),
            is_completed: false,
            start_time: end - Duration::seconds(total as i64),
            end_time: end,
            total_seconds: total,
            comment: None,
            app_breakdown: apps.iter().map(|(n, s)| AppUsage::new(*n, *s)).collect(),
            parent_task_name: None,
            kind: TaskKind::Task,
        }
    }

    #[tokio::test]
    async fn get_merges_sessions_within_window() {
        let (_dir, db) = open(100);
        let now = Utc::now();
        let first_end = now - Duration::minutes(30);

        db.put_summaries(
            &[summary("r1", 120.0, &[("Chrome", 80.0), ("Mail", 40.0)], first_end)],
            "g1",
            "alice",
            first_end,
        )
        .await
        .unwrap();
        db.put_summaries(&[summary("r1", 60.0, &[("Chrome", 60.0)], now)], "g1", "alice", now)
            .await
            .unwrap();
        let old = now - Duration::days(30);
        db.put_summaries(&[summary("r2", 10.0, &[], old)], "g1", "alice", old)
            .await
            .unwrap();
        db.put_summaries(&[summary("r1", 999.0, &[], now)], "g1", "bob", now)
            .await
            .unwrap();

        let merged = db.get_summaries("g1", "alice", 7).await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].total_seconds, 180.0);
        let apps: Vec<(String, f64)> = merged[0]
            .app_breakdown
            .iter()
            .map(|a| (a.name.clone(), a.seconds))
            .collect();
        assert_eq!(apps, vec![("Chrome".into(), 140.0), ("Mail".into(), 40.0)]);

        let again = db.get_summaries("g1", "alice", 7).await.unwrap();
        assert_eq!(merged, again);
    }

    #[tokio::test]
    async fn put_replaces_same_session_scope() {
        let (_dir, db) = open(100);
        let end = Utc::now();

        db.put_summaries(&[summary("r1", 60.0, &[("Mail", 60.0)], end)], "g1", "alice", end)
            .await
            .unwrap();
        db.put_summaries(&[summary("r1", 90.0, &[("Xcode", 90.0)], end)], "g1", "alice", end)
            .await
            .unwrap();

        assert_eq!(db.cached_row_count().await.unwrap(), 1);
        let merged = db.get_summaries("g1", "alice", 1).await.unwrap();
        assert_eq!(merged[0].total_seconds, 90.0);
        assert_eq!(merged[0].app_breakdown, vec![AppUsage::new("Xcode", 90.0)]);
    }

    #[tokio::test]
    async fn eviction_keeps_most_recently_updated() {
        let ceiling = 5;
        let (_dir, db) = open(ceiling);
        let base = Utc::now() - Duration::hours(1);

        for i in 0..8 {
            let end = base + Duration::seconds(i);
            db.put_summaries_at(
                &[summary(&format!("r{i}"), 10.0, &[("Mail", 10.0)], end)],
                "g1",
                "alice",
                end,
                base + Duration::minutes(i),
            )
            .await
            .unwrap();
        }

        assert_eq!(db.cached_row_count().await.unwrap(), ceiling);
        let rows = db.get_scoped_rows("g1", "alice", 2).await.unwrap();
        let mut keys: Vec<String> = rows.iter().map(|r| r.summary.reminder_id.clone()).collect();
        keys.sort();
        assert_eq!(keys, vec!["r3", "r4", "r5", "r6", "r7"]);

        let orphans: i64 = db
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM cached_app_usage
                     WHERE summary_id NOT IN (SELECT id FROM cached_task_summaries)",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn clear_is_scoped_to_group_and_user() {
        let (_dir, db) = open(100);
        let now = Utc::now();
        db.put_summaries(&[summary("r1", 1.0, &[], now)], "g1", "alice", now)
            .await
            .unwrap();
        db.put_summaries(&[summary("r1", 1.0, &[], now)], "g1", "bob", now)
            .await
            .unwrap();

        assert_eq!(db.clear_cache("g1", "alice").await.unwrap(), 1);
        assert!(db.get_summaries("g1", "alice", 1).await.unwrap().is_empty());
        assert_eq!(db.get_summaries("g1", "bob", 1).await.unwrap().len(), 1);

        db.clear_all_cache().await.unwrap();
        assert_eq!(db.cached_row_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rename_onto_existing_name_folds_rows() {
        let (_dir, db) = open(100);
        let end = Utc::now();
        let mut draft = summary("", 60.0, &[("Pages", 60.0)], end);
        draft.task_name = "Draft".into();
        let mut review = summary("", 30.0, &[("Pages", 10.0), ("Mail", 20.0)], end);
        review.task_name = "Review".into();
        db.put_summaries(&[draft, review], "g1", "alice", end).await.unwrap();

        assert_eq!(db.rename_cached_task("g1", "alice", "Draft", "Review").await.unwrap(), 1);

        assert_eq!(db.cached_row_count().await.unwrap(), 1);
        let merged = db.get_summaries("g1", "alice", 2).await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].task_name, "Review");
        assert_eq!(merged[0].total_seconds, 90.0);
        assert_eq!(
            merged[0].app_breakdown,
            vec![AppUsage::new("Pages", 70.0), AppUsage::new("Mail", 20.0)]
        );
    }

    #[tokio::test]
    async fn task_edits_apply_to_every_session_row() {
        let (_dir, db) = open(100);
        let now = Utc::now();
        let earlier = now - Duration::minutes(5);
        db.put_summaries(&[summary("r1", 1.0, &[], earlier)], "g1", "alice", earlier)
            .await
            .unwrap();
        db.put_summaries(&[summary("r1", 1.0, &[], now)], "g1", "alice", now)
            .await
            .unwrap();

        assert_eq!(db.set_cached_completion("g1", "alice", "r1", true).await.unwrap(), 2);
        assert_eq!(db.rename_cached_task("g1", "alice", "r1", "Renamed").await.unwrap(), 2);
        let merged = db.get_summaries("g1", "alice", 2).await.unwrap();
        assert!(merged[0].is_completed);
        assert_eq!(merged[0].task_name, "Renamed");

        assert_eq!(db.delete_cached_task("g1", "alice", "r1").await.unwrap(), 2);
        assert!(db.get_summaries("g1", "alice", 2).await.unwrap().is_empty());
    }
}
