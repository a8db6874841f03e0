use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::SyncServices;
use crate::{
    error::{Result, SyncError},
    merge::{completed_count, merge_summaries, union_sessions},
    models::{window_start, CreatedGroup, ScopedSummary, SessionRecord, TaskUsageSummary},
    pending::FlushReport,
    reachability::ReachabilityEvent,
    remote::{gateway::group_zone, SessionUploader},
    settings::{SharedZone, WriteAccess},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Queued,
}

/// Entry point for callers: uploads, reads and group lifecycle.
#[derive(Clone)]
pub struct SyncOrchestrator {
    services: Arc<SyncServices>,
}

impl SyncOrchestrator {
    pub fn new(services: SyncServices) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &SyncServices {
        &self.services
    }

    /// Sends the session now when the store is reachable and writable,
    /// otherwise queues it.
    ///
    /// Offline writes are deferred silently. A backend rejection while online
    /// is returned once, after the session has been queued for retry.
    pub async fn upload_session(
        &self,
        group_id: &str,
        user_name: &str,
        session: SessionRecord,
    ) -> Result<UploadOutcome> {
        let services = &self.services;

        // Reads see the session right away, uploaded or not.
        if let Err(err) = services
            .cache
            .put_summaries(&session.task_summaries, group_id, user_name, session.end_time)
            .await
        {
            log_warn!("Failed to cache session for {user_name} in {group_id}: {err:?}");
        }

        let route = services.gateway.resolve_route();
        if !services.reachability.is_reachable() || !route.writable {
            log_debug!(
                "Queueing session (reachable: {}, writable: {})",
                services.reachability.is_reachable(),
                route.writable
            );
            services.pending.enqueue(group_id, user_name, session).await?;
            return Ok(UploadOutcome::Queued);
        }

        match services
            .gateway
            .save_session_directly(group_id, user_name, &session)
            .await
        {
            Ok(()) => {
                log_info!("Uploaded session for {user_name} in {group_id}");
                Ok(UploadOutcome::Uploaded)
            }
            Err(SyncError::Network(reason)) => {
                log_warn!("Upload deferred for {user_name} in {group_id}: {reason}");
                services.pending.enqueue(group_id, user_name, session).await?;
                Ok(UploadOutcome::Queued)
            }
            Err(err) => {
                log_error!("Upload rejected for {user_name} in {group_id}: {err}");
                services.pending.enqueue(group_id, user_name, session).await?;
                Err(err)
            }
        }
    }

    /// Merged summaries for the last `days` days and how many are completed.
    ///
    /// Remote failures degrade to the cached view without an error.
    pub async fn fetch_summaries(
        &self,
        group_id: &str,
        user_name: &str,
        days: u32,
    ) -> Result<(Vec<TaskUsageSummary>, usize)> {
        let services = &self.services;
        let cached = self.cached_scoped(group_id, user_name, days).await;
        let since = window_start(days, Local::now());

        let summaries = match services
            .gateway
            .fetch_scoped_summaries(group_id, user_name, since)
            .await
        {
            Ok(fresh) => {
                let refreshed = match services
                    .cache
                    .put_scoped(fresh.clone(), group_id, user_name)
                    .await
                {
                    Ok(()) => {
                        let token = Utc::now().to_rfc3339();
                        if let Err(err) = services.cache.set_sync_token(group_id, user_name, &token).await {
                            log_warn!("Failed to record sync token for {user_name}: {err:?}");
                        }
                        self.cached_scoped(group_id, user_name, days).await
                    }
                    Err(err) => {
                        log_warn!("Failed to cache fetched summaries for {user_name}: {err:?}");
                        cached
                    }
                };
                union_sessions(refreshed, fresh)
            }
            Err(err) => {
                log_warn!("Remote fetch for {user_name} in {group_id} failed; serving cache: {err}");
                merge_summaries(cached.into_iter().map(|row| row.summary))
            }
        };

        let completed = completed_count(&summaries);
        Ok((summaries, completed))
    }

    async fn cached_scoped(&self, group_id: &str, user_name: &str, days: u32) -> Vec<ScopedSummary> {
        match self
            .services
            .cache
            .get_scoped_rows(group_id, user_name, days)
            .await
        {
            Ok(rows) => rows.into_iter().map(ScopedSummary::from).collect(),
            Err(err) => {
                log_warn!("Cache read for {user_name} in {group_id} failed: {err:?}");
                Vec::new()
            }
        }
    }

    pub async fn flush_pending(&self) -> Result<FlushReport> {
        let report = self
            .services
            .pending
            .flush(&self.services.gateway)
            .await?;
        if let Some(summary) = report.summary() {
            log_warn!("{summary}");
        }
        Ok(report)
    }

    /// Flushes the queue on a transition to reachable. Other transitions do
    /// nothing.
    pub async fn handle_reachability_event(
        &self,
        event: ReachabilityEvent,
    ) -> Result<Option<FlushReport>> {
        match event {
            ReachabilityEvent::BecameReachable => self.flush_pending().await.map(Some),
            ReachabilityEvent::BecameUnreachable => Ok(None),
        }
    }

    /// Background task reacting to reachability transitions until cancelled.
    pub fn spawn_reconnect_listener(&self, cancel_token: CancellationToken) -> JoinHandle<()> {
        let orchestrator = self.clone();
        let mut events = self.services.reachability.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = events.recv() => {
                        let event = match received {
                            Ok(event) => event,
                            // Missed edges; flush if we ended up online.
                            Err(RecvError::Lagged(skipped)) => {
                                log_warn!("Reconnect listener skipped {skipped} events");
                                if !orchestrator.services.reachability.is_reachable() {
                                    continue;
                                }
                                ReachabilityEvent::BecameReachable
                            }
                            Err(RecvError::Closed) => break,
                        };
                        if let Err(err) = orchestrator.handle_reachability_event(event).await {
                            log_error!("Flush after reconnect failed: {err}");
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        log_info!("reconnect listener shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Member id for the pair. Falls back to a locally minted id when the
    /// store refuses the registration write.
    pub async fn ensure_member_registered(&self, group_id: &str, user_name: &str) -> Result<String> {
        match self
            .services
            .gateway
            .ensure_member_registered(group_id, user_name)
            .await
        {
            Ok(member_id) => Ok(member_id),
            Err(SyncError::Permission(reason)) => {
                log_warn!("Member registration not permitted ({reason}); using local id");
                self.local_member_id(group_id)
            }
            Err(err) => Err(err),
        }
    }

    fn local_member_id(&self, group_id: &str) -> Result<String> {
        let settings = &self.services.settings;
        if let Some(existing) = settings.snapshot().local_member_ids.get(group_id) {
            return Ok(existing.clone());
        }

        let member_id = format!("local-{}", Uuid::new_v4());
        let stored = member_id.clone();
        let group_id = group_id.to_string();
        settings.update(move |s| {
            s.local_member_ids.insert(group_id, stored);
        })?;
        Ok(member_id)
    }

    /// Creates a group owned by `owner_name` and switches into it.
    pub async fn create_group(&self, owner_name: &str, group_name: &str) -> Result<CreatedGroup> {
        let created = self.services.gateway.create_group(owner_name, group_name).await?;
        self.enter_group(
            &created.group_id,
            owner_name,
            SharedZone {
                name: group_zone(&created.group_id, owner_name).name,
                owner: owner_name.to_string(),
            },
            WriteAccess::ReadWrite,
        )?;
        Ok(created)
    }

    /// Switches into an existing shared group and registers the user.
    pub async fn join_group(
        &self,
        group_id: &str,
        user_name: &str,
        zone: SharedZone,
        access: WriteAccess,
    ) -> Result<String> {
        self.enter_group(group_id, user_name, zone, access)?;
        self.ensure_member_registered(group_id, user_name).await
    }

    fn enter_group(
        &self,
        group_id: &str,
        user_name: &str,
        zone: SharedZone,
        access: WriteAccess,
    ) -> Result<()> {
        let settings = &self.services.settings;
        settings.join_group(group_id, Some(zone))?;
        let user_name = user_name.to_string();
        settings.update(move |s| {
            s.user_name = Some(user_name);
            s.write_access = access;
        })?;
        Ok(())
    }

    /// Removes the user's remote data and local state for the group.
    ///
    /// Local state is cleared even when the remote delete fails; that error
    /// is returned afterwards.
    pub async fn leave_group(&self, group_id: &str, user_name: &str) -> Result<()> {
        let services = &self.services;
        let remote = services.gateway.delete_user_data(group_id, user_name).await;

        services.cache.clear_cache(group_id, user_name).await?;
        services.pending.clear_group(group_id).await?;
        if services.settings.current_group_id().as_deref() == Some(group_id) {
            services.settings.leave_group()?;
        }

        match remote {
            Ok(count) => {
                log_info!("{user_name} left group {group_id}; removed {count} records");
                Ok(())
            }
            Err(err) => {
                log_warn!("{user_name} left group {group_id} locally; remote cleanup failed: {err}");
                Err(err)
            }
        }
    }

    pub async fn delete_group_if_owner(&self, group_id: &str, requester: &str) -> Result<bool> {
        let services = &self.services;
        if !services
            .gateway
            .delete_group_if_owner(group_id, requester)
            .await?
        {
            return Ok(false);
        }

        services.cache.clear_group_cache(group_id).await?;
        services.pending.clear_group(group_id).await?;
        if services.settings.current_group_id().as_deref() == Some(group_id) {
            services.settings.leave_group()?;
        }
        Ok(true)
    }

    /// Applies the change to the cache, the queued sessions and then the
    /// remote records.
    pub async fn update_task_completion(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        is_completed: bool,
    ) -> Result<()> {
        let services = &self.services;
        services
            .cache
            .set_cached_completion(group_id, user_name, identity_key, is_completed)
            .await?;
        services
            .pending
            .edit_tasks(group_id, user_name, identity_key, |summary| {
                summary.is_completed = is_completed;
            })
            .await?;
        services
            .gateway
            .update_task_completion(group_id, user_name, identity_key, is_completed)
            .await?;
        Ok(())
    }

    pub async fn update_task_name(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        new_name: &str,
    ) -> Result<()> {
        let services = &self.services;
        services
            .cache
            .rename_cached_task(group_id, user_name, identity_key, new_name)
            .await?;
        services
            .pending
            .edit_tasks(group_id, user_name, identity_key, |summary| {
                summary.task_name = new_name.to_string();
            })
            .await?;
        services
            .gateway
            .update_task_name(group_id, user_name, identity_key, new_name)
            .await?;
        Ok(())
    }

    pub async fn delete_task(&self, group_id: &str, user_name: &str, identity_key: &str) -> Result<()> {
        let services = &self.services;
        services
            .cache
            .delete_cached_task(group_id, user_name, identity_key)
            .await?;
        services
            .pending
            .remove_tasks(group_id, user_name, identity_key)
            .await?;
        services
            .gateway
            .delete_task(group_id, user_name, identity_key)
            .await?;
        Ok(())
    }

    /// When summaries for the pair were last fetched from the store and cached.
    pub async fn last_synced(&self, group_id: &str, user_name: &str) -> Result<Option<DateTime<Utc>>> {
        let Some(token) = self.services.cache.sync_token(group_id, user_name).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&token) {
            Ok(at) => Ok(Some(at.with_timezone(&Utc))),
            Err(err) => {
                log_warn!("Ignoring unreadable sync token for {user_name} in {group_id}: {err}");
                Ok(None)
            }
        }
    }

    /// Drops the queue, the cache and all settings.
    pub async fn reset_all(&self) -> Result<()> {
        let services = &self.services;
        services.pending.clear().await?;
        let removed = services.cache.clear_all_cache().await?;
        services.settings.reset()?;
        log_info!("Reset local sync state ({removed} cached rows removed)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SyncConfig,
        models::{AppUsage, TaskKind},
        remote::MemoryRecordStore,
    };
    use chrono::Duration;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        store: Arc<MemoryRecordStore>,
        sync: SyncOrchestrator,
    }

    async fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryRecordStore::default());
        let services = SyncServices::open(dir.path(), store.clone(), SyncConfig::default())
            .await
            .unwrap();
        Harness {
            _dir: dir,
            store,
            sync: SyncOrchestrator::new(services),
        }
    }

    fn session(minutes_ago: i64, reminder: &str, total: f64, apps: &[(&str, f64)]) -> SessionRecord {
        let end = Utc::now() - Duration::minutes(minutes_ago);
        SessionRecord::new(
            end,
            vec![TaskUsageSummary {
                reminder_id: reminder.into(),
                task_name: "Write report".into(),
                is_completed: false,
                start_time: end - Duration::seconds(total as i64),
                end_time: end,
                total_seconds: total,
                comment: None,
                app_breakdown: apps.iter().map(|(n, s)| AppUsage::new(*n, *s)).collect(),
                parent_task_name: None,
                kind: TaskKind::Task,
            }],
        )
    }

    fn seconds_for(summary: &TaskUsageSummary, app: &str) -> f64 {
        summary
            .app_breakdown
            .iter()
            .find(|usage| usage.name == app)
            .map(|usage| usage.seconds)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn offline_then_online_sessions_merge_after_flush() {
        let h = harness().await;
        let reachability = h.sync.services().reachability.clone();

        let first = session(10, "r1", 120.0, &[("Chrome", 80.0), ("Mail", 40.0)]);
        let outcome = h.sync.upload_session("g1", "alice", first).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Queued);
        assert_eq!(h.sync.services().pending.len().await, 1);

        reachability.report(true);
        let second = session(0, "r1", 60.0, &[("Chrome", 60.0)]);
        let outcome = h.sync.upload_session("g1", "alice", second).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Uploaded);

        let report = h.sync.flush_pending().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert!(h.sync.services().pending.is_empty().await);

        let (summaries, completed) = h.sync.fetch_summaries("g1", "alice", 2).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(completed, 0);
        let r1 = &summaries[0];
        assert_eq!(r1.total_seconds, 180.0);
        assert_eq!(seconds_for(r1, "Chrome"), 140.0);
        assert_eq!(seconds_for(r1, "Mail"), 40.0);

        // A second fetch with nothing new gives the same answer.
        let (again, _) = h.sync.fetch_summaries("g1", "alice", 2).await.unwrap();
        assert_eq!(again, summaries);
        assert!(h.sync.last_synced("g1", "alice").await.unwrap().is_some());
        assert!(h.sync.last_synced("g1", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_falls_back_to_cache_when_remote_fails() {
        let h = harness().await;
        h.sync.services().reachability.report(true);
        h.sync
            .upload_session("g1", "alice", session(5, "r1", 90.0, &[("Figma", 90.0)]))
            .await
            .unwrap();

        h.store.set_offline(true);
        let (summaries, _) = h.sync.fetch_summaries("g1", "alice", 2).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_seconds, 90.0);
    }

    #[tokio::test]
    async fn network_failure_while_online_queues_silently() {
        let h = harness().await;
        h.sync.services().reachability.report(true);
        h.store.fail_next_modifies(1);

        let outcome = h
            .sync
            .upload_session("g1", "alice", session(1, "r1", 30.0, &[]))
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Queued);
        assert_eq!(h.sync.services().pending.len().await, 1);
    }

    #[tokio::test]
    async fn rejection_while_online_surfaces_with_session_queued() {
        let h = harness().await;
        h.sync.services().reachability.report(true);
        h.store.reject_record_type(crate::remote::records::APP_USAGE);

        let err = h
            .sync
            .upload_session("g1", "alice", session(1, "r1", 30.0, &[("Mail", 30.0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Write { .. }));
        assert_eq!(h.sync.services().pending.len().await, 1);

        // Retrying overwrites the records already committed.
        h.store.clear_rejections();
        let report = h.sync.flush_pending().await.unwrap();
        assert_eq!(report.delivered, 1);
        let (summaries, _) = h.sync.fetch_summaries("g1", "alice", 2).await.unwrap();
        assert_eq!(summaries[0].total_seconds, 30.0);
    }

    #[tokio::test]
    async fn unauthenticated_upload_surfaces_and_reads_serve_cache() {
        let h = harness().await;
        h.sync.services().reachability.report(true);
        h.store.set_unauthenticated(true);

        let err = h
            .sync
            .upload_session("g1", "alice", session(1, "r1", 40.0, &[("Mail", 40.0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
        assert_eq!(h.sync.services().pending.len().await, 1);

        let (summaries, _) = h.sync.fetch_summaries("g1", "alice", 2).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_seconds, 40.0);
        assert!(h.sync.last_synced("g1", "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn renaming_onto_another_task_in_the_session_counts_time_once() {
        let h = harness().await;
        h.sync.services().reachability.report(true);

        let mut two_tasks = session(1, "", 60.0, &[("Pages", 60.0)]);
        two_tasks.task_summaries[0].task_name = "Draft".into();
        let mut review = two_tasks.task_summaries[0].clone();
        review.task_name = "Review".into();
        review.total_seconds = 30.0;
        review.app_breakdown = vec![AppUsage::new("Mail", 30.0)];
        two_tasks.task_summaries.push(review);

        let outcome = h.sync.upload_session("g1", "alice", two_tasks).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Uploaded);

        h.sync.update_task_name("g1", "alice", "Draft", "Review").await.unwrap();

        let (summaries, _) = h.sync.fetch_summaries("g1", "alice", 2).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].task_name, "Review");
        assert_eq!(summaries[0].total_seconds, 90.0);
        assert_eq!(seconds_for(&summaries[0], "Pages"), 60.0);
        assert_eq!(seconds_for(&summaries[0], "Mail"), 30.0);
        assert_eq!(h.sync.services().cache.cached_row_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn edits_to_queued_sessions_survive_the_flush() {
        let h = harness().await;
        let reachability = h.sync.services().reachability.clone();

        let outcome = h
            .sync
            .upload_session("g1", "alice", session(5, "r1", 50.0, &[("Xcode", 50.0)]))
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Queued);
        h.sync
            .upload_session("g1", "alice", session(3, "r2", 20.0, &[]))
            .await
            .unwrap();

        h.sync.update_task_completion("g1", "alice", "r1", true).await.unwrap();
        h.sync.update_task_name("g1", "alice", "r1", "Ship build").await.unwrap();
        h.sync.delete_task("g1", "alice", "r2").await.unwrap();
        assert_eq!(h.sync.services().pending.len().await, 1);

        reachability.report(true);
        let report = h.sync.flush_pending().await.unwrap();
        assert_eq!(report.delivered, 1);

        let (summaries, completed) = h.sync.fetch_summaries("g1", "alice", 2).await.unwrap();
        assert_eq!(completed, 1);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].task_name, "Ship build");
        assert!(summaries[0].is_completed);
        assert_eq!(h.store.records_of_type(crate::remote::records::TASK_USAGE).len(), 1);
    }

    #[tokio::test]
    async fn reconnect_listener_flushes_on_edge() {
        let h = harness().await;
        let reachability = h.sync.services().reachability.clone();
        reachability.report(false);
        h.sync
            .upload_session("g1", "alice", session(1, "r1", 45.0, &[]))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let listener = h.sync.spawn_reconnect_listener(cancel.clone());
        reachability.report(true);

        let mut drained = false;
        for _ in 0..100 {
            if h.sync.services().pending.is_empty().await {
                drained = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(drained);
        assert_eq!(h.store.records_of_type(crate::remote::records::TASK_USAGE).len(), 1);

        cancel.cancel();
        listener.await.unwrap();
    }

    #[tokio::test]
    async fn read_only_participant_gets_stable_local_member_id() {
        let h = harness().await;
        let settings = &h.sync.services().settings;
        settings.update(|s| s.write_access = WriteAccess::ReadOnly).unwrap();

        let first = h.sync.ensure_member_registered("g1", "carol").await.unwrap();
        let second = h.sync.ensure_member_registered("g1", "carol").await.unwrap();
        assert!(first.starts_with("local-"));
        assert_eq!(first, second);

        // Uploads from a read-only route are queued, never sent.
        h.sync.services().reachability.report(true);
        let outcome = h
            .sync
            .upload_session("g1", "carol", session(1, "r1", 10.0, &[]))
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Queued);
    }

    #[tokio::test]
    async fn group_lifecycle() {
        let h = harness().await;
        h.sync.services().reachability.report(true);

        let created = h.sync.create_group("alice", "Studio").await.unwrap();
        let snapshot = h.sync.services().settings.snapshot();
        assert_eq!(snapshot.current_group_id.as_deref(), Some(created.group_id.as_str()));
        assert_eq!(snapshot.user_name.as_deref(), Some("alice"));
        let group_id = created.group_id.as_str();

        h.sync
            .upload_session(group_id, "alice", session(2, "r1", 60.0, &[("Notes", 60.0)]))
            .await
            .unwrap();
        h.sync.update_task_completion(group_id, "alice", "r1", true).await.unwrap();
        h.sync.update_task_name(group_id, "alice", "r1", "Final draft").await.unwrap();

        let (summaries, completed) = h.sync.fetch_summaries(group_id, "alice", 2).await.unwrap();
        assert_eq!(completed, 1);
        assert_eq!(summaries[0].task_name, "Final draft");

        h.sync.delete_task(group_id, "alice", "r1").await.unwrap();
        let (summaries, _) = h.sync.fetch_summaries(group_id, "alice", 2).await.unwrap();
        assert!(summaries.is_empty());

        assert!(!h.sync.delete_group_if_owner(group_id, "mallory").await.unwrap());
        assert!(h.sync.delete_group_if_owner(group_id, "alice").await.unwrap());
        assert!(h.sync.services().settings.current_group_id().is_none());
    }

    #[tokio::test]
    async fn leave_and_reset_clear_local_state() {
        let h = harness().await;
        h.sync.upload_session("g1", "alice", session(1, "r1", 20.0, &[])).await.unwrap();
        h.sync.upload_session("g2", "alice", session(1, "r2", 20.0, &[])).await.unwrap();
        h.sync.services().settings.join_group("g1", None).unwrap();

        h.sync.services().reachability.report(true);
        h.sync.leave_group("g1", "alice").await.unwrap();
        assert!(h.sync.services().settings.current_group_id().is_none());
        let pending = h.sync.services().pending.entries().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].group_id, "g2");

        h.sync.reset_all().await.unwrap();
        assert!(h.sync.services().pending.is_empty().await);
        assert_eq!(h.sync.services().cache.cached_row_count().await.unwrap(), 0);
    }
}
