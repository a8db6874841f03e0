use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use super::{
    records::{
        self, fields, group_from_record, group_record, member_from_record, member_record,
        records_to_scoped, session_to_records, APP_USAGE, MEMBER, TASK_USAGE, USAGE_TYPES,
    },
    route::{resolve_route, DatabaseScope, Route, ZoneId},
    store::{FieldValue, Predicate, Query, Record, RecordId, RecordStore, SortDescriptor},
};
use crate::{
    config::SyncConfig,
    error::{Result, SyncError},
    models::{CreatedGroup, GroupInfo, MemberRecord, ScopedSummary, SessionRecord},
    settings::SettingsStore,
};

/// Anything a queued session can be delivered through.
#[async_trait]
pub trait SessionUploader: Send + Sync {
    async fn save_session_directly(
        &self,
        group_id: &str,
        user_name: &str,
        session: &SessionRecord,
    ) -> Result<()>;
}

/// Sole owner of remote store I/O.
pub struct RemoteGateway {
    store: Arc<dyn RecordStore>,
    settings: Arc<SettingsStore>,
    config: SyncConfig,
}

impl RemoteGateway {
    pub fn new(store: Arc<dyn RecordStore>, settings: Arc<SettingsStore>, config: SyncConfig) -> Self {
        Self {
            store,
            settings,
            config,
        }
    }

    pub fn resolve_route(&self) -> Route {
        resolve_route(&self.settings.snapshot(), &self.config)
    }

    fn batch_size(&self) -> usize {
        self.config.max_batch_size.min(self.store.max_batch_size()).max(1)
    }

    /// Runs `query` to exhaustion, following cursors.
    ///
    /// A missing zone reads as empty. A failure after the first page returns
    /// what was gathered so far.
    pub async fn query(&self, route: &Route, query: Query) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut cursor = None;
        let mut pages = 0usize;

        loop {
            match self
                .store
                .query_page(route, &query, cursor.take(), self.config.query_page_size)
                .await
            {
                Ok(page) => {
                    pages += 1;
                    records.extend(page.records);
                    match page.cursor {
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }
                Err(SyncError::NotFound(what)) if pages == 0 => {
                    debug!("{} query found nothing: {what}", query.record_type);
                    return Ok(Vec::new());
                }
                Err(err) if pages == 0 => return Err(err),
                Err(err) => {
                    warn!(
                        "{} query failed after {pages} pages; returning {} records: {err}",
                        query.record_type,
                        records.len()
                    );
                    break;
                }
            }
        }

        Ok(records)
    }

    /// Saves in independent batches. Committed batches stay committed when a
    /// later one fails.
    pub async fn save_batch(&self, route: &Route, records: Vec<Record>) -> Result<()> {
        let total = records.len();
        let mut failures = BatchFailures::default();
        let mut remaining = records;

        while !remaining.is_empty() {
            let rest = remaining.split_off(remaining.len().min(self.batch_size()));
            let chunk = std::mem::replace(&mut remaining, rest);
            let size = chunk.len();
            match self.store.modify(route, chunk, Vec::new()).await {
                Ok(outcome) => failures.record_rejections(outcome.failed),
                Err(err) => failures.record_batch(size, err),
            }
        }

        failures.into_result(total, "save")
    }

    pub async fn delete_batch(&self, route: &Route, ids: Vec<RecordId>) -> Result<()> {
        let total = ids.len();
        let mut failures = BatchFailures::default();

        for chunk in ids.chunks(self.batch_size()) {
            match self.store.modify(route, Vec::new(), chunk.to_vec()).await {
                Ok(outcome) => failures.record_rejections(outcome.failed),
                Err(err) => failures.record_batch(chunk.len(), err),
            }
        }

        failures.into_result(total, "delete")
    }

    /// Returns the member id for the pair, creating the record only when the
    /// lookup finds none. Concurrent first registrations may both create.
    pub async fn ensure_member_registered(&self, group_id: &str, user_name: &str) -> Result<String> {
        let route = self.resolve_route();
        self.ensure_member_on(&route, group_id, user_name).await
    }

    async fn ensure_member_on(&self, route: &Route, group_id: &str, user_name: &str) -> Result<String> {
        let existing = self
            .query(
                route,
                Query::new(MEMBER, member_predicate(group_id, user_name))
                    .sorted(SortDescriptor::ascending(fields::CREATED_AT)),
            )
            .await?;
        if let Some(member) = existing.first() {
            return Ok(member.id.to_string());
        }

        let record = member_record(group_id, user_name, Utc::now());
        let member_id = record.id.to_string();
        self.save_batch(route, vec![record]).await?;
        info!("Registered member {user_name} in group {group_id}");
        Ok(member_id)
    }

    /// Creates a group zone and record and registers the owner as first member.
    pub async fn create_group(&self, owner_name: &str, group_name: &str) -> Result<CreatedGroup> {
        let group_id = Uuid::new_v4().to_string();
        let route = group_route(&group_id, owner_name);
        let record = group_record(&group_id, group_name, owner_name, Utc::now());
        let record_id = record.id.clone();

        self.save_batch(&route, vec![record]).await?;
        let share_url = self.store.share_url(&route, &record_id).await?;
        self.ensure_member_on(&route, &group_id, owner_name).await?;

        // Fresh writes may not be readable yet; only log a miss.
        match self.store.fetch(&route, &record_id).await {
            Ok(_) => debug!("Group {group_id} visible after creation"),
            Err(err) => warn!("Group {group_id} not yet visible after creation: {err}"),
        }

        info!("Created group {group_id} owned by {owner_name}");
        Ok(CreatedGroup {
            share_url,
            group_id,
        })
    }

    pub async fn fetch_group(&self, group_id: &str) -> Result<Option<GroupInfo>> {
        let route = self.resolve_route();
        match self.store.fetch(&route, &RecordId::new(group_id)).await {
            Ok(record) => Ok(Some(group_from_record(&record))),
            Err(SyncError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn list_members(&self, group_id: &str) -> Result<Vec<MemberRecord>> {
        let route = self.resolve_route();
        let records = self
            .query(
                &route,
                Query::new(MEMBER, Predicate::eq(fields::GROUP_ID, group_id))
                    .sorted(SortDescriptor::ascending(fields::CREATED_AT)),
            )
            .await?;
        Ok(records.iter().map(member_from_record).collect())
    }

    /// Task and app records for a member ending at or after `since`.
    pub async fn fetch_scoped_summaries(
        &self,
        group_id: &str,
        user_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ScopedSummary>> {
        let route = self.resolve_route();
        let window = Predicate::And(vec![
            Predicate::eq(fields::GROUP_ID, group_id),
            Predicate::eq(fields::USER_NAME, user_name),
            Predicate::gte(fields::END_TIME, since),
        ]);

        let tasks = self
            .query(
                &route,
                Query::new(TASK_USAGE, window.clone())
                    .sorted(SortDescriptor::ascending(fields::END_TIME)),
            )
            .await?;
        let apps = self.query(&route, Query::new(APP_USAGE, window)).await?;

        debug!(
            "Fetched {} task and {} app records for {user_name} in {group_id}",
            tasks.len(),
            apps.len()
        );
        Ok(records_to_scoped(&tasks, &apps))
    }

    /// Removes every usage and membership record of one member.
    pub async fn delete_user_data(&self, group_id: &str, user_name: &str) -> Result<usize> {
        let route = self.resolve_route();
        let mut ids = Vec::new();
        for record_type in USAGE_TYPES.iter().chain([MEMBER].iter()) {
            let records = self
                .query(&route, Query::new(record_type, member_predicate(group_id, user_name)))
                .await?;
            ids.extend(records.into_iter().map(|r| r.id));
        }

        let count = ids.len();
        self.delete_batch(&route, ids).await?;
        info!("Deleted {count} records for {user_name} in group {group_id}");
        Ok(count)
    }

    /// Deletes the group and all its data when `requester` owns it.
    pub async fn delete_group_if_owner(&self, group_id: &str, requester: &str) -> Result<bool> {
        let route = self.resolve_route();
        let group = match self.store.fetch(&route, &RecordId::new(group_id)).await {
            Ok(record) => group_from_record(&record),
            Err(SyncError::NotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        if group.owner_name != requester {
            info!("{requester} is not the owner of group {group_id}; skipping delete");
            return Ok(false);
        }

        let mut ids = Vec::new();
        for record_type in USAGE_TYPES.iter().chain([MEMBER].iter()) {
            let records = self
                .query(&route, Query::new(record_type, Predicate::eq(fields::GROUP_ID, group_id)))
                .await?;
            ids.extend(records.into_iter().map(|r| r.id));
        }
        ids.push(RecordId::new(group_id));

        self.delete_batch(&route, ids).await?;
        info!("Group {group_id} deleted by owner {requester}");
        Ok(true)
    }

    pub async fn update_task_completion(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        is_completed: bool,
    ) -> Result<usize> {
        self.edit_tasks(group_id, user_name, identity_key, |record| {
            record.set(fields::IS_COMPLETED, FieldValue::Bool(is_completed));
        })
        .await
    }

    pub async fn update_task_name(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        new_name: &str,
    ) -> Result<usize> {
        self.edit_tasks(group_id, user_name, identity_key, |record| {
            record.set(fields::TASK_NAME, new_name);
            if record.string(fields::REMINDER_ID).is_empty() {
                record.set(fields::IDENTITY_KEY, new_name);
            }
        })
        .await
    }

    /// Deletes every task record with the key along with its app records.
    pub async fn delete_task(&self, group_id: &str, user_name: &str, identity_key: &str) -> Result<usize> {
        let route = self.resolve_route();
        let tasks = self
            .query(&route, Query::new(TASK_USAGE, task_predicate(group_id, user_name, identity_key)))
            .await?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let task_refs: Vec<FieldValue> = tasks
            .iter()
            .map(|t| FieldValue::Reference(t.id.clone()))
            .collect();
        let apps = self
            .query(
                &route,
                Query::new(
                    APP_USAGE,
                    Predicate::And(vec![
                        Predicate::eq(fields::GROUP_ID, group_id),
                        Predicate::In(fields::TASK_REF.to_string(), task_refs),
                    ]),
                ),
            )
            .await?;

        let removed = tasks.len();
        let ids = tasks.into_iter().chain(apps).map(|r| r.id).collect();
        self.delete_batch(&route, ids).await?;
        Ok(removed)
    }

    async fn edit_tasks<F>(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        mut edit: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut Record) + Send,
    {
        let route = self.resolve_route();
        let mut tasks = self
            .query(&route, Query::new(TASK_USAGE, task_predicate(group_id, user_name, identity_key)))
            .await?;
        for task in tasks.iter_mut() {
            edit(task);
        }

        let count = tasks.len();
        if count > 0 {
            self.save_batch(&route, tasks).await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl SessionUploader for RemoteGateway {
    async fn save_session_directly(
        &self,
        group_id: &str,
        user_name: &str,
        session: &SessionRecord,
    ) -> Result<()> {
        let route = self.resolve_route();
        if !route.writable {
            return Err(SyncError::Permission(format!(
                "no write access to zone {}",
                route.zone.name
            )));
        }

        let records = session_to_records(group_id, user_name, session);
        debug!(
            "Saving session ending {} for {user_name} as {} records",
            session.end_time,
            records.len()
        );
        self.save_batch(&route, records).await
    }
}

/// Zone a newly created group lives in, addressed from the owner's database.
pub fn group_route(group_id: &str, owner_name: &str) -> Route {
    Route {
        database: DatabaseScope::Private,
        zone: group_zone(group_id, owner_name),
        writable: true,
    }
}

pub fn group_zone(group_id: &str, owner_name: &str) -> ZoneId {
    ZoneId {
        name: format!("group-{group_id}"),
        owner: owner_name.to_string(),
    }
}

fn member_predicate(group_id: &str, user_name: &str) -> Predicate {
    Predicate::And(vec![
        Predicate::eq(fields::GROUP_ID, group_id),
        Predicate::eq(fields::USER_NAME, user_name),
    ])
}

fn task_predicate(group_id: &str, user_name: &str, identity_key: &str) -> Predicate {
    Predicate::And(vec![
        Predicate::eq(fields::GROUP_ID, group_id),
        Predicate::eq(fields::USER_NAME, user_name),
        Predicate::eq(records::fields::IDENTITY_KEY, identity_key),
    ])
}

/// Accumulates per-batch failures so sibling batches still run.
#[derive(Default)]
struct BatchFailures {
    failed: usize,
    fatal: Option<SyncError>,
    transient: Option<SyncError>,
    first_rejection: Option<String>,
}

impl BatchFailures {
    fn record_rejections(&mut self, failed: Vec<(RecordId, SyncError)>) {
        for (id, err) in failed {
            self.failed += 1;
            if self.first_rejection.is_none() {
                self.first_rejection = Some(format!("{id}: {err}"));
            }
        }
    }

    fn record_batch(&mut self, size: usize, err: SyncError) {
        self.failed += size;
        if err.is_fatal() {
            self.fatal.get_or_insert(err);
        } else if matches!(err, SyncError::Network(_)) {
            self.transient.get_or_insert(err);
        } else if self.first_rejection.is_none() {
            self.first_rejection = Some(err.to_string());
        }
    }

    fn into_result(self, total: usize, action: &str) -> Result<()> {
        if self.failed == 0 {
            return Ok(());
        }
        warn!("{action} failed for {} of {total} records", self.failed);
        if let Some(err) = self.fatal {
            return Err(err);
        }
        if let Some(err) = self.transient {
            return Err(err);
        }
        Err(SyncError::Write {
            failed: self.failed,
            total,
            message: self.first_rejection.unwrap_or_default(),
        })
    }
}
