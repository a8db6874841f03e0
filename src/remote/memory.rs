//! In-process record store.
//!
//! Zones are addressed by name and owner only, so a zone created in the
//! owner's private database is the same zone participants reach through the
//! shared database. Used for solo operation and in tests, with switches to
//! simulate outages, permission problems, rejected records and lagging reads.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{
    route::{DatabaseScope, Route, ZoneId},
    store::{Cursor, ModifyOutcome, Query, QueryPage, Record, RecordId, RecordStore},
};
use crate::error::{Result, SyncError};

#[derive(Default)]
struct MemoryState {
    zones: HashMap<ZoneId, BTreeMap<RecordId, Record>>,
    offline: bool,
    unauthenticated: bool,
    rejected_types: HashSet<String>,
    rejected_ids: HashSet<RecordId>,
    failing_modifies: usize,
    fail_query_from_page: Option<usize>,
    lagging_fetches: bool,
    modify_batches: Vec<usize>,
}

pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
    batch_limit: usize,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new(400)
    }
}

impl MemoryRecordStore {
    pub fn new(batch_limit: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            batch_limit: batch_limit.max(1),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn set_unauthenticated(&self, unauthenticated: bool) {
        self.lock().unauthenticated = unauthenticated;
    }

    /// Saves of this record type fail per record.
    pub fn reject_record_type(&self, record_type: &str) {
        self.lock().rejected_types.insert(record_type.to_string());
    }

    pub fn reject_record(&self, id: &RecordId) {
        self.lock().rejected_ids.insert(id.clone());
    }

    pub fn clear_rejections(&self) {
        let mut state = self.lock();
        state.rejected_types.clear();
        state.rejected_ids.clear();
    }

    /// The next `count` modify calls fail with a network error.
    pub fn fail_next_modifies(&self, count: usize) {
        self.lock().failing_modifies = count;
    }

    /// Queries fail once they reach page `page` (zero-based).
    pub fn fail_queries_from_page(&self, page: Option<usize>) {
        self.lock().fail_query_from_page = page;
    }

    /// Single-record fetches report not-found, like a read racing a write.
    pub fn set_lagging_fetches(&self, lagging: bool) {
        self.lock().lagging_fetches = lagging;
    }

    /// Sizes of every modify call received, in order.
    pub fn modify_batches(&self) -> Vec<usize> {
        self.lock().modify_batches.clone()
    }

    pub fn records_of_type(&self, record_type: &str) -> Vec<Record> {
        self.lock()
            .zones
            .values()
            .flat_map(|zone| zone.values())
            .filter(|record| record.record_type == record_type)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MemoryState {
    fn check_reachable(&self) -> Result<()> {
        if self.offline {
            return Err(SyncError::Network("record store unreachable".into()));
        }
        if self.unauthenticated {
            return Err(SyncError::Auth("no account signed in".into()));
        }
        Ok(())
    }

    fn zone(&self, route: &Route) -> Result<&BTreeMap<RecordId, Record>> {
        self.zones
            .get(&route.zone)
            .ok_or_else(|| SyncError::NotFound(format!("zone {}", route.zone.name)))
    }

    fn zone_for_write(&mut self, route: &Route) -> Result<&mut BTreeMap<RecordId, Record>> {
        if route.database == DatabaseScope::Shared && !self.zones.contains_key(&route.zone) {
            return Err(SyncError::NotFound(format!("shared zone {}", route.zone.name)));
        }
        Ok(self.zones.entry(route.zone.clone()).or_default())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn max_batch_size(&self) -> usize {
        self.batch_limit
    }

    async fn query_page(
        &self,
        route: &Route,
        query: &Query,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<QueryPage> {
        let state = self.lock();
        state.check_reachable()?;

        let limit = limit.max(1);
        let offset = match &cursor {
            Some(Cursor(raw)) => raw
                .parse::<usize>()
                .map_err(|_| SyncError::Network(format!("invalid cursor {raw}")))?,
            None => 0,
        };
        if let Some(fail_page) = state.fail_query_from_page {
            if offset / limit >= fail_page {
                return Err(SyncError::Network("query interrupted".into()));
            }
        }

        let zone = state.zone(route)?;
        let mut matching: Vec<&Record> = zone
            .values()
            .filter(|r| r.record_type == query.record_type && query.predicate.matches(r))
            .collect();
        if let Some(sort) = &query.sort {
            matching.sort_by(|a, b| sort.compare(a, b));
        }

        let records: Vec<Record> = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| (*r).clone())
            .collect();
        let next = offset + records.len();
        let cursor = (next < matching.len()).then(|| Cursor(next.to_string()));

        Ok(QueryPage { records, cursor })
    }

    async fn fetch(&self, route: &Route, id: &RecordId) -> Result<Record> {
        let state = self.lock();
        state.check_reachable()?;
        if state.lagging_fetches {
            return Err(SyncError::NotFound(format!("record {id}")));
        }
        state
            .zone(route)?
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("record {id}")))
    }

    async fn modify(
        &self,
        route: &Route,
        save: Vec<Record>,
        delete: Vec<RecordId>,
    ) -> Result<ModifyOutcome> {
        let mut state = self.lock();
        state.check_reachable()?;
        state.modify_batches.push(save.len() + delete.len());

        if state.failing_modifies > 0 {
            state.failing_modifies -= 1;
            return Err(SyncError::Network("request timed out".into()));
        }
        if !route.writable {
            return Err(SyncError::Permission(format!(
                "zone {} is read-only for this participant",
                route.zone.name
            )));
        }
        let total = save.len() + delete.len();
        if total > self.batch_limit {
            return Err(SyncError::Write {
                failed: total,
                total,
                message: format!("batch of {total} exceeds limit {}", self.batch_limit),
            });
        }

        let rejected_types = state.rejected_types.clone();
        let rejected_ids = state.rejected_ids.clone();
        let zone = state.zone_for_write(route)?;
        let mut outcome = ModifyOutcome::default();

        for record in save {
            if rejected_types.contains(&record.record_type) || rejected_ids.contains(&record.id) {
                outcome.failed.push((
                    record.id.clone(),
                    SyncError::Write {
                        failed: 1,
                        total: 1,
                        message: format!("{} record rejected", record.record_type),
                    },
                ));
                continue;
            }
            outcome.saved.push(record.id.clone());
            zone.insert(record.id.clone(), record);
        }
        for id in delete {
            zone.remove(&id);
            outcome.deleted.push(id);
        }

        Ok(outcome)
    }

    async fn share_url(&self, route: &Route, id: &RecordId) -> Result<String> {
        let state = self.lock();
        state.check_reachable()?;
        state.zone(route)?;
        Ok(format!(
            "memory://share/{}?owner={}&record={}",
            route.zone.name, route.zone.owner, id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::store::Predicate;

    fn route() -> Route {
        Route::private("TestZone")
    }

    fn record(id: &str, group: &str) -> Record {
        Record::new("Member", RecordId::new(id)).with("groupID", group)
    }

    #[tokio::test]
    async fn pages_until_exhausted() {
        let store = MemoryRecordStore::new(10);
        let saves = (0..5).map(|i| record(&format!("m{i}"), "g1")).collect();
        store.modify(&route(), saves, Vec::new()).await.unwrap();

        let query = Query::new("Member", Predicate::eq("groupID", "g1"));
        let first = store.query_page(&route(), &query, None, 2).await.unwrap();
        assert_eq!(first.records.len(), 2);
        let second = store
            .query_page(&route(), &query, first.cursor, 2)
            .await
            .unwrap();
        assert_eq!(second.records.len(), 2);
        let third = store
            .query_page(&route(), &query, second.cursor, 2)
            .await
            .unwrap();
        assert_eq!(third.records.len(), 1);
        assert!(third.cursor.is_none());
    }

    #[tokio::test]
    async fn missing_zone_and_read_only_route() {
        let store = MemoryRecordStore::default();
        let query = Query::new("Member", Predicate::All);
        let err = store.query_page(&route(), &query, None, 10).await.unwrap_err();
        assert!(err.is_not_found());

        let mut read_only = route();
        read_only.writable = false;
        let err = store
            .modify(&read_only, vec![record("m1", "g1")], Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Permission(_)));
    }

    #[tokio::test]
    async fn oversized_batches_are_refused() {
        let store = MemoryRecordStore::new(2);
        let saves = (0..3).map(|i| record(&format!("m{i}"), "g1")).collect();
        let err = store.modify(&route(), saves, Vec::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::Write { total: 3, .. }));
    }
}
