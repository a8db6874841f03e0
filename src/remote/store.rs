//! Backend-neutral record store interface.
//!
//! Anything that can create/read/update/delete typed records, run paginated
//! predicate queries inside a zone and apply batched modifications with a size
//! limit can back the gateway.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::route::Route;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Reference(RecordId),
}

impl FieldValue {
    fn compare(&self, other: &FieldValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Double(a), FieldValue::Double(b)) => a.partial_cmp(b),
            (FieldValue::Int(a), FieldValue::Double(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Double(a), FieldValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Date(a), FieldValue::Date(b)) => Some(a.cmp(b)),
            (FieldValue::Reference(a), FieldValue::Reference(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<RecordId> for FieldValue {
    fn from(value: RecordId) -> Self {
        FieldValue::Reference(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub record_type: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(record_type: &str, id: RecordId) -> Self {
        Self {
            id,
            record_type: record_type.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Missing or mistyped fields read as empty.
    pub fn string(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(FieldValue::String(value)) => value.clone(),
            _ => String::new(),
        }
    }

    pub fn optional_string(&self, key: &str) -> Option<String> {
        match self.fields.get(key) {
            Some(FieldValue::String(value)) if !value.is_empty() => Some(value.clone()),
            _ => None,
        }
    }

    pub fn double(&self, key: &str) -> f64 {
        match self.fields.get(key) {
            Some(FieldValue::Double(value)) => *value,
            Some(FieldValue::Int(value)) => *value as f64,
            _ => 0.0,
        }
    }

    pub fn int(&self, key: &str) -> i64 {
        match self.fields.get(key) {
            Some(FieldValue::Int(value)) => *value,
            Some(FieldValue::Double(value)) => *value as i64,
            _ => 0,
        }
    }

    pub fn bool(&self, key: &str) -> bool {
        match self.fields.get(key) {
            Some(FieldValue::Bool(value)) => *value,
            Some(FieldValue::Int(value)) => *value != 0,
            _ => false,
        }
    }

    pub fn date(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.fields.get(key) {
            Some(FieldValue::Date(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn reference(&self, key: &str) -> Option<RecordId> {
        match self.fields.get(key) {
            Some(FieldValue::Reference(value)) => Some(value.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    All,
    Equals(String, FieldValue),
    GreaterOrEqual(String, FieldValue),
    In(String, Vec<FieldValue>),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Predicate::Equals(field.to_string(), value.into())
    }

    pub fn gte(field: &str, value: impl Into<FieldValue>) -> Self {
        Predicate::GreaterOrEqual(field.to_string(), value.into())
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Equals(field, value) => record.get(field) == Some(value),
            Predicate::GreaterOrEqual(field, value) => record
                .get(field)
                .and_then(|actual| actual.compare(value))
                .map_or(false, |ord| ord != std::cmp::Ordering::Less),
            Predicate::In(field, values) => record
                .get(field)
                .map_or(false, |actual| values.contains(actual)),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub field: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: true,
        }
    }

    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: false,
        }
    }

    pub fn compare(&self, a: &Record, b: &Record) -> std::cmp::Ordering {
        let ord = match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => x.compare(y).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub record_type: String,
    pub predicate: Predicate,
    pub sort: Option<SortDescriptor>,
}

impl Query {
    pub fn new(record_type: &str, predicate: Predicate) -> Self {
        Self {
            record_type: record_type.to_string(),
            predicate,
            sort: None,
        }
    }

    pub fn sorted(mut self, sort: SortDescriptor) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Opaque continuation token returned by a partial query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(pub String);

#[derive(Debug, Clone)]
pub struct QueryPage {
    pub records: Vec<Record>,
    pub cursor: Option<Cursor>,
}

/// Per-record outcome of one modify call; `isAtomic = false` semantics.
#[derive(Debug, Default)]
pub struct ModifyOutcome {
    pub saved: Vec<RecordId>,
    pub deleted: Vec<RecordId>,
    pub failed: Vec<(RecordId, crate::error::SyncError)>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Largest number of records accepted by one `modify` call.
    fn max_batch_size(&self) -> usize;

    async fn query_page(
        &self,
        route: &Route,
        query: &Query,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<QueryPage>;

    async fn fetch(&self, route: &Route, id: &RecordId) -> Result<Record>;

    /// Saves and deletes records without atomicity. Saves overwrite on conflict.
    async fn modify(
        &self,
        route: &Route,
        save: Vec<Record>,
        delete: Vec<RecordId>,
    ) -> Result<ModifyOutcome>;

    /// Link other users open to join the zone holding `id`.
    async fn share_url(&self, route: &Route, id: &RecordId) -> Result<String>;
}
