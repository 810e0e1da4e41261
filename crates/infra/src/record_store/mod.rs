//! Generic record store over the application's collections.
//!
//! This is the thin glue the BaaS exposes (Firestore collections, Supabase
//! tables): schemaless JSON records with a string `id`, CRUD plus a filtered,
//! ordered, limited listing.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use clinicflow_core::RecordId;

pub use in_memory::InMemoryRecordStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresRecordStore;

/// A stored record: a JSON object whose `id` field is the record id.
pub type Record = serde_json::Map<String, JsonValue>;

/// Collections known to the application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Clients,
    Appointments,
    Treatments,
    Transactions,
    Campaigns,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Clients => "clients",
            Collection::Appointments => "appointments",
            Collection::Treatments => "treatments",
            Collection::Transactions => "transactions",
            Collection::Campaigns => "campaigns",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: Collection, id: RecordId },

    #[error("record already exists: {collection}/{id}")]
    Conflict { collection: Collection, id: RecordId },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("failed to decode record: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing options
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// SQL `LIKE` (`%` matches any run, case-sensitive).
    Like,
    /// SQL `ILIKE` (case-insensitive `LIKE`).
    Ilike,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: JsonValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Whether `record` passes this filter. Missing fields never match.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Neq => actual != &self.value,
            FilterOp::Gt => compare_json(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare_json(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare_json(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare_json(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Like | FilterOp::Ilike => {
                let (Some(text), Some(pattern)) = (actual.as_str(), self.value.as_str()) else {
                    return false;
                };
                if self.op == FilterOp::Ilike {
                    like_match(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like_match(text, pattern)
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Options for [`RecordStore::list`].
///
/// `range` is inclusive on both ends (`(0, 9)` is the first ten records) and is
/// applied before `limit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub range: Option<(usize, usize)>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.range = Some((from, to));
        self
    }
}

/// A page of records plus the number of records that matched the filters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListResult {
    pub records: Vec<Record>,
    pub count: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store contract
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record. A missing `id` is generated; `created_at`/`updated_at`
    /// are stamped when absent.
    async fn create(&self, collection: Collection, record: Record) -> Result<Record, StoreError>;

    async fn read(&self, collection: Collection, id: &RecordId) -> Result<Record, StoreError>;

    /// Merge `changes` into the stored record and stamp `updated_at`.
    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        changes: Record,
    ) -> Result<Record, StoreError>;

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), StoreError>;

    async fn list(&self, collection: Collection, options: &ListOptions) -> Result<ListResult, StoreError>;
}

#[async_trait]
impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    async fn create(&self, collection: Collection, record: Record) -> Result<Record, StoreError> {
        (**self).create(collection, record).await
    }

    async fn read(&self, collection: Collection, id: &RecordId) -> Result<Record, StoreError> {
        (**self).read(collection, id).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        changes: Record,
    ) -> Result<Record, StoreError> {
        (**self).update(collection, id, changes).await
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), StoreError> {
        (**self).delete(collection, id).await
    }

    async fn list(&self, collection: Collection, options: &ListOptions) -> Result<ListResult, StoreError> {
        (**self).list(collection, options).await
    }
}

/// Read the `id` field of a record.
pub fn record_id(record: &Record) -> Option<RecordId> {
    record
        .get("id")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(RecordId::from)
}

/// Order two JSON values of the same kind. Mixed kinds are incomparable.
pub(crate) fn compare_json(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        (JsonValue::Null, JsonValue::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// SQL `LIKE` matching with `%` (any run) and `_` (single char).
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // Classic two-pointer wildcard match with backtracking to the last `%`.
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: JsonValue) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn like_supports_wildcards() {
        assert!(like_match("maria silva", "%silva"));
        assert!(like_match("maria silva", "maria%"));
        assert!(like_match("maria silva", "%ia s%"));
        assert!(like_match("abc", "a_c"));
        assert!(!like_match("abc", "a_d"));
        assert!(!like_match("maria", "%silva%"));
    }

    #[test]
    fn comparison_filters_use_json_kind() {
        let r = record(json!({"valor": 150.0, "data": "2024-05-10"}));
        assert!(Filter::new("valor", FilterOp::Gt, 100).matches(&r));
        assert!(Filter::new("valor", FilterOp::Lte, 150).matches(&r));
        assert!(Filter::new("data", FilterOp::Gte, "2024-05-01").matches(&r));
        assert!(!Filter::new("data", FilterOp::Gt, 5).matches(&r));
        assert!(!Filter::eq("missing", "x").matches(&r));
    }

    #[test]
    fn ilike_ignores_case() {
        let r = record(json!({"display_name": "Ana Souza"}));
        assert!(Filter::new("display_name", FilterOp::Ilike, "%souza%").matches(&r));
        assert!(!Filter::new("display_name", FilterOp::Like, "%souza%").matches(&r));
    }

    #[test]
    fn record_id_ignores_blank_ids() {
        assert_eq!(record_id(&record(json!({"id": "c1"}))), Some(RecordId::new("c1")));
        assert_eq!(record_id(&record(json!({"id": "  "}))), None);
        assert_eq!(record_id(&record(json!({"id": 7}))), None);
    }
}
