use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use clinicflow_core::RecordId;

use super::{
    Collection, Direction, ListOptions, ListResult, Record, RecordStore, StoreError, compare_json,
    record_id,
};

/// In-memory record store for tests/dev.
///
/// Records are kept per collection in insertion order so that unordered
/// listings are stable.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    collections: RwLock<HashMap<Collection, Vec<Record>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error() -> StoreError {
        StoreError::Storage("lock poisoned".to_string())
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339()
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, collection: Collection, mut record: Record) -> Result<Record, StoreError> {
        let id = match record_id(&record) {
            Some(id) => id,
            None => {
                let id = RecordId::generate();
                record.insert("id".to_string(), JsonValue::String(id.to_string()));
                id
            }
        };

        let now = now_string();
        record
            .entry("created_at".to_string())
            .or_insert_with(|| JsonValue::String(now.clone()));
        record
            .entry("updated_at".to_string())
            .or_insert_with(|| JsonValue::String(now));

        let mut collections = self.collections.write().map_err(|_| Self::lock_error())?;
        let rows = collections.entry(collection).or_default();
        if rows.iter().any(|r| record_id(r).as_ref() == Some(&id)) {
            return Err(StoreError::Conflict { collection, id });
        }

        rows.push(record.clone());
        Ok(record)
    }

    async fn read(&self, collection: Collection, id: &RecordId) -> Result<Record, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::lock_error())?;
        collections
            .get(&collection)
            .and_then(|rows| rows.iter().find(|r| record_id(r).as_ref() == Some(id)))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.clone(),
            })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        changes: Record,
    ) -> Result<Record, StoreError> {
        if let Some(new_id) = record_id(&changes) {
            if &new_id != id {
                return Err(StoreError::InvalidRecord("record id cannot change".to_string()));
            }
        }

        let mut collections = self.collections.write().map_err(|_| Self::lock_error())?;
        let existing = collections
            .get_mut(&collection)
            .and_then(|rows| rows.iter_mut().find(|r| record_id(r).as_ref() == Some(id)))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.clone(),
            })?;

        for (key, value) in changes {
            existing.insert(key, value);
        }
        existing.insert("updated_at".to_string(), JsonValue::String(now_string()));

        Ok(existing.clone())
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| Self::lock_error())?;
        let rows = collections.entry(collection).or_default();
        let before = rows.len();
        rows.retain(|r| record_id(r).as_ref() != Some(id));

        if rows.len() == before {
            return Err(StoreError::NotFound {
                collection,
                id: id.clone(),
            });
        }
        Ok(())
    }

    async fn list(&self, collection: Collection, options: &ListOptions) -> Result<ListResult, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::lock_error())?;
        let mut matched: Vec<Record> = collections
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|r| options.filters.iter().all(|f| f.matches(r)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        let count = matched.len();

        if let Some(order) = &options.order_by {
            matched.sort_by(|a, b| {
                let ord = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => compare_json(x, y).unwrap_or(Ordering::Equal),
                    // Missing values sort last in either direction.
                    (Some(_), None) => return Ordering::Less,
                    (None, Some(_)) => return Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        let mut records: Vec<Record> = match options.range {
            Some((from, to)) if to >= from => matched.into_iter().skip(from).take(to - from + 1).collect(),
            Some(_) => Vec::new(),
            None => matched,
        };

        if let Some(limit) = options.limit {
            records.truncate(limit);
        }

        Ok(ListResult { records, count })
    }
}
