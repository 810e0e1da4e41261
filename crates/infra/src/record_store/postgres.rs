//! Postgres-backed record store.
//!
//! All collections share one `records` table keyed by `(collection, id)`; the
//! record body lives in a `jsonb` column. Filters and ordering are evaluated on
//! the JSON body, so the semantics match the in-memory store:
//!
//! | Operation        | SQL                                   |
//! |------------------|---------------------------------------|
//! | eq/neq/gt/...    | `data -> field <op> value::jsonb`     |
//! | like/ilike       | `data ->> field LIKE/ILIKE value`     |
//! | order            | `data -> field ASC/DESC NULLS LAST`   |
//!
//! Unique violations (`23505`) on insert map to [`StoreError::Conflict`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use clinicflow_core::RecordId;

use super::{
    Collection, Direction, FilterOp, ListOptions, ListResult, Record, RecordStore, StoreError,
    record_id,
};

#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: Arc<PgPool>,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure the `records` table exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Record, StoreError> {
    let data: JsonValue = row
        .try_get("data")
        .map_err(|e| StoreError::Decode(e.to_string()))?;
    match data {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!("expected object, got {other}"))),
    }
}

fn not_found(collection: Collection, id: &RecordId) -> StoreError {
    StoreError::NotFound {
        collection,
        id: id.clone(),
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    #[instrument(skip(self, record), fields(collection = %collection), err)]
    async fn create(&self, collection: Collection, mut record: Record) -> Result<Record, StoreError> {
        let id = match record_id(&record) {
            Some(id) => id,
            None => {
                let id = RecordId::generate();
                record.insert("id".to_string(), JsonValue::String(id.to_string()));
                id
            }
        };

        let now = Utc::now().to_rfc3339();
        record
            .entry("created_at".to_string())
            .or_insert_with(|| JsonValue::String(now.clone()));
        record
            .entry("updated_at".to_string())
            .or_insert_with(|| JsonValue::String(now));

        sqlx::query("INSERT INTO records (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(id.as_str())
            .bind(JsonValue::Object(record.clone()))
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict {
                        collection,
                        id: id.clone(),
                    }
                } else {
                    map_sqlx_error("create", e)
                }
            })?;

        Ok(record)
    }

    // A miss is routine during profile resolution; only backend failures
    // are recorded as span errors.
    async fn read(&self, collection: Collection, id: &RecordId) -> Result<Record, StoreError> {
        self.find(collection, id)
            .await?
            .ok_or_else(|| not_found(collection, id))
    }

    #[instrument(skip(self, changes), fields(collection = %collection, id = %id), err)]
    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        mut changes: Record,
    ) -> Result<Record, StoreError> {
        if let Some(new_id) = record_id(&changes) {
            if &new_id != id {
                return Err(StoreError::InvalidRecord("record id cannot change".to_string()));
            }
        }
        changes.insert(
            "updated_at".to_string(),
            JsonValue::String(Utc::now().to_rfc3339()),
        );

        let row = sqlx::query(
            r#"
            UPDATE records
            SET data = data || $3::jsonb, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING data
            "#,
        )
        .bind(collection.as_str())
        .bind(id.as_str())
        .bind(JsonValue::Object(changes))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?
        .ok_or_else(|| not_found(collection, id))?;

        decode_row(&row)
    }

    #[instrument(skip(self), fields(collection = %collection, id = %id), err)]
    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    #[instrument(skip(self, options), fields(collection = %collection), err)]
    async fn list(&self, collection: Collection, options: &ListOptions) -> Result<ListResult, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT data, COUNT(*) OVER() AS total FROM records WHERE collection = ");
        qb.push_bind(collection.as_str());

        for filter in &options.filters {
            match filter.op {
                FilterOp::Like | FilterOp::Ilike => {
                    let Some(pattern) = filter.value.as_str() else {
                        return Err(StoreError::InvalidRecord(format!(
                            "pattern filter on '{}' needs a string value",
                            filter.field
                        )));
                    };
                    qb.push(" AND data ->> ");
                    qb.push_bind(filter.field.clone());
                    qb.push(if filter.op == FilterOp::Like { " LIKE " } else { " ILIKE " });
                    qb.push_bind(pattern.to_string());
                }
                op => {
                    let sql_op = match op {
                        FilterOp::Eq => " = ",
                        FilterOp::Neq => " <> ",
                        FilterOp::Gt => " > ",
                        FilterOp::Gte => " >= ",
                        FilterOp::Lt => " < ",
                        _ => " <= ",
                    };
                    qb.push(" AND data -> ");
                    qb.push_bind(filter.field.clone());
                    qb.push(sql_op);
                    qb.push_bind(filter.value.clone());
                    qb.push("::jsonb");
                }
            }
        }

        match &options.order_by {
            Some(order) => {
                qb.push(" ORDER BY data -> ");
                qb.push_bind(order.field.clone());
                qb.push(match order.direction {
                    Direction::Asc => " ASC NULLS LAST",
                    Direction::Desc => " DESC NULLS LAST",
                });
            }
            None => {
                qb.push(" ORDER BY created_at ASC");
            }
        }

        let (offset, mut take) = match options.range {
            Some((from, to)) if to >= from => (from, Some(to - from + 1)),
            Some((from, _)) => (from, Some(0)),
            None => (0, None),
        };
        if let Some(limit) = options.limit {
            take = Some(take.map_or(limit, |t| t.min(limit)));
        }
        if let Some(take) = take {
            qb.push(" LIMIT ");
            qb.push_bind(take as i64);
        }
        if offset > 0 {
            qb.push(" OFFSET ");
            qb.push_bind(offset as i64);
        }

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;

        let mut count = 0usize;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let total: i64 = row
                .try_get("total")
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            count = total.max(0) as usize;
            records.push(decode_row(row)?);
        }

        if needs_count_fallback(rows.is_empty(), offset, take) {
            count = self.count(collection, options).await?;
        }

        Ok(ListResult { records, count })
    }
}

/// `COUNT(*) OVER()` rides on the returned rows; an empty page (past the end,
/// or `limit(0)`) carries no count even when rows match.
fn needs_count_fallback(page_is_empty: bool, offset: usize, take: Option<usize>) -> bool {
    page_is_empty && (offset > 0 || take == Some(0))
}

impl PostgresRecordStore {
    #[instrument(skip(self), fields(collection = %collection, id = %id), err)]
    async fn find(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query("SELECT data FROM records WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("read", e))?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn count(&self, collection: Collection, options: &ListOptions) -> Result<usize, StoreError> {
        let unpaged = ListOptions {
            filters: options.filters.clone(),
            order_by: None,
            limit: None,
            range: None,
        };
        Ok(self.list(collection, &unpaged).await?.count)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => StoreError::Storage(format!("connection pool closed in {}", operation)),
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pages_fall_back_to_a_plain_count() {
        assert!(needs_count_fallback(true, 0, Some(0)));
        assert!(needs_count_fallback(true, 20, Some(10)));
        assert!(needs_count_fallback(true, 20, None));
        assert!(!needs_count_fallback(true, 0, Some(10)));
        assert!(!needs_count_fallback(true, 0, None));
        assert!(!needs_count_fallback(false, 0, Some(0)));
    }

    /// Runs against a real database when `CLINICFLOW_TEST_DATABASE_URL` is set.
    #[tokio::test]
    async fn missing_record_is_not_found_and_zero_limit_still_counts() {
        let Ok(url) = std::env::var("CLINICFLOW_TEST_DATABASE_URL") else {
            return;
        };
        let store = PostgresRecordStore::connect(&url).await.unwrap();

        let err = store
            .read(Collection::Campaigns, &RecordId::generate())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let mut record = Record::new();
        record.insert("name".to_string(), serde_json::json!("Black Friday"));
        let created = store.create(Collection::Campaigns, record).await.unwrap();

        let page = store
            .list(Collection::Campaigns, &ListOptions::new().limit(0))
            .await
            .unwrap();
        assert!(page.records.is_empty());
        assert!(page.count >= 1);

        let id = record_id(&created).unwrap();
        store.delete(Collection::Campaigns, &id).await.unwrap();
    }
}
