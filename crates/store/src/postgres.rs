//! PostgreSQL-backed document store.
//!
//! Every document is a row of the `documents` table (see `migrations/`).
//! Read-modify-write operations lock the row with `SELECT ... FOR UPDATE`
//! inside a transaction; plain writes are last-write-wins upserts.

use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    Deletion, Direction, DocumentStore, FilterOp, Query, StoreError, StoredDocument, apply_array_remove,
    apply_array_union, merge_values, require_object,
};

/// Document store over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn upsert(
        conn: &mut PgConnection,
        collection: &str,
        key: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(data)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn lock(
        conn: &mut PgConnection,
        collection: &str,
        key: &str,
    ) -> Result<Option<Value>, StoreError> {
        let row: Option<(Value,)> = sqlx::query_as(
            "SELECT data FROM documents WHERE collection = $1 AND key = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(|(data,)| data))
    }

    /// Lock an existing document, apply `f` and write it back in one transaction.
    async fn update_existing<F>(&self, collection: &str, key: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Value) -> Result<(), StoreError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut doc = Self::lock(&mut *tx, collection, key)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;
        f(&mut doc)?;
        Self::upsert(&mut *tx, collection, key, &doc).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Append one filter condition to a `WHERE` clause.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, field: &str, op: FilterOp, value: &Value) {
    match (op, value) {
        (FilterOp::ArrayContains, value) => {
            qb.push("jsonb_typeof(data -> ")
                .push_bind(field.to_string())
                .push(") = 'array' AND data -> ")
                .push_bind(field.to_string())
                .push(" @> ")
                .push_bind(json!([value]));
        }
        (FilterOp::Eq, value) => {
            qb.push("data -> ")
                .push_bind(field.to_string())
                .push(" = ")
                .push_bind(value.clone());
        }
        (op, Value::Number(n)) => {
            qb.push("jsonb_typeof(data -> ")
                .push_bind(field.to_string())
                .push(") = 'number' AND (data ->> ")
                .push_bind(field.to_string())
                .push(")::float8 ")
                .push(op.sql())
                .push(" ")
                .push_bind(n.as_f64().unwrap_or(f64::NAN));
        }
        (op, Value::String(s)) => {
            qb.push("jsonb_typeof(data -> ")
                .push_bind(field.to_string())
                .push(") = 'string' AND (data ->> ")
                .push_bind(field.to_string())
                .push(") COLLATE \"C\" ")
                .push(op.sql())
                .push(" ")
                .push_bind(s.clone());
        }
        (op, Value::Bool(b)) => {
            qb.push("jsonb_typeof(data -> ")
                .push_bind(field.to_string())
                .push(") = 'boolean' AND (data ->> ")
                .push_bind(field.to_string())
                .push(")::boolean ")
                .push(op.sql())
                .push(" ")
                .push_bind(*b);
        }
        // Range comparison against null/array/object never matches.
        _ => {
            qb.push("FALSE");
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND key = $2")
                .bind(collection)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(data,)| data))
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        require_object(&data)?;
        let key = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, key, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&key)
            .bind(&data)
            .execute(&self.pool)
            .await?;
        Ok(key)
    }

    async fn set(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError> {
        require_object(&data)?;
        let mut conn = self.pool.acquire().await?;
        Self::upsert(&mut *conn, collection, key, &data).await
    }

    async fn merge(&self, collection: &str, key: &str, data: Value) -> Result<(), StoreError> {
        require_object(&data)?;
        let mut tx = self.pool.begin().await?;
        let merged = match Self::lock(&mut *tx, collection, key).await? {
            Some(mut existing) => {
                merge_values(&mut existing, data);
                existing
            }
            None => data,
        };
        Self::upsert(&mut *tx, collection, key, &merged).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn array_union(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        values: &[Value],
    ) -> Result<(), StoreError> {
        self.update_existing(collection, key, |doc| {
            apply_array_union(doc, field, values)
        })
        .await
    }

    async fn array_remove(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        values: &[Value],
    ) -> Result<(), StoreError> {
        self.update_existing(collection, key, |doc| {
            apply_array_remove(doc, field, values)
        })
        .await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_collection(&self, collection: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(collection)
            .execute(&self.pool)
            .await?;

        tracing::debug!(collection, deleted = result.rows_affected(), "Collection cleared");
        Ok(result.rows_affected())
    }

    async fn delete_batch(&self, deletions: &[Deletion]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for deletion in deletions {
            let result = match deletion {
                Deletion::Document { collection, key } => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
                        .bind(collection)
                        .bind(key)
                        .execute(&mut *tx)
                        .await?
                }
                Deletion::Collection(collection) => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1")
                        .bind(collection)
                        .execute(&mut *tx)
                        .await?
                }
            };
            removed += result.rows_affected();
        }
        tx.commit().await?;

        tracing::debug!(steps = deletions.len(), removed, "Batch delete committed");
        Ok(removed)
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT key, data FROM documents WHERE collection = $1 ORDER BY key")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(key, data)| StoredDocument { key, data })
            .collect())
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT key, data FROM documents WHERE collection = ");
        qb.push_bind(collection.to_string());

        for filter in &query.filters {
            qb.push(" AND ");
            push_filter(&mut qb, &filter.field, filter.op, &filter.value);
        }

        match &query.order_by {
            Some((field, direction)) => {
                qb.push(" AND data -> ")
                    .push_bind(field.clone())
                    .push(" IS NOT NULL ORDER BY data -> ")
                    .push_bind(field.clone())
                    .push(match direction {
                        Direction::Ascending => " ASC",
                        Direction::Descending => " DESC",
                    })
                    .push(", key ASC");
            }
            None => {
                qb.push(" ORDER BY key ASC");
            }
        }

        let rows: Vec<(String, Value)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(key, data)| StoredDocument { key, data })
            .collect())
    }
}
