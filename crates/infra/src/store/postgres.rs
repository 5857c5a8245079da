//! Postgres-backed document store.
//!
//! One `documents` table holds every collection as JSONB, keyed by
//! `(collection, owner_id, id)`. The `version` column implements the
//! optimistic-concurrency contract of [`DocumentStore`]:
//!
//! | expected | statement | zero rows affected |
//! |----------|-----------|--------------------|
//! | `Exact(0)` | `INSERT ... ON CONFLICT DO NOTHING` | `Conflict` (already exists) |
//! | `Exact(n)` | `UPDATE ... WHERE version = n` | `Conflict` (stale or missing) |
//! | `Any` | `INSERT ... ON CONFLICT DO UPDATE` | n/a |
//!
//! Unique-index violations (`23505`, e.g. duplicate template names) also map to
//! `Conflict`.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};
use tracing::instrument;

use agrolog_core::{ExpectedVersion, OwnerId};

use super::{DocumentKey, DocumentStore, StoreError, Versioned};
use crate::db::map_sqlx_error;

pub struct PostgresDocumentStore<K, V> {
    pool: PgPool,
    collection: &'static str,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> PostgresDocumentStore<K, V> {
    pub fn new(pool: PgPool, collection: &'static str) -> Self {
        Self {
            pool,
            collection,
            _marker: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }
}

pub(crate) fn decode_body<V: DeserializeOwned>(body: serde_json::Value) -> Result<V, StoreError> {
    serde_json::from_value(body).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn encode_body<V: Serialize>(value: &V) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn row_to_versioned<V: DeserializeOwned>(row: &sqlx::postgres::PgRow) -> Result<Versioned<V>, StoreError> {
    let version: i64 = row
        .try_get("version")
        .map_err(|e| StoreError::Backend(format!("failed to read version: {e}")))?;
    let body: serde_json::Value = row
        .try_get("body")
        .map_err(|e| StoreError::Backend(format!("failed to read body: {e}")))?;
    Ok(Versioned {
        version: version as u64,
        value: decode_body(body)?,
    })
}

#[async_trait]
impl<K, V> DocumentStore<K, V> for PostgresDocumentStore<K, V>
where
    K: DocumentKey,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[instrument(
        skip(self, key),
        fields(collection = self.collection, owner_id = %owner_id, id = %key.storage_key()),
        err
    )]
    async fn get(&self, owner_id: OwnerId, key: &K) -> Result<Option<Versioned<V>>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT version, body
            FROM documents
            WHERE collection = $1 AND owner_id = $2 AND id = $3
            "#,
        )
        .bind(self.collection)
        .bind(owner_id.as_uuid())
        .bind(key.storage_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_document", e))?;

        row.as_ref().map(row_to_versioned::<V>).transpose()
    }

    #[instrument(skip(self), fields(collection = self.collection, owner_id = %owner_id), err)]
    async fn list(&self, owner_id: OwnerId) -> Result<Vec<Versioned<V>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT version, body
            FROM documents
            WHERE collection = $1 AND owner_id = $2
            ORDER BY id ASC
            "#,
        )
        .bind(self.collection)
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_documents", e))?;

        rows.iter().map(row_to_versioned::<V>).collect()
    }

    #[instrument(
        skip(self, key, value),
        fields(collection = self.collection, owner_id = %owner_id, id = %key.storage_key(), expected = ?expected),
        err
    )]
    async fn put(
        &self,
        owner_id: OwnerId,
        key: K,
        value: V,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let body = encode_body(&value)?;
        let id = key.storage_key();

        let version: Option<i64> = match expected {
            ExpectedVersion::Exact(0) => sqlx::query_scalar(
                r#"
                INSERT INTO documents (collection, owner_id, id, version, body)
                VALUES ($1, $2, $3, 1, $4)
                ON CONFLICT (collection, owner_id, id) DO NOTHING
                RETURNING version
                "#,
            )
            .bind(self.collection)
            .bind(owner_id.as_uuid())
            .bind(&id)
            .bind(&body)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_document", e))?,

            ExpectedVersion::Exact(n) => sqlx::query_scalar(
                r#"
                UPDATE documents
                SET version = version + 1, body = $5, updated_at = now()
                WHERE collection = $1 AND owner_id = $2 AND id = $3 AND version = $4
                RETURNING version
                "#,
            )
            .bind(self.collection)
            .bind(owner_id.as_uuid())
            .bind(&id)
            .bind(n as i64)
            .bind(&body)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_document", e))?,

            ExpectedVersion::Any => sqlx::query_scalar(
                r#"
                INSERT INTO documents (collection, owner_id, id, version, body)
                VALUES ($1, $2, $3, 1, $4)
                ON CONFLICT (collection, owner_id, id)
                DO UPDATE SET version = documents.version + 1, body = EXCLUDED.body, updated_at = now()
                RETURNING version
                "#,
            )
            .bind(self.collection)
            .bind(owner_id.as_uuid())
            .bind(&id)
            .bind(&body)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert_document", e))?,
        };

        match version {
            Some(v) => Ok(v as u64),
            None => Err(StoreError::Conflict(format!(
                "optimistic concurrency check failed for {}/{} (expected: {expected:?})",
                self.collection, id
            ))),
        }
    }

    #[instrument(
        skip(self, key),
        fields(collection = self.collection, owner_id = %owner_id, id = %key.storage_key()),
        err
    )]
    async fn delete(&self, owner_id: OwnerId, key: &K) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND owner_id = $2 AND id = $3
            "#,
        )
        .bind(self.collection)
        .bind(owner_id.as_uuid())
        .bind(key.storage_key())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_document", e))?;

        Ok(result.rows_affected() > 0)
    }
}
