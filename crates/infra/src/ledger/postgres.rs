//! Postgres-backed movement journal.
//!
//! Items live in the shared `documents` table (collection `inventory_items`);
//! movements are rows of `inventory_movements`. A commit runs the item CAS and
//! the movement inserts in one transaction, so either both land or neither.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use agrolog_core::{AggregateRoot, ExpectedVersion, OwnerId};
use agrolog_inventory::{InventoryItem, InventoryItemId, InventoryMovement, MovementQuery};

use super::MovementJournal;
use crate::db::map_sqlx_error;
use crate::store::postgres::{decode_body, encode_body};
use crate::store::{DocumentStore, PostgresDocumentStore, StoreError, Versioned};

pub const ITEMS_COLLECTION: &str = "inventory_items";

pub struct PostgresMovementJournal {
    pool: PgPool,
    items: PostgresDocumentStore<InventoryItemId, InventoryItem>,
}

impl PostgresMovementJournal {
    pub fn new(pool: PgPool) -> Self {
        Self {
            items: PostgresDocumentStore::new(pool.clone(), ITEMS_COLLECTION),
            pool,
        }
    }
}

async fn write_item(
    tx: &mut Transaction<'_, Postgres>,
    item: &InventoryItem,
    expected: ExpectedVersion,
) -> Result<Option<i64>, StoreError> {
    let body = encode_body(item)?;
    let owner = item.owner_id();
    let id = item.id_typed().0.to_string();

    match expected {
        ExpectedVersion::Exact(0) => sqlx::query_scalar(
            r#"
            INSERT INTO documents (collection, owner_id, id, version, body)
            VALUES ($1, $2, $3, 1, $4)
            ON CONFLICT (collection, owner_id, id) DO NOTHING
            RETURNING version
            "#,
        )
        .bind(ITEMS_COLLECTION)
        .bind(owner.as_uuid())
        .bind(&id)
        .bind(&body)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e)),

        ExpectedVersion::Exact(n) => sqlx::query_scalar(
            r#"
            UPDATE documents
            SET version = version + 1, body = $5, updated_at = now()
            WHERE collection = $1 AND owner_id = $2 AND id = $3 AND version = $4
            RETURNING version
            "#,
        )
        .bind(ITEMS_COLLECTION)
        .bind(owner.as_uuid())
        .bind(&id)
        .bind(n as i64)
        .bind(&body)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e)),

        ExpectedVersion::Any => sqlx::query_scalar(
            r#"
            INSERT INTO documents (collection, owner_id, id, version, body)
            VALUES ($1, $2, $3, 1, $4)
            ON CONFLICT (collection, owner_id, id)
            DO UPDATE SET version = documents.version + 1, body = EXCLUDED.body, updated_at = now()
            RETURNING version
            "#,
        )
        .bind(ITEMS_COLLECTION)
        .bind(owner.as_uuid())
        .bind(&id)
        .bind(&body)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_item", e)),
    }
}

async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    m: &InventoryMovement,
) -> Result<(), StoreError> {
    let body = encode_body(m)?;
    let module = m
        .module
        .map(|module| encode_body(&module))
        .transpose()?
        .and_then(|v| v.as_str().map(str::to_string));

    sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            id, owner_id, item_id, sequence, module, day, activity_id, body, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(m.id.as_uuid())
    .bind(m.owner_id.as_uuid())
    .bind(m.item_id.0.as_uuid())
    .bind(m.sequence as i64)
    .bind(module)
    .bind(m.day)
    .bind(m.activity_id.map(|id| *id.as_uuid()))
    .bind(&body)
    .bind(m.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    Ok(())
}

#[async_trait]
impl MovementJournal for PostgresMovementJournal {
    async fn load_item(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
    ) -> Result<Option<Versioned<InventoryItem>>, StoreError> {
        self.items.get(owner_id, &item_id).await
    }

    async fn list_items(&self, owner_id: OwnerId) -> Result<Vec<Versioned<InventoryItem>>, StoreError> {
        self.items.list(owner_id).await
    }

    #[instrument(
        skip(self, item, movements),
        fields(
            owner_id = %item.owner_id(),
            item_id = %item.id_typed(),
            expected = ?expected,
            movement_count = movements.len()
        ),
        err
    )]
    async fn commit(
        &self,
        item: &InventoryItem,
        expected: ExpectedVersion,
        movements: &[InventoryMovement],
    ) -> Result<u64, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let Some(version) = write_item(&mut tx, item, expected).await? else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Conflict(format!(
                "item {} changed concurrently (expected: {expected:?})",
                item.id_typed()
            )));
        };

        for m in movements {
            // A unique violation on (owner, item, sequence) surfaces as Conflict.
            insert_movement(&mut tx, m).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(version as u64)
    }

    async fn delete_item(&self, owner_id: OwnerId, item_id: InventoryItemId) -> Result<bool, StoreError> {
        self.items.delete(owner_id, &item_id).await
    }

    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    async fn movements(
        &self,
        owner_id: OwnerId,
        query: &MovementQuery,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        let module = query
            .module
            .map(|module| encode_body(&module))
            .transpose()?
            .and_then(|v| v.as_str().map(str::to_string));

        let rows = sqlx::query(
            r#"
            SELECT body
            FROM inventory_movements
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR item_id = $2)
              AND ($3::uuid IS NULL OR activity_id = $3)
              AND ($4::text IS NULL OR module = $4)
              AND ($5::date IS NULL OR day = $5)
            ORDER BY item_id ASC, sequence ASC
            "#,
        )
        .bind(owner_id.as_uuid())
        .bind(query.item_id.map(|id| *id.0.as_uuid()))
        .bind(query.activity_id.map(|id| *id.as_uuid()))
        .bind(module)
        .bind(query.day)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter()
            .map(|row| {
                let body: serde_json::Value = row
                    .try_get("body")
                    .map_err(|e| StoreError::Backend(format!("failed to read body: {e}")))?;
                decode_body(body)
            })
            .collect()
    }
}
