//! Inventory ledger: item storage plus the append-only movement journal.
//!
//! ## Write path
//!
//! ```text
//! RecordMovement
//!   ↓
//! 1. Load item + version (owner-scoped)
//!   ↓
//! 2. Decide (pure `InventoryItem::handle`: unit conversion, balance check)
//!   ↓
//! 3. Commit item CAS (Exact(version)) + movement append atomically
//!   ↓  conflict? → back to 1 (bounded)
//! 4. Return updated item + movement
//! ```
//!
//! A concurrent writer always bumps the item version first, so a stale
//! decision can never be committed and no add/subtract is lost.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use agrolog_core::{Aggregate, DomainError, ExpectedVersion, OwnerId, RecordId};
use agrolog_inventory::{
    InventoryCommand, InventoryItem, InventoryItemId, InventoryMovement, ItemDetailsPatch,
    MovementQuery, NewInventoryItem, RecordMovement,
};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{StoreError, Versioned};

pub use in_memory::InMemoryMovementJournal;
pub use postgres::PostgresMovementJournal;

pub const DEFAULT_MAX_RETRIES: u32 = 16;

/// Storage for inventory items and their movements.
///
/// `commit` must write the item (under `expected`) and append `movements` as
/// one atomic step: either both are visible or neither is.
#[async_trait]
pub trait MovementJournal: Send + Sync {
    async fn load_item(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
    ) -> Result<Option<Versioned<InventoryItem>>, StoreError>;

    async fn list_items(&self, owner_id: OwnerId) -> Result<Vec<Versioned<InventoryItem>>, StoreError>;

    async fn commit(
        &self,
        item: &InventoryItem,
        expected: ExpectedVersion,
        movements: &[InventoryMovement],
    ) -> Result<u64, StoreError>;

    /// Removes the item only; its movements stay in the journal.
    async fn delete_item(&self, owner_id: OwnerId, item_id: InventoryItemId) -> Result<bool, StoreError>;

    /// Movements matching `query`; each item's movements come in sequence order.
    async fn movements(
        &self,
        owner_id: OwnerId,
        query: &MovementQuery,
    ) -> Result<Vec<InventoryMovement>, StoreError>;
}

#[async_trait]
impl<J> MovementJournal for Arc<J>
where
    J: MovementJournal + ?Sized,
{
    async fn load_item(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
    ) -> Result<Option<Versioned<InventoryItem>>, StoreError> {
        (**self).load_item(owner_id, item_id).await
    }

    async fn list_items(&self, owner_id: OwnerId) -> Result<Vec<Versioned<InventoryItem>>, StoreError> {
        (**self).list_items(owner_id).await
    }

    async fn commit(
        &self,
        item: &InventoryItem,
        expected: ExpectedVersion,
        movements: &[InventoryMovement],
    ) -> Result<u64, StoreError> {
        (**self).commit(item, expected, movements).await
    }

    async fn delete_item(&self, owner_id: OwnerId, item_id: InventoryItemId) -> Result<bool, StoreError> {
        (**self).delete_item(owner_id, item_id).await
    }

    async fn movements(
        &self,
        owner_id: OwnerId,
        query: &MovementQuery,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        (**self).movements(owner_id, query).await
    }
}

/// Executes inventory writes with optimistic concurrency and bounded retry.
#[derive(Clone)]
pub struct InventoryLedger {
    journal: Arc<dyn MovementJournal>,
    max_retries: u32,
}

impl InventoryLedger {
    pub fn new(journal: Arc<dyn MovementJournal>, max_retries: u32) -> Self {
        Self {
            journal,
            max_retries,
        }
    }

    /// Create an item; a positive opening quantity is committed together with its movement.
    #[instrument(skip(self, input), fields(owner_id = %owner_id), err)]
    pub async fn create_item(
        &self,
        owner_id: OwnerId,
        input: NewInventoryItem,
    ) -> ServiceResult<(InventoryItem, Option<InventoryMovement>)> {
        let item_id = InventoryItemId::new(RecordId::new());
        let (item, opening) = InventoryItem::create(owner_id, item_id, input, Utc::now())?;
        let movements: Vec<InventoryMovement> = opening.iter().cloned().collect();
        self.journal
            .commit(&item, ExpectedVersion::Exact(0), &movements)
            .await?;
        tracing::info!(item_id = %item_id, "inventory item created");
        Ok((item, opening))
    }

    pub async fn get_item(&self, owner_id: OwnerId, item_id: InventoryItemId) -> ServiceResult<InventoryItem> {
        self.journal
            .load_item(owner_id, item_id)
            .await?
            .map(|v| v.value)
            .ok_or_else(ServiceError::not_found)
    }

    /// All items of an owner, ordered by name.
    pub async fn list_items(&self, owner_id: OwnerId) -> ServiceResult<Vec<InventoryItem>> {
        let mut items: Vec<InventoryItem> = self
            .journal
            .list_items(owner_id)
            .await?
            .into_iter()
            .map(|v| v.value)
            .collect();
        items.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        Ok(items)
    }

    /// Update descriptive fields. Retries on concurrent writes like movements do.
    #[instrument(skip(self, patch), fields(owner_id = %owner_id, item_id = %item_id), err)]
    pub async fn update_details(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
        patch: ItemDetailsPatch,
    ) -> ServiceResult<InventoryItem> {
        for attempt in 0..=self.max_retries {
            let current = self
                .journal
                .load_item(owner_id, item_id)
                .await?
                .ok_or_else(ServiceError::not_found)?;
            let mut item = current.value;
            item.update_details(patch.clone(), Utc::now())?;

            match self
                .journal
                .commit(&item, ExpectedVersion::Exact(current.version), &[])
                .await
            {
                Ok(_) => return Ok(item),
                Err(StoreError::Conflict(msg)) => {
                    tracing::debug!(attempt, %msg, "item update conflicted; retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(retries_exhausted(item_id))
    }

    pub async fn delete_item(&self, owner_id: OwnerId, item_id: InventoryItemId) -> ServiceResult<()> {
        if self.journal.delete_item(owner_id, item_id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found())
        }
    }

    /// Apply one movement: load, decide, commit with CAS, retry on conflict.
    ///
    /// Rejections (insufficient stock, unit mismatch, validation) write nothing.
    #[instrument(
        skip(self, cmd),
        fields(
            owner_id = %cmd.owner_id,
            item_id = %cmd.item_id,
            operation = ?cmd.operation,
            amount = %cmd.amount,
            unit = %cmd.unit
        ),
        err
    )]
    pub async fn record_movement(
        &self,
        mut cmd: RecordMovement,
    ) -> ServiceResult<(InventoryItem, InventoryMovement)> {
        let (owner_id, item_id) = (cmd.owner_id, cmd.item_id);

        for attempt in 0..=self.max_retries {
            let current = self
                .journal
                .load_item(owner_id, item_id)
                .await?
                .ok_or_else(ServiceError::not_found)?;

            // Stamp after the load so a retried movement never predates the one it lost to.
            cmd.occurred_at = Utc::now();
            let command = InventoryCommand::RecordMovement(cmd.clone());

            let mut item = current.value;
            let movements = match item.handle(&command) {
                Ok(m) => m,
                Err(e @ DomainError::InsufficientStock { .. }) => {
                    tracing::info!(error = %e, "movement rejected");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };
            for m in &movements {
                item.apply(m);
            }

            match self
                .journal
                .commit(&item, ExpectedVersion::Exact(current.version), &movements)
                .await
            {
                Ok(_) => {
                    let movement = movements.into_iter().next().ok_or_else(|| {
                        ServiceError::Domain(DomainError::invariant("no movement produced"))
                    })?;
                    tracing::debug!(
                        sequence = movement.sequence,
                        balance_after = %movement.balance_after,
                        "movement recorded"
                    );
                    return Ok((item, movement));
                }
                Err(StoreError::Conflict(msg)) => {
                    tracing::debug!(attempt, %msg, "movement conflicted; retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(retries_exhausted(item_id))
    }

    pub async fn movements(
        &self,
        owner_id: OwnerId,
        query: &MovementQuery,
    ) -> ServiceResult<Vec<InventoryMovement>> {
        Ok(self.journal.movements(owner_id, query).await?)
    }
}

fn retries_exhausted(item_id: InventoryItemId) -> ServiceError {
    tracing::warn!(item_id = %item_id, "gave up after repeated write conflicts");
    ServiceError::Domain(DomainError::conflict(format!(
        "item {item_id} is being modified concurrently; try again"
    )))
}
