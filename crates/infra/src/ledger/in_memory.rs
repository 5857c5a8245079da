use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use agrolog_core::{AggregateRoot, ExpectedVersion, OwnerId};
use agrolog_inventory::{InventoryItem, InventoryItemId, InventoryMovement, MovementQuery};

use super::MovementJournal;
use crate::store::{StoreError, Versioned, version_conflict};

#[derive(Debug, Default)]
struct JournalState {
    items: HashMap<(OwnerId, InventoryItemId), Versioned<InventoryItem>>,
    movements: Vec<InventoryMovement>,
}

/// In-memory journal for tests/dev. One mutex covers items and movements, so a
/// commit is a single atomic step.
#[derive(Debug, Default)]
pub struct InMemoryMovementJournal {
    state: Mutex<JournalState>,
}

impl InMemoryMovementJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory journal lock poisoned".to_string())
}

#[async_trait]
impl MovementJournal for InMemoryMovementJournal {
    async fn load_item(
        &self,
        owner_id: OwnerId,
        item_id: InventoryItemId,
    ) -> Result<Option<Versioned<InventoryItem>>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.items.get(&(owner_id, item_id)).cloned())
    }

    async fn list_items(&self, owner_id: OwnerId) -> Result<Vec<Versioned<InventoryItem>>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state
            .items
            .iter()
            .filter_map(|((o, _), v)| if *o == owner_id { Some(v.clone()) } else { None })
            .collect())
    }

    async fn commit(
        &self,
        item: &InventoryItem,
        expected: ExpectedVersion,
        movements: &[InventoryMovement],
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let slot = (item.owner_id(), item.id_typed());
        let current = state.items.get(&slot).map(|v| v.version).unwrap_or(0);
        if !expected.matches(current) {
            return Err(version_conflict(expected, current));
        }
        let version = current + 1;
        state.items.insert(
            slot,
            Versioned {
                version,
                value: item.clone(),
            },
        );
        state.movements.extend_from_slice(movements);
        Ok(version)
    }

    async fn delete_item(&self, owner_id: OwnerId, item_id: InventoryItemId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.items.remove(&(owner_id, item_id)).is_some())
    }

    async fn movements(
        &self,
        owner_id: OwnerId,
        query: &MovementQuery,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.owner_id == owner_id && query.matches(m))
            .cloned()
            .collect())
    }
}
