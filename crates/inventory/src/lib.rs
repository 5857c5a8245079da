//! Inventory domain module.
//!
//! Business rules for stock items and their movement ledger, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod movement;

pub use item::{
    InventoryCommand, InventoryItem, InventoryItemId, ItemCategory, ItemDetailsPatch,
    NewInventoryItem, RecordMovement,
};
pub use movement::{InventoryMovement, MovementModule, MovementOperation, MovementQuery, verify_trail};
