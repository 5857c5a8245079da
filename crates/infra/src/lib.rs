//! Infrastructure layer: storage, the inventory ledger, config, and external services.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod rate_limit;
pub mod store;
pub mod waitlist;

pub use config::{AppConfig, ConfigError};
pub use error::{ServiceError, ServiceResult};
pub use ledger::{InMemoryMovementJournal, InventoryLedger, MovementJournal, PostgresMovementJournal};
pub use store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, StoreError, Versioned};
