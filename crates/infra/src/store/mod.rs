//! Owner-scoped document storage.
//!
//! Every document lives under `(owner, key)` and carries a store-assigned
//! version: a missing document is at version 0 and each successful write bumps
//! it by one. Writes state an [`ExpectedVersion`]; `Exact(0)` inserts,
//! `Exact(n)` is a compare-and-set, `Any` is a blind upsert.

pub mod in_memory;
pub mod postgres;

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agrolog_activities::{ActivityId, TemplateId};
use agrolog_core::{ExpectedVersion, OwnerId};
use agrolog_inventory::InventoryItemId;
use agrolog_purchasing::{PurchaseId, SupplierId};

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Version check failed or a uniqueness constraint was hit.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("document not found")]
    NotFound,

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A stored value together with its current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<V> {
    pub version: u64,
    pub value: V,
}

/// Key type usable as a document id.
pub trait DocumentKey: Clone + Eq + Hash + Send + Sync + 'static {
    fn storage_key(&self) -> String;
}

impl DocumentKey for String {
    fn storage_key(&self) -> String {
        self.clone()
    }
}

macro_rules! impl_document_key {
    ($($t:ty),+ $(,)?) => {
        $(
            impl DocumentKey for $t {
                fn storage_key(&self) -> String {
                    self.0.to_string()
                }
            }
        )+
    };
}

impl_document_key!(ActivityId, TemplateId, InventoryItemId, SupplierId, PurchaseId);

#[async_trait]
pub trait DocumentStore<K, V>: Send + Sync {
    async fn get(&self, owner_id: OwnerId, key: &K) -> Result<Option<Versioned<V>>, StoreError>;

    async fn list(&self, owner_id: OwnerId) -> Result<Vec<Versioned<V>>, StoreError>;

    /// Write `value` if the stored version matches `expected`; returns the new version.
    async fn put(
        &self,
        owner_id: OwnerId,
        key: K,
        value: V,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError>;

    /// Hard delete. Returns whether a document was removed.
    async fn delete(&self, owner_id: OwnerId, key: &K) -> Result<bool, StoreError>;
}

#[async_trait]
impl<K, V, S> DocumentStore<K, V> for Arc<S>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: DocumentStore<K, V> + ?Sized,
{
    async fn get(&self, owner_id: OwnerId, key: &K) -> Result<Option<Versioned<V>>, StoreError> {
        (**self).get(owner_id, key).await
    }

    async fn list(&self, owner_id: OwnerId) -> Result<Vec<Versioned<V>>, StoreError> {
        (**self).list(owner_id).await
    }

    async fn put(
        &self,
        owner_id: OwnerId,
        key: K,
        value: V,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        (**self).put(owner_id, key, value, expected).await
    }

    async fn delete(&self, owner_id: OwnerId, key: &K) -> Result<bool, StoreError> {
        (**self).delete(owner_id, key).await
    }
}

pub(crate) fn version_conflict(expected: ExpectedVersion, actual: u64) -> StoreError {
    StoreError::Conflict(format!(
        "optimistic concurrency check failed (expected: {expected:?}, actual: {actual})"
    ))
}
