use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use agrolog_core::{ExpectedVersion, OwnerId};

use super::{DocumentKey, DocumentStore, StoreError, Versioned, version_conflict};

/// In-memory owner-scoped store for tests/dev.
#[derive(Debug)]
pub struct InMemoryDocumentStore<K, V> {
    inner: RwLock<HashMap<(OwnerId, K), Versioned<V>>>,
}

impl<K, V> InMemoryDocumentStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryDocumentStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl<K, V> DocumentStore<K, V> for InMemoryDocumentStore<K, V>
where
    K: DocumentKey,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, owner_id: OwnerId, key: &K) -> Result<Option<Versioned<V>>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&(owner_id, key.clone())).cloned())
    }

    async fn list(&self, owner_id: OwnerId) -> Result<Vec<Versioned<V>>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter_map(|((o, _k), v)| if *o == owner_id { Some(v.clone()) } else { None })
            .collect())
    }

    async fn put(
        &self,
        owner_id: OwnerId,
        key: K,
        value: V,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let slot = (owner_id, key);
        let current = map.get(&slot).map(|v| v.version).unwrap_or(0);
        if !expected.matches(current) {
            return Err(version_conflict(expected, current));
        }
        let version = current + 1;
        map.insert(slot, Versioned { version, value });
        Ok(version)
    }

    async fn delete(&self, owner_id: OwnerId, key: &K) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.remove(&(owner_id, key.clone())).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn versions_start_at_one_and_cas_is_enforced() {
        let store: InMemoryDocumentStore<String, u32> = InMemoryDocumentStore::new();
        let owner = OwnerId::new();
        let key = "a".to_string();

        assert_eq!(store.put(owner, key.clone(), 1, ExpectedVersion::Exact(0)).await, Ok(1));
        assert!(matches!(
            store.put(owner, key.clone(), 2, ExpectedVersion::Exact(0)).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.put(owner, key.clone(), 2, ExpectedVersion::Exact(1)).await, Ok(2));
        assert_eq!(store.put(owner, key.clone(), 3, ExpectedVersion::Any).await, Ok(3));

        let got = store.get(owner, &key).await.unwrap().unwrap();
        assert_eq!(got, Versioned { version: 3, value: 3 });
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let store: InMemoryDocumentStore<String, u32> = InMemoryDocumentStore::new();
        let (a, b) = (OwnerId::new(), OwnerId::new());
        store.put(a, "k".to_string(), 1, ExpectedVersion::Any).await.unwrap();

        assert!(store.get(b, &"k".to_string()).await.unwrap().is_none());
        assert!(store.list(b).await.unwrap().is_empty());
        assert!(!store.delete(b, &"k".to_string()).await.unwrap());
        assert_eq!(store.list(a).await.unwrap().len(), 1);
        assert!(store.delete(a, &"k".to_string()).await.unwrap());
    }
}
