//! Typed per-resource cache service on top of a shared `CacheStore`.

use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::CacheStore;

/// Stores assembled collections of `T` under `{prefix}_{limit}_{page}` keys.
///
/// Every key is additionally scoped by an account namespace before it reaches
/// the store, so two API accounts never read each other's lists.
pub struct CacheService<T> {
  store: Arc<dyn CacheStore>,
  namespace: String,
  prefix: String,
  ttl: Duration,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> CacheService<T> {
  pub fn new(
    store: Arc<dyn CacheStore>,
    namespace: impl Into<String>,
    prefix: impl Into<String>,
    ttl: Duration,
  ) -> Self {
    Self {
      store,
      namespace: namespace.into(),
      prefix: prefix.into(),
      ttl,
      _marker: PhantomData,
    }
  }

  pub fn generate_key(&self, limit: i64, page: i64) -> String {
    format!("{}_{}_{}", self.prefix, limit, page)
  }

  fn store_key(&self, key: &str) -> String {
    format!("{}:{}", self.namespace, key)
  }

  pub fn get(&self, key: &str) -> Option<Vec<T>> {
    let data = self.store.get(&self.store_key(key))?;
    match serde_json::from_slice(&data) {
      Ok(items) => Some(items),
      Err(e) => {
        // Shape changed since the entry was written; refetch instead.
        warn!(key, error = %e, "discarding undecodable cache entry");
        None
      }
    }
  }

  pub fn put(&self, key: &str, items: &[T]) -> bool {
    let data = match serde_json::to_vec(items) {
      Ok(data) => data,
      Err(e) => {
        warn!(key, error = %e, "failed to serialize collection for cache");
        return false;
      }
    };
    let stored = self.store.put(&self.store_key(key), &data, self.ttl);
    debug!(
      key,
      count = items.len(),
      backend = self.store.backend_name(),
      stored,
      "cache write"
    );
    stored
  }

  pub fn has(&self, key: &str) -> bool {
    self.store.has(&self.store_key(key))
  }
}

impl<T> Clone for CacheService<T> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      namespace: self.namespace.clone(),
      prefix: self.prefix.clone(),
      ttl: self.ttl,
      _marker: PhantomData,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStore;
  use crate::cache::traits::test_support::ManualClock;
  use chrono::{TimeZone, Utc};
  use serde::Deserialize;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: String,
  }

  fn service(store: Arc<dyn CacheStore>, namespace: &str) -> CacheService<Item> {
    CacheService::new(store, namespace, "domains", Duration::seconds(300))
  }

  fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
      Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ))
  }

  #[test]
  fn test_generate_key_format() {
    let cache = service(Arc::new(MemoryStore::new(clock())), "acct");
    assert_eq!(cache.generate_key(2, 1), "domains_2_1");
    assert_eq!(cache.generate_key(100, 0), "domains_100_0");
  }

  #[test]
  fn test_put_then_get_preserves_order() {
    let cache = service(Arc::new(MemoryStore::new(clock())), "acct");
    let items = vec![
      Item { id: "d2".into() },
      Item { id: "d1".into() },
    ];
    let key = cache.generate_key(25, 0);

    assert!(!cache.has(&key));
    assert!(cache.put(&key, &items));
    assert!(cache.has(&key));
    assert_eq!(cache.get(&key), Some(items));
  }

  #[test]
  fn test_namespaces_are_isolated() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new(clock()));
    let first = service(store.clone(), "acct-a");
    let second = service(store, "acct-b");
    let key = first.generate_key(25, 0);

    first.put(&key, &[Item { id: "d1".into() }]);
    assert!(first.has(&key));
    assert!(!second.has(&key));
  }

  #[test]
  fn test_entry_expires_after_ttl() {
    let clock = clock();
    let cache = service(Arc::new(MemoryStore::new(clock.clone())), "acct");
    let key = cache.generate_key(25, 0);
    cache.put(&key, &[Item { id: "d1".into() }]);

    clock.advance(Duration::seconds(300));
    assert!(!cache.has(&key));
    assert_eq!(cache.get(&key), None);
  }

  #[test]
  fn test_undecodable_entry_is_a_miss() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new(clock()));
    store.put("acct:domains_25_0", b"not json", Duration::seconds(300));
    let cache = service(store, "acct");
    assert_eq!(cache.get("domains_25_0"), None);
  }
}
