//! Short-lived read cache for assembled list results.
//!
//! - `CacheStore` is the injected key/value backend (memory, SQLite or none)
//! - `CacheService<T>` is the typed view one resource client owns
//! - Expiry is passive and checked at read time

mod service;
mod storage;
mod traits;

use sha2::{Digest, Sha256};

pub use service::CacheService;
pub use storage::{MemoryStore, NoopStore, SqliteStore};
pub use traits::{CacheStore, SystemClock};

#[cfg(test)]
pub use traits::test_support;

/// Default time-to-live for cached lists, in seconds.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Stable, short namespace for one API account (endpoint + key).
pub fn account_namespace(endpoint: &str, api_key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(endpoint.trim_end_matches('/').as_bytes());
  hasher.update(b"\n");
  hasher.update(api_key.as_bytes());
  let digest = hex::encode(hasher.finalize());
  digest[..16].to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_account_namespace_is_stable_and_distinct() {
    let a = account_namespace("https://api.mailersend.com/v1", "key-a");
    assert_eq!(a.len(), 16);
    assert_eq!(a, account_namespace("https://api.mailersend.com/v1/", "key-a"));
    assert_ne!(a, account_namespace("https://api.mailersend.com/v1", "key-b"));
  }
}
