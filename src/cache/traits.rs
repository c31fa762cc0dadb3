//! Core traits for the caching system.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;

/// Source of the current time, injected so expiry can be tested.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Key/value backing store with per-entry time-to-live.
///
/// Expiry is passive: `get` and `has` treat an entry inserted at `T` with
/// TTL `d` as live while `now < T + d`. Nothing sweeps expired entries; the
/// next `put` under the same key replaces them.
pub trait CacheStore: Send + Sync {
  /// Fetch the raw bytes stored under `key`, if present and unexpired.
  fn get(&self, key: &str) -> Option<Vec<u8>>;

  /// Store `data` under `key`, overwriting any previous entry.
  /// Returns false when the backend could not persist the entry.
  fn put(&self, key: &str, data: &[u8], ttl: Duration) -> bool;

  fn has(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  /// Drop every entry.
  fn clear(&self) -> Result<()>;

  /// Backend name for logging.
  fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod test_support {
  use super::*;
  use std::sync::Mutex;

  /// Clock that only moves when told to.
  pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
  }

  impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
      Self {
        now: Mutex::new(start),
      }
    }

    pub fn advance(&self, by: Duration) {
      let mut now = self.now.lock().unwrap();
      *now += by;
    }
  }

  impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
      *self.now.lock().unwrap()
    }
  }
}
