//! Memoizes external research responses, keyed by a SHA-256 of the query.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tally_core::Money;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hex digest over (merchant token, amount, strategy). The strategy is part
    /// of the key so two providers never read each other's answers.
    pub fn new(merchant_token: &str, amount: Money, strategy: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(merchant_token.as_bytes());
        hasher.update([0x1f]);
        hasher.update(amount.to_string().as_bytes());
        hasher.update([0x1f]);
        hasher.update(strategy.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        CacheKey(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub strategy: String,
    pub confidence: f64,
    pub hit_count: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

type Slot = Arc<Mutex<CacheEntry>>;

/// Entries are individually locked; inserting a new key is the only
/// operation that takes the map's write lock.
#[derive(Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, Slot>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.get_at(key, Utc::now())
    }

    /// A live entry has its hit counter bumped; an expired one is a miss and
    /// is left untouched.
    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        let slot = self.read_map().get(key).cloned()?;
        let mut entry = lock(&slot);
        if entry.is_expired(now) {
            return None;
        }
        entry.hit_count += 1;
        Some(entry.clone())
    }

    pub fn put(
        &self,
        key: CacheKey,
        payload: serde_json::Value,
        strategy: &str,
        confidence: f64,
        ttl: Duration,
    ) {
        self.put_at(key, payload, strategy, confidence, ttl, Utc::now());
    }

    /// Stores or replaces the entry for `key`; a replaced entry restarts its
    /// hit count.
    pub fn put_at(
        &self,
        key: CacheKey,
        payload: serde_json::Value,
        strategy: &str,
        confidence: f64,
        ttl: Duration,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            payload,
            strategy: strategy.to_string(),
            confidence,
            hit_count: 0,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let existing = self.read_map().get(&key).cloned();
        if let Some(slot) = existing {
            *lock(&slot) = entry;
            return;
        }
        self.write_map()
            .entry(key)
            .and_modify(|slot| *lock(slot) = entry.clone())
            .or_insert_with(|| Arc::new(Mutex::new(entry.clone())));
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut map = self.write_map();
        let before = map.len();
        map.retain(|_, slot| !lock(slot).is_expired(now));
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CacheKey, Slot>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<CacheKey, Slot>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock(slot: &Mutex<CacheEntry>) -> std::sync::MutexGuard<'_, CacheEntry> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
