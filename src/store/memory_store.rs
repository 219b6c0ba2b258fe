/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use crate::util::instant_after;
use crate::{LeaseStore, StockLockResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct StoredLease {
    token: String,
    // None when the ttl reaches past any representable instant
    expires_at: Option<Instant>,
}

/// In-process lease store.
///
/// Expired leases are evicted lazily on access. Useful for tests and for
/// deployments where every contender shares one process.
#[derive(Default)]
pub struct MemoryLeaseStore {
    leases: Mutex<HashMap<String, StoredLease>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token stored under `key`, if the lease is live.
    pub fn token(&self, key: &str) -> Option<String> {
        let mut leases = self.leases.lock();
        Self::evict_expired(&mut leases, key);
        leases.get(key).map(|lease| lease.token.clone())
    }

    fn evict_expired(leases: &mut HashMap<String, StoredLease>, key: &str) {
        if leases
            .get(key)
            .and_then(|lease| lease.expires_at)
            .is_some_and(|expires_at| expires_at <= Instant::now())
        {
            leases.remove(key);
        }
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn try_create(&self, key: &str, token: &str, ttl: Duration) -> StockLockResult<bool> {
        let mut leases = self.leases.lock();
        Self::evict_expired(&mut leases, key);
        if leases.contains_key(key) {
            return Ok(false);
        }
        leases.insert(
            key.to_string(),
            StoredLease {
                token: token.to_string(),
                expires_at: instant_after(Instant::now(), ttl),
            },
        );
        Ok(true)
    }

    fn delete(&self, key: &str) -> StockLockResult<bool> {
        let mut leases = self.leases.lock();
        Self::evict_expired(&mut leases, key);
        Ok(leases.remove(key).is_some())
    }

    fn delete_if_matches(&self, key: &str, token: &str) -> StockLockResult<bool> {
        let mut leases = self.leases.lock();
        Self::evict_expired(&mut leases, key);
        match leases.get(key) {
            Some(lease) if lease.token == token => {
                leases.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn ttl(&self, key: &str) -> StockLockResult<Option<Duration>> {
        let mut leases = self.leases.lock();
        Self::evict_expired(&mut leases, key);
        Ok(leases
            .get(key)
            .map(|lease| match lease.expires_at {
                Some(expires_at) => expires_at.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_try_create_only_if_absent() {
        let store = MemoryLeaseStore::new();
        assert!(store.try_create("LOCK:1", "a", Duration::from_secs(3)).unwrap());
        assert!(!store.try_create("LOCK:1", "b", Duration::from_secs(3)).unwrap());
        assert_eq!(store.token("LOCK:1").as_deref(), Some("a"));
        assert!(store.try_create("LOCK:2", "b", Duration::from_secs(3)).unwrap());
    }

    #[test]
    fn test_delete_reports_presence() {
        let store = MemoryLeaseStore::new();
        assert!(!store.delete("LOCK:1").unwrap());
        store.try_create("LOCK:1", "a", Duration::from_secs(3)).unwrap();
        assert!(store.delete("LOCK:1").unwrap());
        assert!(store.ttl("LOCK:1").unwrap().is_none());
    }

    #[test]
    fn test_delete_if_matches_checks_token() {
        let store = MemoryLeaseStore::new();
        store.try_create("LOCK:1", "a", Duration::from_secs(3)).unwrap();
        assert!(!store.delete_if_matches("LOCK:1", "b").unwrap());
        assert!(store.token("LOCK:1").is_some());
        assert!(store.delete_if_matches("LOCK:1", "a").unwrap());
        assert!(store.token("LOCK:1").is_none());
    }

    #[test]
    fn test_lease_expires() {
        let store = MemoryLeaseStore::new();
        store.try_create("LOCK:1", "a", Duration::from_millis(30)).unwrap();
        assert!(store.ttl("LOCK:1").unwrap().unwrap() <= Duration::from_millis(30));

        thread::sleep(Duration::from_millis(60));
        assert!(store.ttl("LOCK:1").unwrap().is_none());
        assert!(!store.delete_if_matches("LOCK:1", "a").unwrap());
        assert!(store.try_create("LOCK:1", "b", Duration::from_secs(3)).unwrap());
    }

    #[test]
    fn test_unbounded_ttl_never_expires() {
        let store = MemoryLeaseStore::new();
        assert!(store.try_create("LOCK:1", "a", Duration::MAX).unwrap());
        assert_eq!(store.ttl("LOCK:1").unwrap(), Some(Duration::MAX));
        assert!(!store.try_create("LOCK:1", "b", Duration::from_secs(3)).unwrap());
        assert!(store.delete_if_matches("LOCK:1", "a").unwrap());
    }
}
