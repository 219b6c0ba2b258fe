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
use crate::util::num_milliseconds;
use crate::{scripts, LeaseStore, StockLockResult, SyncRedisConnectionManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Lease store backed by Redis `SET NX PX` / `DEL`.
pub struct RedisLeaseStore {
    connection_manager: Arc<SyncRedisConnectionManager>,
}

impl RedisLeaseStore {
    pub fn new(connection_manager: Arc<SyncRedisConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

impl LeaseStore for RedisLeaseStore {
    fn try_create(&self, key: &str, token: &str, ttl: Duration) -> StockLockResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(num_milliseconds(&ttl))
            .query(&mut *conn)?;

        let created = reply.is_some();
        debug!("SET NX {} -> {}", key, created);
        Ok(created)
    }

    fn delete(&self, key: &str) -> StockLockResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let deleted: i64 = redis::cmd("DEL").arg(key).query(&mut *conn)?;
        Ok(deleted > 0)
    }

    fn delete_if_matches(&self, key: &str, token: &str) -> StockLockResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let deleted: i64 = scripts::RELEASE_LEASE_SCRIPT
            .key(key)
            .arg(token)
            .invoke(&mut *conn)?;
        Ok(deleted > 0)
    }

    fn ttl(&self, key: &str) -> StockLockResult<Option<Duration>> {
        let mut conn = self.connection_manager.get_connection()?;
        let ttl_ms: i64 = redis::cmd("PTTL").arg(key).query(&mut *conn)?;

        // -2: missing key, -1: key without expiry
        Ok(match ttl_ms {
            -2 => None,
            -1 => Some(Duration::MAX),
            ms => Some(Duration::from_millis(u64::try_from(ms).unwrap_or(0))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;
    use crate::util::get_lock_id;

    fn create_test_store() -> RedisLeaseStore {
        let config = LockConfig::single_server("redis://127.0.0.1:6379").with_pool_size(2);
        RedisLeaseStore::new(Arc::new(SyncRedisConnectionManager::new(&config).unwrap()))
    }

    #[test]
    #[ignore = "requires redis at 127.0.0.1:6379"]
    fn test_set_if_absent_and_token_release() {
        let store = create_test_store();
        let key = format!("test:lease:{}", get_lock_id());

        assert!(store.try_create(&key, "a", Duration::from_secs(3)).unwrap());
        assert!(!store.try_create(&key, "b", Duration::from_secs(3)).unwrap());
        assert!(store.ttl(&key).unwrap().is_some());

        assert!(!store.delete_if_matches(&key, "b").unwrap());
        assert!(store.delete_if_matches(&key, "a").unwrap());
        assert!(store.ttl(&key).unwrap().is_none());
        assert!(!store.delete(&key).unwrap());
    }
}
