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
use crate::util::{get_lock_id, instant_after, num_milliseconds, owner_id};
use crate::{
    scripts, LockInterrupt, LockService, LockWatchdog, StockLockError, StockLockResult,
    SyncRedisConnectionManager,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MIN_RETRY_PAUSE: Duration = Duration::from_millis(5);
const MAX_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Reentrant Redis lock: a hash per key mapping owner to reentry count.
pub struct RedisLockService {
    connection_manager: Arc<SyncRedisConnectionManager>,
    client_id: String,
    watchdog_timeout: Duration,
    watchdogs: Mutex<HashMap<(String, String), LockWatchdog>>,
}

impl RedisLockService {
    pub fn new(connection_manager: Arc<SyncRedisConnectionManager>, watchdog_timeout: Duration) -> Self {
        Self {
            connection_manager,
            client_id: get_lock_id(),
            watchdog_timeout,
            watchdogs: Mutex::new(HashMap::new()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn try_acquire_once(&self, key: &str, owner: &str, lease: Duration) -> StockLockResult<i64> {
        let mut conn = self.connection_manager.get_connection()?;
        let count: i64 = scripts::LOCK_SCRIPT
            .key(key)
            .arg(owner)
            .arg(num_milliseconds(&lease))
            .invoke(&mut *conn)?;
        Ok(count)
    }

    fn start_watchdog(&self, key: &str, owner: &str) {
        let connection_manager = self.connection_manager.clone();
        let lock_key = key.to_string();
        let lock_owner = owner.to_string();
        let lease_ms = num_milliseconds(&self.watchdog_timeout);

        let renew_func = move || match connection_manager.get_connection() {
            Ok(mut conn) => scripts::RENEW_SCRIPT
                .key(&lock_key)
                .arg(&lock_owner)
                .arg(lease_ms)
                .invoke::<i64>(&mut *conn)
                .map(|renewed| renewed == 1)
                .unwrap_or(false),
            Err(_) => false,
        };

        let watchdog = LockWatchdog::start(key, self.watchdog_timeout / 3, renew_func);
        if let Some(mut previous) = self
            .watchdogs
            .lock()
            .insert((key.to_string(), owner.to_string()), watchdog)
        {
            previous.stop();
        }
    }

    fn stop_watchdog(&self, key: &str, owner: &str) {
        let watchdog = self
            .watchdogs
            .lock()
            .remove(&(key.to_string(), owner.to_string()));
        if let Some(mut watchdog) = watchdog {
            watchdog.stop();
        }
    }
}

impl LockService for RedisLockService {
    fn try_lock(
        &self,
        key: &str,
        wait_time: Duration,
        lease_time: Option<Duration>,
        interrupt: &LockInterrupt,
    ) -> StockLockResult<bool> {
        let owner = self.current_owner();
        let lease = lease_time.unwrap_or(self.watchdog_timeout);
        let deadline = instant_after(Instant::now(), wait_time);

        loop {
            if interrupt.is_interrupted() {
                return Err(StockLockError::InterruptedWait(key.to_string()));
            }

            let count = self.try_acquire_once(key, &owner, lease)?;
            if count > 0 {
                if lease_time.is_none() && count == 1 {
                    self.start_watchdog(key, &owner);
                }
                debug!("Lock {} acquired by {} (count {})", key, owner, count);
                return Ok(true);
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return Ok(false);
            }

            // Wait no longer than the holder's remaining lease
            let holder_ttl = self.remaining_time(key)?.unwrap_or(MIN_RETRY_PAUSE);
            let pause = holder_ttl.clamp(MIN_RETRY_PAUSE, MAX_RETRY_PAUSE);
            let pause = deadline.map_or(pause, |deadline| pause.min(deadline - now));
            if !interrupt.sleep(pause) {
                return Err(StockLockError::InterruptedWait(key.to_string()));
            }
        }
    }

    fn is_held_by_current_owner(&self, key: &str) -> StockLockResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let held: bool = redis::cmd("HEXISTS")
            .arg(key)
            .arg(self.current_owner())
            .query(&mut *conn)?;
        Ok(held)
    }

    fn unlock(&self, key: &str) -> StockLockResult<bool> {
        let owner = self.current_owner();
        let mut conn = self.connection_manager.get_connection()?;
        let released: i64 = scripts::UNLOCK_SCRIPT
            .key(key)
            .arg(&owner)
            .invoke(&mut *conn)?;

        match released {
            -1 => {
                warn!("Unlock of {} by {} ignored: not the holder", key, owner);
                Ok(false)
            }
            0 => {
                self.stop_watchdog(key, &owner);
                Ok(true)
            }
            remaining => {
                debug!("Lock {} still entered {} times by {}", key, remaining, owner);
                Ok(true)
            }
        }
    }

    fn force_unlock(&self, key: &str) -> StockLockResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let deleted: i64 = redis::cmd("DEL").arg(key).query(&mut *conn)?;

        let stale: Vec<LockWatchdog> = {
            let mut watchdogs = self.watchdogs.lock();
            let keys: Vec<_> = watchdogs.keys().filter(|(k, _)| k == key).cloned().collect();
            keys.iter().filter_map(|k| watchdogs.remove(k)).collect()
        };
        drop(stale);

        Ok(deleted > 0)
    }

    fn is_locked(&self, key: &str) -> StockLockResult<bool> {
        let mut conn = self.connection_manager.get_connection()?;
        let exists: i64 = redis::cmd("EXISTS").arg(key).query(&mut *conn)?;
        Ok(exists > 0)
    }

    fn remaining_time(&self, key: &str) -> StockLockResult<Option<Duration>> {
        let mut conn = self.connection_manager.get_connection()?;
        let ttl_ms: i64 = redis::cmd("PTTL").arg(key).query(&mut *conn)?;
        Ok(u64::try_from(ttl_ms).ok().map(Duration::from_millis))
    }

    fn current_owner(&self) -> String {
        owner_id(&self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;

    fn create_test_service() -> RedisLockService {
        let config = LockConfig::single_server("redis://127.0.0.1:6379").with_pool_size(4);
        let manager = Arc::new(SyncRedisConnectionManager::new(&config).unwrap());
        RedisLockService::new(manager, Duration::from_secs(3))
    }

    #[test]
    #[ignore = "requires redis at 127.0.0.1:6379"]
    fn test_reentrant_lock_and_unlock() {
        let service = create_test_service();
        let key = format!("test:rlock:{}", get_lock_id());
        let interrupt = LockInterrupt::new();

        assert!(service
            .try_lock(&key, Duration::ZERO, Some(Duration::from_secs(2)), &interrupt)
            .unwrap());
        assert!(service
            .try_lock(&key, Duration::ZERO, Some(Duration::from_secs(2)), &interrupt)
            .unwrap());
        assert!(service.is_held_by_current_owner(&key).unwrap());

        assert!(service.unlock(&key).unwrap());
        assert!(service.is_locked(&key).unwrap());
        // A partial unlock keeps the lease the lock was taken with
        let remaining = service.remaining_time(&key).unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(2));
        assert!(service.unlock(&key).unwrap());
        assert!(!service.is_locked(&key).unwrap());
        assert!(!service.unlock(&key).unwrap());
    }

    #[test]
    #[ignore = "requires redis at 127.0.0.1:6379"]
    fn test_watchdog_keeps_lease_alive() {
        let service = create_test_service();
        let key = format!("test:rlock:{}", get_lock_id());

        assert!(service
            .try_lock(&key, Duration::ZERO, None, &LockInterrupt::new())
            .unwrap());
        std::thread::sleep(Duration::from_secs(4));
        assert!(service.is_held_by_current_owner(&key).unwrap());
        assert!(service.unlock(&key).unwrap());
    }
}
