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
use crate::util::{get_lock_id, instant_after, owner_id};
use crate::{LockInterrupt, LockService, LockWatchdog, StockLockError, StockLockResult};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const WAIT_SLICE: Duration = Duration::from_millis(10);

struct LockEntry {
    owner: String,
    count: u32,
    // None when the lease reaches past any representable instant
    expires_at: Option<Instant>,
}

impl LockEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Default)]
struct LockTable {
    locks: Mutex<HashMap<String, LockEntry>>,
    released: Condvar,
}

impl LockTable {
    fn evict_expired(locks: &mut HashMap<String, LockEntry>, key: &str, now: Instant) {
        if locks.get(key).is_some_and(|entry| entry.is_expired(now)) {
            locks.remove(key);
        }
    }
}

/// In-process reentrant lock service.
///
/// Waiters park on a condition variable signalled by unlock instead of
/// polling. Clones share the same lock table but keep their own client id,
/// so two clones behave like two independent processes.
pub struct MemoryLockService {
    table: Arc<LockTable>,
    client_id: String,
    watchdog_timeout: Duration,
    watchdogs: Mutex<HashMap<(String, String), LockWatchdog>>,
}

impl MemoryLockService {
    pub fn new(watchdog_timeout: Duration) -> Self {
        Self {
            table: Arc::new(LockTable::default()),
            client_id: get_lock_id(),
            watchdog_timeout,
            watchdogs: Mutex::new(HashMap::new()),
        }
    }

    /// Another client attached to the same lock table.
    pub fn new_client(&self) -> Self {
        Self {
            table: self.table.clone(),
            client_id: get_lock_id(),
            watchdog_timeout: self.watchdog_timeout,
            watchdogs: Mutex::new(HashMap::new()),
        }
    }

    fn start_watchdog(&self, key: &str, owner: &str) {
        let table = self.table.clone();
        let lock_key = key.to_string();
        let lock_owner = owner.to_string();
        let lease = self.watchdog_timeout;

        let watchdog = LockWatchdog::start(key, lease / 3, move || {
            let mut locks = table.locks.lock();
            match locks.get_mut(&lock_key) {
                Some(entry) if entry.owner == lock_owner => {
                    entry.expires_at = instant_after(Instant::now(), lease);
                    true
                }
                _ => false,
            }
        });
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

impl LockService for MemoryLockService {
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
        let mut locks = self.table.locks.lock();

        loop {
            if interrupt.is_interrupted() {
                return Err(StockLockError::InterruptedWait(key.to_string()));
            }

            let now = Instant::now();
            LockTable::evict_expired(&mut locks, key, now);

            match locks.get_mut(key) {
                None => {
                    locks.insert(
                        key.to_string(),
                        LockEntry {
                            owner: owner.clone(),
                            count: 1,
                            expires_at: instant_after(now, lease),
                        },
                    );
                    drop(locks);
                    if lease_time.is_none() {
                        self.start_watchdog(key, &owner);
                    }
                    debug!("Lock {} acquired by {}", key, owner);
                    return Ok(true);
                }
                Some(entry) if entry.owner == owner => {
                    entry.count += 1;
                    entry.expires_at = instant_after(now, lease);
                    return Ok(true);
                }
                Some(entry) => {
                    if deadline.is_some_and(|deadline| now >= deadline) {
                        return Ok(false);
                    }
                    let wake_at = [deadline, entry.expires_at]
                        .into_iter()
                        .flatten()
                        .fold(now + WAIT_SLICE, Instant::min);
                    self.table.released.wait_until(&mut locks, wake_at);
                }
            }
        }
    }

    fn is_held_by_current_owner(&self, key: &str) -> StockLockResult<bool> {
        let owner = self.current_owner();
        let mut locks = self.table.locks.lock();
        LockTable::evict_expired(&mut locks, key, Instant::now());
        Ok(locks.get(key).is_some_and(|entry| entry.owner == owner))
    }

    fn unlock(&self, key: &str) -> StockLockResult<bool> {
        let owner = self.current_owner();
        let mut locks = self.table.locks.lock();
        LockTable::evict_expired(&mut locks, key, Instant::now());

        let remaining = match locks.get_mut(key) {
            Some(entry) if entry.owner == owner => {
                entry.count -= 1;
                entry.count
            }
            _ => {
                warn!("Unlock of {} by {} ignored: not the holder", key, owner);
                return Ok(false);
            }
        };

        if remaining == 0 {
            locks.remove(key);
            drop(locks);
            self.table.released.notify_all();
            self.stop_watchdog(key, &owner);
        }
        Ok(true)
    }

    fn force_unlock(&self, key: &str) -> StockLockResult<bool> {
        let removed = self.table.locks.lock().remove(key);
        self.table.released.notify_all();
        if let Some(entry) = &removed {
            self.stop_watchdog(key, &entry.owner);
        }
        Ok(removed.is_some())
    }

    fn is_locked(&self, key: &str) -> StockLockResult<bool> {
        Ok(self.remaining_time(key)?.is_some())
    }

    fn remaining_time(&self, key: &str) -> StockLockResult<Option<Duration>> {
        let now = Instant::now();
        let mut locks = self.table.locks.lock();
        LockTable::evict_expired(&mut locks, key, now);
        Ok(locks
            .get(key)
            .map(|entry| match entry.expires_at {
                Some(expires_at) => expires_at.saturating_duration_since(now),
                None => Duration::MAX,
            }))
    }

    fn current_owner(&self) -> String {
        owner_id(&self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn create_test_service() -> Arc<MemoryLockService> {
        Arc::new(MemoryLockService::new(Duration::from_millis(90)))
    }

    fn lock_on_other_thread(
        service: &Arc<MemoryLockService>,
        key: &str,
        wait_time: Duration,
        lease_time: Option<Duration>,
    ) -> StockLockResult<bool> {
        let service = service.clone();
        let key = key.to_string();
        thread::spawn(move || service.try_lock(&key, wait_time, lease_time, &LockInterrupt::new()))
            .join()
            .unwrap()
    }

    #[test]
    fn test_reentrant_lock() {
        let service = create_test_service();
        let interrupt = LockInterrupt::new();
        let lease = Some(Duration::from_secs(2));

        assert!(service.try_lock("LOCK:1", Duration::ZERO, lease, &interrupt).unwrap());
        assert!(service.try_lock("LOCK:1", Duration::ZERO, lease, &interrupt).unwrap());
        assert!(service.is_held_by_current_owner("LOCK:1").unwrap());

        assert!(service.unlock("LOCK:1").unwrap());
        assert!(service.is_locked("LOCK:1").unwrap());
        assert!(service.unlock("LOCK:1").unwrap());
        assert!(!service.is_locked("LOCK:1").unwrap());
        assert!(!service.unlock("LOCK:1").unwrap());
    }

    #[test]
    fn test_partial_unlock_keeps_fixed_lease() {
        let service = create_test_service();
        let interrupt = LockInterrupt::new();
        let lease = Some(Duration::from_millis(500));

        assert!(service.try_lock("LOCK:1", Duration::ZERO, lease, &interrupt).unwrap());
        assert!(service.try_lock("LOCK:1", Duration::ZERO, lease, &interrupt).unwrap());
        assert!(service.unlock("LOCK:1").unwrap());

        let remaining = service.remaining_time("LOCK:1").unwrap().unwrap();
        assert!(remaining <= Duration::from_millis(500));
        assert!(service.unlock("LOCK:1").unwrap());
    }

    #[test]
    fn test_unbounded_wait_and_lease() {
        let service = create_test_service();
        assert!(service
            .try_lock("LOCK:1", Duration::MAX, Some(Duration::MAX), &LockInterrupt::new())
            .unwrap());
        assert_eq!(service.remaining_time("LOCK:1").unwrap(), Some(Duration::MAX));

        let waiter = {
            let service = service.clone();
            thread::spawn(move || {
                let acquired = service
                    .try_lock("LOCK:1", Duration::MAX, Some(Duration::from_secs(1)), &LockInterrupt::new())
                    .unwrap();
                service.unlock("LOCK:1").unwrap();
                acquired
            })
        };
        thread::sleep(Duration::from_millis(30));
        assert!(service.unlock("LOCK:1").unwrap());
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_owner_is_per_thread() {
        let service = create_test_service();
        assert!(service
            .try_lock("LOCK:1", Duration::ZERO, Some(Duration::from_secs(2)), &LockInterrupt::new())
            .unwrap());

        let other = service.clone();
        let (held_elsewhere, unlocked_elsewhere) = thread::spawn(move || {
            (
                other.is_held_by_current_owner("LOCK:1").unwrap(),
                other.unlock("LOCK:1").unwrap(),
            )
        })
        .join()
        .unwrap();
        assert!(!held_elsewhere);
        assert!(!unlocked_elsewhere);
        assert!(service.is_held_by_current_owner("LOCK:1").unwrap());
    }

    #[test]
    fn test_zero_wait_fails_immediately() {
        let service = create_test_service();
        assert!(service
            .try_lock("LOCK:1", Duration::ZERO, Some(Duration::from_secs(2)), &LockInterrupt::new())
            .unwrap());

        let start = Instant::now();
        let acquired =
            lock_on_other_thread(&service, "LOCK:1", Duration::ZERO, Some(Duration::from_secs(2)))
                .unwrap();
        assert!(!acquired);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_waiter_wakes_on_unlock() {
        let service = create_test_service();
        assert!(service
            .try_lock("LOCK:1", Duration::ZERO, Some(Duration::from_secs(2)), &LockInterrupt::new())
            .unwrap());

        let waiter = {
            let service = service.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let acquired = service
                    .try_lock("LOCK:1", Duration::from_secs(2), Some(Duration::from_secs(2)), &LockInterrupt::new())
                    .unwrap();
                service.unlock("LOCK:1").unwrap();
                (acquired, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(30));
        assert!(service.unlock("LOCK:1").unwrap());

        let (acquired, waited) = waiter.join().unwrap();
        assert!(acquired);
        assert!(waited < Duration::from_secs(1));
    }

    #[test]
    fn test_lease_expires_without_unlock() {
        let service = create_test_service();
        assert!(lock_on_other_thread(&service, "LOCK:1", Duration::ZERO, Some(Duration::from_millis(40))).unwrap());

        let start = Instant::now();
        assert!(service
            .try_lock("LOCK:1", Duration::from_secs(1), Some(Duration::from_secs(1)), &LockInterrupt::new())
            .unwrap());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_watchdog_extends_lease() {
        let service = create_test_service();
        assert!(service
            .try_lock("LOCK:1", Duration::ZERO, None, &LockInterrupt::new())
            .unwrap());

        // Three times the watchdog timeout
        thread::sleep(Duration::from_millis(270));
        assert!(service.is_held_by_current_owner("LOCK:1").unwrap());
        assert!(!lock_on_other_thread(&service, "LOCK:1", Duration::ZERO, None).unwrap());

        assert!(service.unlock("LOCK:1").unwrap());
        assert!(!service.is_locked("LOCK:1").unwrap());
    }

    #[test]
    fn test_separate_clients_share_table() {
        let first = MemoryLockService::new(Duration::from_secs(1));
        let second = first.new_client();
        let interrupt = LockInterrupt::new();

        assert!(first.try_lock("LOCK:1", Duration::ZERO, Some(Duration::from_secs(2)), &interrupt).unwrap());
        assert!(!second.try_lock("LOCK:1", Duration::ZERO, Some(Duration::from_secs(2)), &interrupt).unwrap());
        assert!(!second.is_held_by_current_owner("LOCK:1").unwrap());
        assert!(second.force_unlock("LOCK:1").unwrap());
        assert!(!first.is_held_by_current_owner("LOCK:1").unwrap());
    }

    #[test]
    fn test_interrupted_wait() {
        let service = create_test_service();
        assert!(service
            .try_lock("LOCK:1", Duration::ZERO, Some(Duration::from_secs(5)), &LockInterrupt::new())
            .unwrap());

        let interrupt = LockInterrupt::new();
        let waiter = {
            let service = service.clone();
            let interrupt = interrupt.clone();
            thread::spawn(move || {
                service.try_lock("LOCK:1", Duration::from_secs(5), Some(Duration::from_secs(5)), &interrupt)
            })
        };
        thread::sleep(Duration::from_millis(30));
        interrupt.interrupt();

        assert!(matches!(
            waiter.join().unwrap(),
            Err(StockLockError::InterruptedWait(_))
        ));
    }
}
