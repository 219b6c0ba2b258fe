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
use crate::config::SpinLockConfig;
use crate::util::{get_lock_id, jitter_delay};
use crate::{
    DistributedLock, LeaseHandle, LeaseStore, LockInterrupt, LockKey, StockLockError,
    StockLockResult,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Polling lock on top of a [`LeaseStore`].
///
/// Each acquisition writes a fresh random token, and release deletes the key
/// only while it still holds that token, so a holder whose lease expired can
/// never remove a lease that was meanwhile granted to someone else.
///
/// With the default configuration `acquire` polls until it succeeds; the
/// lease TTL is then the only backstop against a holder that never releases.
/// Set [`SpinLockConfig::max_wait`] to bound the wait.
pub struct SpinLock {
    store: Arc<dyn LeaseStore>,
    config: SpinLockConfig,
}

impl SpinLock {
    pub fn new(store: Arc<dyn LeaseStore>, config: SpinLockConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SpinLockConfig {
        &self.config
    }

    /// Remove the lease whoever holds it.
    pub fn force_release(&self, key: &LockKey) -> StockLockResult<bool> {
        let deleted = self.store.delete(key.as_str())?;
        warn!("Lease {} force released: {}", key, deleted);
        Ok(deleted)
    }

    pub fn is_locked(&self, key: &LockKey) -> StockLockResult<bool> {
        Ok(self.store.ttl(key.as_str())?.is_some())
    }
}

impl DistributedLock for SpinLock {
    fn acquire_interruptibly(
        &self,
        key: &LockKey,
        interrupt: &LockInterrupt,
    ) -> StockLockResult<LeaseHandle> {
        let token = get_lock_id();
        let start_time = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            if interrupt.is_interrupted() {
                return Err(StockLockError::InterruptedWait(key.to_string()));
            }

            attempts += 1;
            match self
                .store
                .try_create(key.as_str(), &token, self.config.lease_ttl)
            {
                Ok(true) => {
                    debug!("Lease {} acquired after {} attempts", key, attempts);
                    return Ok(LeaseHandle::new(
                        key.clone(),
                        token,
                        Some(self.config.lease_ttl),
                    ));
                }
                Ok(false) => debug!("Lease {} busy, retrying ({})", key, attempts),
                // Fail closed: an unreachable store never grants the lease
                Err(e) if e.is_store_unavailable() => {
                    warn!("Lease store unavailable while acquiring {}: {}", key, e)
                }
                Err(e) => return Err(e),
            }

            if let Some(max_wait) = self.config.max_wait {
                if start_time.elapsed() >= max_wait {
                    return Err(StockLockError::LockUnavailable(format!(
                        "{} not acquired within {:?} ({} attempts)",
                        key, max_wait, attempts
                    )));
                }
            }

            let delay = jitter_delay(self.config.retry_interval, self.config.retry_jitter_ms);
            if !interrupt.sleep(delay) {
                return Err(StockLockError::InterruptedWait(key.to_string()));
            }
        }
    }

    fn release(&self, mut handle: LeaseHandle) -> bool {
        match self
            .store
            .delete_if_matches(handle.key().as_str(), handle.owner())
        {
            Ok(true) => {
                handle.mark_released();
                info!("Lease {} released", handle.key());
                true
            }
            Ok(false) => {
                warn!(
                    "Lease {} was not released: already expired or reassigned",
                    handle.key()
                );
                false
            }
            Err(e) => {
                warn!("Failed to release lease {}: {}", handle.key(), e);
                false
            }
        }
    }
}
