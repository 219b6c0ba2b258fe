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
use crate::config::ManagedLockConfig;
use crate::{
    DistributedLock, LeaseHandle, LockInterrupt, LockKey, LockService, StockLockError,
    StockLockResult,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Bounded-wait lock delegating to a [`LockService`].
///
/// Unlike [`crate::SpinLock`] this never waits past `wait_time`: an exhausted
/// wait fails with `LockUnavailable`. Release is skipped when the calling
/// thread no longer owns the lease.
pub struct ManagedLock {
    service: Arc<dyn LockService>,
    config: ManagedLockConfig,
}

impl ManagedLock {
    pub fn new(service: Arc<dyn LockService>, config: ManagedLockConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &ManagedLockConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<dyn LockService> {
        &self.service
    }

    /// Acquire with an explicit wait, overriding the configured one.
    pub fn acquire_with_wait(
        &self,
        key: &LockKey,
        wait_time: Duration,
        interrupt: &LockInterrupt,
    ) -> StockLockResult<LeaseHandle> {
        let available =
            self.service
                .try_lock(key.as_str(), wait_time, self.config.lease_time, interrupt)?;
        info!("Lock acquisition attempt: key={} | acquired={}", key, available);

        if !available {
            error!("Failed to acquire lock {} within {:?}", key, wait_time);
            return Err(StockLockError::LockUnavailable(key.to_string()));
        }

        Ok(LeaseHandle::new(
            key.clone(),
            self.service.current_owner(),
            self.config.lease_time,
        ))
    }
}

impl DistributedLock for ManagedLock {
    fn acquire_interruptibly(
        &self,
        key: &LockKey,
        interrupt: &LockInterrupt,
    ) -> StockLockResult<LeaseHandle> {
        self.acquire_with_wait(key, self.config.wait_time, interrupt)
    }

    fn release(&self, mut handle: LeaseHandle) -> bool {
        let key = handle.key().to_string();
        match self.service.is_held_by_current_owner(&key) {
            Ok(true) => match self.service.unlock(&key) {
                Ok(released) => {
                    handle.mark_released();
                    info!("Lock {} released", key);
                    released
                }
                Err(e) => {
                    warn!("Failed to unlock {}: {}", key, e);
                    false
                }
            },
            Ok(false) => {
                warn!("Lock {} no longer held by {}, skipping unlock", key, handle.owner());
                false
            }
            Err(e) => {
                warn!("Could not verify ownership of {}: {}", key, e);
                false
            }
        }
    }
}
