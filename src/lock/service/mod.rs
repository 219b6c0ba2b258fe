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
mod memory_service;
mod redis_service;

pub use memory_service::*;
pub use redis_service::*;

use crate::{LockInterrupt, StockLockResult};
use std::time::Duration;

/// Reentrant lease service with owner tracking.
///
/// The owner is the calling thread of this service instance. Lease renewal,
/// when requested, is the service's responsibility.
pub trait LockService: Send + Sync {
    /// Try to obtain the lock for the calling thread, waiting at most
    /// `wait_time`. `lease_time = None` keeps the lease alive with a watchdog
    /// until [`LockService::unlock`].
    fn try_lock(
        &self,
        key: &str,
        wait_time: Duration,
        lease_time: Option<Duration>,
        interrupt: &LockInterrupt,
    ) -> StockLockResult<bool>;

    fn is_held_by_current_owner(&self, key: &str) -> StockLockResult<bool>;

    /// Drop one level of reentry for the calling thread. Returns false when
    /// the calling thread does not hold the lock.
    fn unlock(&self, key: &str) -> StockLockResult<bool>;

    /// Remove the lock whoever holds it.
    fn force_unlock(&self, key: &str) -> StockLockResult<bool>;

    fn is_locked(&self, key: &str) -> StockLockResult<bool>;

    fn remaining_time(&self, key: &str) -> StockLockResult<Option<Duration>>;

    /// Owner identity of the calling thread.
    fn current_owner(&self) -> String;
}
