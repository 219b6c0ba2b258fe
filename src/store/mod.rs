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
mod memory_store;
mod redis_store;

pub use memory_store::*;
pub use redis_store::*;

use crate::StockLockResult;
use std::time::Duration;

/// Atomic primitives of the lock-authority store.
///
/// Implementations perform exactly one store round trip per call and never
/// retry. Transport failures surface as `StockLockError::StoreUnavailable`.
pub trait LeaseStore: Send + Sync {
    /// Create `key` holding `token` with the given expiry, only if absent.
    /// Returns true iff this call created the key.
    fn try_create(&self, key: &str, token: &str, ttl: Duration) -> StockLockResult<bool>;

    /// Remove `key` regardless of its value. Returns true iff a key was removed.
    fn delete(&self, key: &str) -> StockLockResult<bool>;

    /// Remove `key` only while it still holds `token`.
    fn delete_if_matches(&self, key: &str, token: &str) -> StockLockResult<bool>;

    /// Remaining lifetime of `key`, `None` when it does not exist.
    fn ttl(&self, key: &str) -> StockLockResult<Option<Duration>>;
}
