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
use crate::config::DEFAULT_KEY_PREFIX;
use crate::errors::StockLockResult;
use crate::{DistributedLock, DistributedLockExecutor, LockKey, ManagedLock, SpinLock, StockService};
use std::sync::Arc;

type LockedDecrease = Box<dyn Fn((u64, u64)) -> StockLockResult<()> + Send + Sync>;

/// Caller-facing stock API: every decrement runs under the record's lock and
/// the lock outlives the commit of the write.
pub struct StockFacade<L: DistributedLock + 'static> {
    executor: DistributedLockExecutor<L>,
    decrease: LockedDecrease,
}

pub type SpinLockStockFacade = StockFacade<SpinLock>;
pub type ManagedLockStockFacade = StockFacade<ManagedLock>;

impl<L: DistributedLock + 'static> StockFacade<L> {
    pub fn new(lock: Arc<L>, service: StockService) -> Self {
        Self::with_key_prefix(lock, service, DEFAULT_KEY_PREFIX)
    }

    pub fn with_key_prefix(lock: Arc<L>, service: StockService, key_prefix: &str) -> Self {
        let executor = DistributedLockExecutor::new(lock);
        let prefix = key_prefix.to_string();
        let decrease = executor.wrap(
            move |(resource_id, _): &(u64, u64)| LockKey::new(&prefix, resource_id),
            move |transaction, (resource_id, quantity): (u64, u64)| {
                service.decrease(transaction, resource_id, quantity).map(|_| ())
            },
        );
        Self {
            executor,
            decrease: Box::new(decrease),
        }
    }

    pub fn executor(&self) -> &DistributedLockExecutor<L> {
        &self.executor
    }

    pub fn decrease(&self, resource_id: u64, quantity: u64) -> StockLockResult<()> {
        (self.decrease)((resource_id, quantity))
    }
}
