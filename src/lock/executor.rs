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
use crate::{
    CommitDeferredRelease, DistributedLock, LeaseHandle, LockInterrupt, LockKey, StockLockResult,
    Transaction,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Runs closures under a distributed lock.
///
/// `execute_in_transaction` is the commit-safe form: the lease is released
/// only after the transaction handed to the task has committed or rolled
/// back.
/// Releases a lease when dropped, including while unwinding.
struct ReleaseOnDrop<'a, L: DistributedLock> {
    lock: &'a L,
    handle: Option<LeaseHandle>,
}

impl<L: DistributedLock> Drop for ReleaseOnDrop<'_, L> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.lock.release(handle);
        }
    }
}

pub struct DistributedLockExecutor<L: DistributedLock + 'static> {
    lock: Arc<L>,
    coordinator: CommitDeferredRelease,
}

impl<L: DistributedLock + 'static> Clone for DistributedLockExecutor<L> {
    fn clone(&self) -> Self {
        Self {
            lock: self.lock.clone(),
            coordinator: self.coordinator,
        }
    }
}

impl<L: DistributedLock + 'static> DistributedLockExecutor<L> {
    pub fn new(lock: Arc<L>) -> Self {
        Self {
            lock,
            coordinator: CommitDeferredRelease::new(),
        }
    }

    pub fn lock(&self) -> &Arc<L> {
        &self.lock
    }

    /// Acquire, run `task`, release. No transaction is involved.
    pub fn execute_with_lock<T, F>(&self, key: &LockKey, task: F) -> StockLockResult<T>
    where
        F: FnOnce() -> StockLockResult<T>,
    {
        let _guard = ReleaseOnDrop {
            lock: self.lock.as_ref(),
            handle: Some(self.lock.acquire(key)?),
        };
        task()
    }

    pub fn execute_in_transaction<T, F>(&self, key: &LockKey, task: F) -> StockLockResult<T>
    where
        F: FnOnce(&mut Transaction) -> StockLockResult<T>,
    {
        self.execute_in_transaction_interruptibly(key, &LockInterrupt::new(), task)
    }

    pub fn execute_in_transaction_interruptibly<T, F>(
        &self,
        key: &LockKey,
        interrupt: &LockInterrupt,
        task: F,
    ) -> StockLockResult<T>
    where
        F: FnOnce(&mut Transaction) -> StockLockResult<T>,
    {
        let handle = self.lock.acquire_interruptibly(key, interrupt)?;
        let mut transaction = Transaction::begin();
        debug!("Critical section {} entered in transaction {}", key, transaction.id());

        // Registered before the task runs so a panic still releases through
        // the transaction's drop-time rollback
        let lock = self.lock.clone();
        self.coordinator
            .on_critical_section_complete(Some(&mut transaction), move || {
                lock.release(handle);
            });

        let result = task(&mut transaction);

        match result {
            Ok(value) => {
                transaction.commit()?;
                info!("Transaction committed, lock {} released", key);
                Ok(value)
            }
            Err(e) => {
                transaction.rollback();
                Err(e)
            }
        }
    }

    /// Wrap `op` so every call derives its lock key from the argument and
    /// runs inside [`Self::execute_in_transaction`].
    pub fn wrap<A, T, K, F>(
        &self,
        key_fn: K,
        op: F,
    ) -> impl Fn(A) -> StockLockResult<T> + Send + Sync + 'static
    where
        A: 'static,
        T: 'static,
        K: Fn(&A) -> LockKey + Send + Sync + 'static,
        F: Fn(&mut Transaction, A) -> StockLockResult<T> + Send + Sync + 'static,
    {
        let executor = self.clone();
        move |arg: A| {
            let key = key_fn(&arg);
            executor.execute_in_transaction(&key, |transaction| op(transaction, arg))
        }
    }
}
