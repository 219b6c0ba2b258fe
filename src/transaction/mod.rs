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
mod release;

pub use release::*;

use crate::errors::{StockLockError, StockLockResult};
use std::fmt::{Debug, Formatter};
use std::mem;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

type WriteAction = Box<dyn FnOnce() -> StockLockResult<()> + Send>;
type CompletionCallback = Box<dyn FnOnce(TransactionOutcome) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
}

/// How a transaction ended, as seen by completion callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
}

/// Transaction boundary passed explicitly through the call chain.
///
/// Resources enlist their writes, which are applied in enlistment order on
/// commit and discarded on rollback. Completion callbacks run exactly once,
/// after the writes are applied (commit) or discarded (rollback). Dropping an
/// active transaction rolls it back.
///
/// Commit is not atomic across writes: when a write fails, the remaining
/// writes are discarded and the transaction ends as rolled back, but writes
/// applied before the failure stay applied. A resource needing all-or-nothing
/// semantics must enlist its changes as a single write.
pub struct Transaction {
    id: String,
    status: TransactionStatus,
    started_at: Instant,
    writes: Vec<WriteAction>,
    callbacks: Vec<CompletionCallback>,
}

impl Transaction {
    pub fn begin() -> Self {
        let transaction = Self {
            id: Uuid::new_v4().to_string(),
            status: TransactionStatus::Active,
            started_at: Instant::now(),
            writes: Vec::new(),
            callbacks: Vec::new(),
        };
        debug!("Transaction {} started", transaction.id);
        transaction
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Stage a write to be applied when the transaction commits.
    pub fn enlist_write<F>(&mut self, write: F) -> StockLockResult<()>
    where
        F: FnOnce() -> StockLockResult<()> + Send + 'static,
    {
        if !self.is_active() {
            return Err(StockLockError::TransactionError(format!(
                "transaction {} is no longer active",
                self.id
            )));
        }
        self.writes.push(Box::new(write));
        Ok(())
    }

    /// Run `callback` once the transaction has committed. Dropped on rollback.
    pub fn register_after_commit<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.register_after_completion(move |outcome| {
            if outcome == TransactionOutcome::Committed {
                callback();
            }
        });
    }

    /// Run `callback` once the transaction ends, whatever the outcome. On an
    /// already completed transaction it runs immediately.
    pub fn register_after_completion<F>(&mut self, callback: F)
    where
        F: FnOnce(TransactionOutcome) + Send + 'static,
    {
        match self.status {
            TransactionStatus::Active => self.callbacks.push(Box::new(callback)),
            TransactionStatus::Committed => callback(TransactionOutcome::Committed),
            TransactionStatus::RolledBack => callback(TransactionOutcome::RolledBack),
        }
    }

    /// Apply the enlisted writes in order, then run the completion callbacks.
    ///
    /// The first failing write stops the commit with `TransactionError`;
    /// earlier writes are not undone.
    pub fn commit(mut self) -> StockLockResult<()> {
        if !self.is_active() {
            return Err(StockLockError::TransactionError(format!(
                "transaction {} already completed",
                self.id
            )));
        }

        for write in mem::take(&mut self.writes) {
            if let Err(e) = write() {
                error!("Transaction {} failed during commit: {}", self.id, e);
                self.finish(TransactionOutcome::RolledBack);
                return Err(StockLockError::TransactionError(format!(
                    "commit of {} failed: {}",
                    self.id, e
                )));
            }
        }

        debug!("Transaction {} committed in {:?}", self.id, self.elapsed());
        self.finish(TransactionOutcome::Committed);
        Ok(())
    }

    pub fn rollback(mut self) {
        if self.is_active() {
            debug!("Transaction {} rolled back", self.id);
            self.finish(TransactionOutcome::RolledBack);
        }
    }

    fn finish(&mut self, outcome: TransactionOutcome) {
        self.writes.clear();
        self.status = match outcome {
            TransactionOutcome::Committed => TransactionStatus::Committed,
            TransactionOutcome::RolledBack => TransactionStatus::RolledBack,
        };
        for callback in mem::take(&mut self.callbacks) {
            callback(outcome);
        }
    }
}

impl Debug for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("pending_writes", &self.writes.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            warn!("Transaction {} dropped while active, rolling back", self.id);
            self.finish(TransactionOutcome::RolledBack);
        }
    }
}
