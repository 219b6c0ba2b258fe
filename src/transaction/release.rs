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
use crate::{Transaction, TransactionOutcome};
use tracing::{debug, warn};

/// Defers lock release until the enclosing transaction has completed.
///
/// A lease released before the protected writes become visible would let the
/// next holder read stale data, so the release action is attached to the
/// transaction and runs after commit. On rollback it runs as soon as the
/// rollback completes; without a transaction it runs immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitDeferredRelease;

impl CommitDeferredRelease {
    pub fn new() -> Self {
        Self
    }

    pub fn on_critical_section_complete<F>(&self, transaction: Option<&mut Transaction>, release: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match transaction {
            Some(transaction) => {
                let id = transaction.id().to_string();
                transaction.register_after_completion(move |outcome| {
                    match outcome {
                        TransactionOutcome::Committed => {
                            debug!("Transaction {} committed, releasing lock", id)
                        }
                        TransactionOutcome::RolledBack => {
                            warn!("Transaction {} rolled back, releasing lock", id)
                        }
                    }
                    release();
                });
            }
            None => release(),
        }
    }
}
