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
use crate::errors::{StockLockError, StockLockResult};
use crate::{Stock, StockRepository, Transaction};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-memory [`StockRepository`].
///
/// Reads see committed state only. `save` enlists the write on the
/// transaction, so nothing becomes visible before commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStockRepository {
    records: Arc<RwLock<HashMap<u64, Stock>>>,
}

impl MemoryStockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `stock` directly, outside any transaction.
    pub fn insert(&self, stock: Stock) {
        self.records.write().insert(stock.id, stock);
    }

    pub fn get(&self, id: u64) -> Option<Stock> {
        self.records.read().get(&id).copied()
    }

    pub fn delete_all(&self) {
        self.records.write().clear();
    }

    fn ensure_active(transaction: &Transaction) -> StockLockResult<()> {
        if transaction.is_active() {
            Ok(())
        } else {
            Err(StockLockError::TransactionError(format!(
                "transaction {} is no longer active",
                transaction.id()
            )))
        }
    }
}

impl StockRepository for MemoryStockRepository {
    fn find_by_id(&self, transaction: &Transaction, id: u64) -> StockLockResult<Option<Stock>> {
        Self::ensure_active(transaction)?;
        Ok(self.get(id))
    }

    fn save(&self, transaction: &mut Transaction, stock: Stock) -> StockLockResult<()> {
        let records = self.records.clone();
        let tx_id = transaction.id().to_string();
        transaction.enlist_write(move || {
            records.write().insert(stock.id, stock);
            debug!("Stock {} persisted by {}: quantity={}", stock.id, tx_id, stock.quantity);
            Ok(())
        })
    }
}
