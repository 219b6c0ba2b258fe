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
use std::sync::Arc;
use tracing::debug;

/// Read-check-write on one stock record. Must run under the record's lock.
#[derive(Clone)]
pub struct StockService {
    repository: Arc<dyn StockRepository>,
}

impl StockService {
    pub fn new(repository: Arc<dyn StockRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn StockRepository> {
        &self.repository
    }

    /// Decrement stock `id` by `quantity` within `transaction`, returning the
    /// staged record.
    pub fn decrease(
        &self,
        transaction: &mut Transaction,
        id: u64,
        quantity: u64,
    ) -> StockLockResult<Stock> {
        let mut stock = self
            .repository
            .find_by_id(transaction, id)?
            .ok_or(StockLockError::StockNotFound(id))?;

        stock.decrease(quantity)?;
        self.repository.save(transaction, stock)?;
        debug!("Stock {} decreased by {}, remaining {}", id, quantity, stock.quantity);
        Ok(stock)
    }
}
