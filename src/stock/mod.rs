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
mod facade;
mod repository;
mod service;

pub use facade::*;
pub use repository::*;
pub use service::*;

use crate::errors::{StockLockError, StockLockResult};
use crate::Transaction;
use serde::{Deserialize, Serialize};

/// Counter record guarded by the lock, keyed by resource id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: u64,
    pub quantity: u64,
}

impl Stock {
    pub fn new(id: u64, quantity: u64) -> Self {
        Self { id, quantity }
    }

    /// Subtract `amount`. The record is left untouched when it does not
    /// hold enough.
    pub fn decrease(&mut self, amount: u64) -> StockLockResult<()> {
        if self.quantity < amount {
            return Err(StockLockError::InsufficientQuantity {
                id: self.id,
                requested: amount,
                available: self.quantity,
            });
        }
        self.quantity -= amount;
        Ok(())
    }
}

/// Transactional record store for [`Stock`].
pub trait StockRepository: Send + Sync {
    fn find_by_id(&self, transaction: &Transaction, id: u64) -> StockLockResult<Option<Stock>>;

    /// Stage `stock` to be persisted when `transaction` commits.
    fn save(&self, transaction: &mut Transaction, stock: Stock) -> StockLockResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrease() {
        let mut stock = Stock::new(1, 10);
        stock.decrease(4).unwrap();
        assert_eq!(stock.quantity, 6);
        stock.decrease(6).unwrap();
        assert_eq!(stock.quantity, 0);
    }

    #[test]
    fn test_over_decrease_leaves_record_untouched() {
        let mut stock = Stock::new(7, 3);
        match stock.decrease(4) {
            Err(StockLockError::InsufficientQuantity {
                id,
                requested,
                available,
            }) => {
                assert_eq!((id, requested, available), (7, 4, 3));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(stock, Stock::new(7, 3));
    }

    #[test]
    fn test_serde() {
        let stock: Stock = serde_json::from_str(r#"{"id":1,"quantity":100}"#).unwrap();
        assert_eq!(stock, Stock::new(1, 100));
        assert_eq!(serde_json::to_string(&stock).unwrap(), r#"{"id":1,"quantity":100}"#);
    }
}
