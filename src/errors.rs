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
use redis::RedisError;
use thiserror::Error;

pub type StockLockResult<T> = std::result::Result<T, StockLockError>;

#[derive(Error, Debug)]
pub enum StockLockError {
    #[error("Lock store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Lock unavailable: {0}")]
    LockUnavailable(String),

    #[error("Insufficient quantity for stock {id}: requested {requested}, available {available}")]
    InsufficientQuantity {
        id: u64,
        requested: u64,
        available: u64,
    },

    #[error("Interrupted while waiting for lock: {0}")]
    InterruptedWait(String),

    #[error("Stock not found: {0}")]
    StockNotFound(u64),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Connection pool error: {0}")]
    PoolError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StockLockError {
    /// Whether the lock authority could not be reached.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            StockLockError::StoreUnavailable(_) | StockLockError::PoolError(_)
        )
    }
}

impl From<RedisError> for StockLockError {
    fn from(err: RedisError) -> Self {
        StockLockError::StoreUnavailable(err.to_string())
    }
}

impl From<r2d2::Error> for StockLockError {
    fn from(err: r2d2::Error) -> Self {
        StockLockError::PoolError(err.to_string())
    }
}

impl From<serde_json::Error> for StockLockError {
    fn from(err: serde_json::Error) -> Self {
        StockLockError::SerializationError(err.to_string())
    }
}
