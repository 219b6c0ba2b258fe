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
use crate::config::LockConfig;
use crate::errors::{StockLockError, StockLockResult};
use r2d2::{Pool, PooledConnection};
use redis::Client;
use std::time::Duration;

type RedisPool = Pool<Client>;

pub type RedisConnection = PooledConnection<Client>;

/// Pooled synchronous connections to the lock authority.
pub struct SyncRedisConnectionManager {
    pool: RedisPool,
    connection_timeout: Duration,
}

impl SyncRedisConnectionManager {
    pub fn new(config: &LockConfig) -> StockLockResult<Self> {
        config.validate()?;

        let client = Client::open(config.redis_url.as_str())?;
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(client)?;

        Ok(Self {
            pool,
            connection_timeout: config.connection_timeout,
        })
    }

    pub fn get_connection(&self) -> StockLockResult<RedisConnection> {
        self.pool.get_timeout(self.connection_timeout).map_err(|e| {
            StockLockError::StoreUnavailable(format!("no connection to lock store: {}", e))
        })
    }

    pub fn health_check(&self) -> bool {
        match self.get_connection() {
            Ok(mut conn) => redis::cmd("PING").query::<String>(&mut *conn).is_ok(),
            Err(_) => false,
        }
    }
}
