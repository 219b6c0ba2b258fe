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
use crate::errors::StockLockResult;
use crate::{
    LeaseStore, LockKey, LockService, ManagedLock, ManagedLockStockFacade, RedisLeaseStore,
    RedisLockService, SpinLock, SpinLockStockFacade, StockFacade, StockRepository, StockService,
    SyncRedisConnectionManager,
};
use std::fmt::Display;
use std::sync::Arc;
use tracing::info;

/// Entry point wiring both lock strategies to one Redis deployment.
///
/// Every component handed out shares the client's connection pool. The
/// reentrant lock service is created once so that all managed locks of a
/// client agree on its client id.
#[derive(Clone)]
pub struct LockClient {
    config: LockConfig,
    connection_manager: Arc<SyncRedisConnectionManager>,
    lock_service: Arc<RedisLockService>,
}

impl LockClient {
    pub fn new(config: LockConfig) -> StockLockResult<Self> {
        let connection_manager = Arc::new(SyncRedisConnectionManager::new(&config)?);
        let lock_service = Arc::new(RedisLockService::new(
            connection_manager.clone(),
            config.managed.watchdog_timeout,
        ));
        info!(
            "Lock client {} connected to {}",
            lock_service.client_id(),
            config.redis_url
        );

        Ok(Self {
            config,
            connection_manager,
            lock_service,
        })
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn get_connection_manager(&self) -> &Arc<SyncRedisConnectionManager> {
        &self.connection_manager
    }

    pub fn get_lease_store(&self) -> Arc<dyn LeaseStore> {
        Arc::new(RedisLeaseStore::new(self.connection_manager.clone()))
    }

    pub fn get_lock_service(&self) -> Arc<dyn LockService> {
        self.lock_service.clone()
    }

    pub fn get_spin_lock(&self) -> SpinLock {
        SpinLock::new(self.get_lease_store(), self.config.spin.clone())
    }

    pub fn get_managed_lock(&self) -> ManagedLock {
        ManagedLock::new(self.get_lock_service(), self.config.managed.clone())
    }

    /// Lock key for `resource_id` under the configured prefix.
    pub fn lock_key(&self, resource_id: impl Display) -> LockKey {
        LockKey::new(&self.config.key_prefix, resource_id)
    }

    pub fn get_spin_lock_stock_facade(
        &self,
        repository: Arc<dyn StockRepository>,
    ) -> SpinLockStockFacade {
        StockFacade::with_key_prefix(
            Arc::new(self.get_spin_lock()),
            StockService::new(repository),
            &self.config.key_prefix,
        )
    }

    pub fn get_managed_lock_stock_facade(
        &self,
        repository: Arc<dyn StockRepository>,
    ) -> ManagedLockStockFacade {
        StockFacade::with_key_prefix(
            Arc::new(self.get_managed_lock()),
            StockService::new(repository),
            &self.config.key_prefix,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DistributedLock, MemoryStockRepository, Stock, StockLockError};
    use std::thread;

    #[test]
    fn test_invalid_config_rejected() {
        let result = LockClient::new(LockConfig::default().with_pool_size(0));
        assert!(matches!(result, Err(StockLockError::ConfigError(_))));
    }

    #[test]
    #[ignore = "requires a Redis server on 127.0.0.1:6379"]
    fn test_client_components_share_store() {
        let client =
            LockClient::new(LockConfig::default().with_key_prefix("LOCK:client-test:")).unwrap();
        assert!(client.get_connection_manager().health_check());

        let key = client.lock_key(1);
        assert_eq!(key.as_str(), "LOCK:client-test:1");

        let spin = client.get_spin_lock();
        let handle = spin.acquire(&key).unwrap();
        assert!(client.get_lease_store().ttl(key.as_str()).unwrap().is_some());
        assert!(spin.release(handle));

        let managed = client.get_managed_lock();
        let handle = managed.acquire(&key).unwrap();
        assert!(client.get_lock_service().is_held_by_current_owner(key.as_str()).unwrap());
        assert!(managed.release(handle));
    }

    #[test]
    #[ignore = "requires a Redis server on 127.0.0.1:6379"]
    fn test_redis_backed_concurrent_decrements() {
        let client =
            LockClient::new(LockConfig::default().with_key_prefix("LOCK:facade-test:")).unwrap();
        let repository = MemoryStockRepository::new();
        repository.insert(Stock::new(1, 100));
        let facade = Arc::new(client.get_managed_lock_stock_facade(Arc::new(repository.clone())));

        let workers: Vec<_> = (0..10)
            .map(|_| {
                let facade = facade.clone();
                thread::spawn(move || {
                    for _ in 0..5 {
                        facade.decrease(1, 1).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(repository.get(1).unwrap().quantity, 50);
    }
}
