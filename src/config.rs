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
use crate::util::MAX_LOCK_DURATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_KEY_PREFIX: &str = "LOCK:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Redis connection url of the lock authority
    pub redis_url: String,
    /// Connection pool size
    pub pool_size: u32,
    /// Connection timeout time
    pub connection_timeout: Duration,
    /// Prefix prepended to every lock key
    pub key_prefix: String,
    pub spin: SpinLockConfig,
    pub managed: ManagedLockConfig,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 10,
            connection_timeout: Duration::from_secs(3),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            spin: SpinLockConfig::default(),
            managed: ManagedLockConfig::default(),
        }
    }
}

impl LockConfig {
    pub fn single_server(address: &str) -> Self {
        Self {
            redis_url: address.to_string(),
            ..Default::default()
        }
    }

    /// Load a configuration from its JSON representation.
    pub fn from_json(json: &str) -> StockLockResult<Self> {
        let config: LockConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StockLockResult<()> {
        if self.redis_url.is_empty() {
            return Err(StockLockError::ConfigError("Redis url cannot be empty".to_string()));
        }
        if self.pool_size == 0 {
            return Err(StockLockError::ConfigError("Pool size cannot be zero".to_string()));
        }
        if self.spin.lease_ttl.is_zero() {
            return Err(StockLockError::ConfigError("Spin lock lease ttl cannot be zero".to_string()));
        }
        if self.spin.retry_interval.is_zero() {
            return Err(StockLockError::ConfigError(
                "Spin lock retry interval cannot be zero".to_string(),
            ));
        }
        if self.managed.lease_time.is_some_and(|lease| lease.is_zero()) {
            return Err(StockLockError::ConfigError(
                "Managed lock lease time cannot be zero, use None for watchdog renewal".to_string(),
            ));
        }
        if self.managed.watchdog_timeout < Duration::from_millis(3) {
            return Err(StockLockError::ConfigError(
                "Watchdog timeout must be at least 3ms".to_string(),
            ));
        }

        let durations = [
            ("spin.lease_ttl", Some(self.spin.lease_ttl)),
            ("spin.retry_interval", Some(self.spin.retry_interval)),
            ("spin.max_wait", self.spin.max_wait),
            ("managed.wait_time", Some(self.managed.wait_time)),
            ("managed.lease_time", self.managed.lease_time),
            ("managed.watchdog_timeout", Some(self.managed.watchdog_timeout)),
        ];
        for (name, duration) in durations {
            if duration.is_some_and(|duration| duration > MAX_LOCK_DURATION) {
                return Err(StockLockError::ConfigError(format!(
                    "{} exceeds {:?}",
                    name, MAX_LOCK_DURATION
                )));
            }
        }
        Ok(())
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn with_spin_config(mut self, spin: SpinLockConfig) -> Self {
        self.spin = spin;
        self
    }

    pub fn with_managed_config(mut self, managed: ManagedLockConfig) -> Self {
        self.managed = managed;
        self
    }
}

/// Polling lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinLockConfig {
    /// Expiry written with each lease
    pub lease_ttl: Duration,
    /// Pause between failed attempts
    pub retry_interval: Duration,
    /// Random spread applied to the pause, in milliseconds
    pub retry_jitter_ms: u64,
    /// Give up after this long. `None` polls until the lease is obtained.
    pub max_wait: Option<Duration>,
}

impl Default for SpinLockConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_millis(3_000),
            retry_interval: Duration::from_millis(100),
            retry_jitter_ms: 0,
            max_wait: None,
        }
    }
}

impl SpinLockConfig {
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_retry_jitter_ms(mut self, jitter_ms: u64) -> Self {
        self.retry_jitter_ms = jitter_ms;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// Bounded-wait lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedLockConfig {
    /// Hard timeout for acquisition
    pub wait_time: Duration,
    /// Fixed lease. `None` lets the watchdog renew the lease until unlock.
    pub lease_time: Option<Duration>,
    /// Lease written while the watchdog is renewing
    pub watchdog_timeout: Duration,
}

impl Default for ManagedLockConfig {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_secs(2),
            lease_time: Some(Duration::from_secs(2)),
            watchdog_timeout: Duration::from_secs(30),
        }
    }
}

impl ManagedLockConfig {
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_lease_time(mut self, lease_time: Option<Duration>) -> Self {
        self.lease_time = lease_time;
        self
    }

    pub fn with_watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LockConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.key_prefix, "LOCK:");
        assert_eq!(config.spin.lease_ttl, Duration::from_millis(3_000));
        assert_eq!(config.spin.retry_interval, Duration::from_millis(100));
        assert!(config.spin.max_wait.is_none());
        assert_eq!(config.managed.wait_time, Duration::from_secs(2));
    }

    #[test]
    fn test_json_config() {
        let source = LockConfig::single_server("redis://10.0.0.5:6379")
            .with_pool_size(4)
            .with_key_prefix("stock:")
            .with_managed_config(ManagedLockConfig::default().with_lease_time(None));
        let json = serde_json::to_string(&source).unwrap();

        let loaded = LockConfig::from_json(&json).unwrap();
        assert_eq!(loaded.redis_url, "redis://10.0.0.5:6379");
        assert_eq!(loaded.pool_size, 4);
        assert_eq!(loaded.key_prefix, "stock:");
        assert!(loaded.managed.lease_time.is_none());
    }

    #[test]
    fn test_invalid_config() {
        let config = LockConfig::default().with_pool_size(0);
        assert!(matches!(config.validate(), Err(StockLockError::ConfigError(_))));

        let config = LockConfig::default()
            .with_spin_config(SpinLockConfig::default().with_retry_interval(Duration::ZERO));
        assert!(config.validate().is_err());

        assert!(matches!(
            LockConfig::from_json("{not json"),
            Err(StockLockError::SerializationError(_))
        ));
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let config = LockConfig::default()
            .with_managed_config(ManagedLockConfig::default().with_wait_time(Duration::MAX));
        assert!(matches!(config.validate(), Err(StockLockError::ConfigError(_))));

        let config = LockConfig::default()
            .with_spin_config(SpinLockConfig::default().with_max_wait(MAX_LOCK_DURATION));
        assert!(config.validate().is_ok());
    }
}
