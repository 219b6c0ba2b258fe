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
mod executor;
mod managed_lock;
mod service;
mod spin_lock;
mod watchdog;

pub use executor::*;
pub use managed_lock::*;
pub use service::*;
pub use spin_lock::*;
pub use watchdog::*;

use crate::config::DEFAULT_KEY_PREFIX;
use crate::errors::StockLockResult;
use crate::util::{instant_after, thread_id_to_u64};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// Store key guarding one protected resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(prefix: &str, resource_id: impl Display) -> Self {
        Self(format!("{}{}", prefix, resource_id))
    }

    pub fn for_resource(resource_id: impl Display) -> Self {
        Self::new(DEFAULT_KEY_PREFIX, resource_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LockKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A lease obtained by one call stack.
///
/// The handle is consumed by [`DistributedLock::release`]; it is neither
/// `Clone` nor meant to cross threads, since the managed strategy binds
/// ownership to the acquiring thread.
#[derive(Debug)]
pub struct LeaseHandle {
    key: LockKey,
    owner: String,
    thread_id: u64,
    held: bool,
    lease_time: Option<Duration>,
    acquired_at: SystemTime,
    expire_time: Option<SystemTime>,
}

impl LeaseHandle {
    pub fn new(key: LockKey, owner: String, lease_time: Option<Duration>) -> Self {
        let acquired_at = SystemTime::now();
        Self {
            key,
            owner,
            thread_id: thread_id_to_u64(),
            held: true,
            lease_time,
            acquired_at,
            expire_time: lease_time.and_then(|lease| acquired_at.checked_add(lease)),
        }
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Token or owner identity written to the store for this lease.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn lease_time(&self) -> Option<Duration> {
        self.lease_time
    }

    pub fn acquired_at(&self) -> SystemTime {
        self.acquired_at
    }

    /// `None` while the lease is renewed by a watchdog, or when it reaches
    /// past any representable time.
    pub fn expire_time(&self) -> Option<SystemTime> {
        self.expire_time
    }

    pub fn is_held(&self) -> bool {
        self.held && !self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.expire_time
            .is_some_and(|expire_time| SystemTime::now() >= expire_time)
    }

    pub fn remaining_time(&self) -> Option<Duration> {
        self.expire_time.map(|expire_time| {
            expire_time
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::from_secs(0))
        })
    }

    pub(crate) fn mark_released(&mut self) {
        self.held = false;
    }
}

/// Cancels a blocked acquisition from another thread.
#[derive(Debug, Clone, Default)]
pub struct LockInterrupt {
    interrupted: Arc<AtomicBool>,
}

impl LockInterrupt {
    const POLL: Duration = Duration::from_millis(10);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on interrupt. Returns false if interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = instant_after(Instant::now(), duration);
        loop {
            if self.is_interrupted() {
                return false;
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    (deadline - now).min(Self::POLL)
                }
                None => Self::POLL,
            };
            thread::sleep(pause);
        }
    }
}

/// A lock strategy guarding critical sections by key.
pub trait DistributedLock: Send + Sync {
    /// Block until the lease for `key` is obtained, the strategy gives up, or
    /// `interrupt` fires.
    fn acquire_interruptibly(
        &self,
        key: &LockKey,
        interrupt: &LockInterrupt,
    ) -> StockLockResult<LeaseHandle>;

    fn acquire(&self, key: &LockKey) -> StockLockResult<LeaseHandle> {
        self.acquire_interruptibly(key, &LockInterrupt::new())
    }

    /// Give the lease back. Returns whether the store actually dropped it;
    /// failures are logged, not surfaced.
    fn release(&self, handle: LeaseHandle) -> bool;
}
