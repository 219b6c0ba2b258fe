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

//! Distributed locking for read-check-write stock updates.
//!
//! Two strategies guard a resource key in a shared lock store: [`SpinLock`]
//! polls an atomic set-if-absent until it wins, [`ManagedLock`] waits a
//! bounded time on a reentrant lock service. [`DistributedLockExecutor`]
//! runs critical sections under either one and releases the lease only after
//! the enclosing [`Transaction`] completes.

mod config;
mod errors;
mod util;
mod scripts;
mod connection;
mod store;
mod lock;
mod transaction;
mod stock;
mod client;

pub use config::*;
pub use errors::*;
pub use util::*;
pub use scripts::*;
pub use connection::*;
pub use store::*;
pub use lock::*;
pub use transaction::*;
pub use stock::*;
pub use client::*;
