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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Background lease renewal for a held lock.
///
/// The renew function runs once immediately, then every `renew_interval`
/// until it reports failure or the watchdog is stopped.
pub struct LockWatchdog {
    name: String,
    should_stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LockWatchdog {
    pub fn start<F>(name: &str, renew_interval: Duration, renew_func: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        let should_stop = Arc::new(AtomicBool::new(false));
        let stop_flag = should_stop.clone();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(format!("lock-watchdog-{}", name))
            .spawn(move || {
                while !stop_flag.load(Ordering::SeqCst) {
                    if !renew_func() {
                        warn!("Lease renewal failed for {}, watchdog exiting", thread_name);
                        break;
                    }

                    // Sleep in short chunks to respond to stop signals in a timely manner
                    let mut slept = Duration::ZERO;
                    while slept < renew_interval && !stop_flag.load(Ordering::SeqCst) {
                        let chunk = (renew_interval - slept).min(Duration::from_millis(10));
                        thread::sleep(chunk);
                        slept += chunk;
                    }
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn watchdog for {}: {}", name, e);
                None
            }
        };

        debug!("Watchdog started for {} every {:?}", name, renew_interval);
        Self {
            name: name.to_string(),
            should_stop,
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("Watchdog stopped for {}", self.name);
        }
    }
}

impl Drop for LockWatchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
