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
use rand::Rng;
use std::hash::{Hash, Hasher};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Longest wait or lease honored. Larger durations are clamped to it.
pub const MAX_LOCK_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub fn get_lock_id() -> String {
    Uuid::new_v4().to_string()
}

/// Milliseconds of `duration` as sent to Redis, clamped to [`MAX_LOCK_DURATION`].
pub fn num_milliseconds(duration: &Duration) -> u64 {
    u64::try_from((*duration).min(MAX_LOCK_DURATION).as_millis()).unwrap_or(u64::MAX)
}

/// `start + duration`, or `None` when that instant is not representable.
pub fn instant_after(start: Instant, duration: Duration) -> Option<Instant> {
    start.checked_add(duration)
}

pub fn jitter_delay(base_delay: Duration, jitter_ms: u64) -> Duration {
    if jitter_ms == 0 {
        return base_delay;
    }
    let mut rng = rand::thread_rng();
    let jitter = Duration::from_millis(rng.gen_range(0..=jitter_ms));
    if rng.gen_bool(0.5) {
        base_delay.saturating_add(jitter)
    } else {
        base_delay - jitter.min(base_delay)
    }
}

// Helper function to get the thread ID
pub fn thread_id_to_u64() -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// Owner identity of the calling thread within a lock client.
pub fn owner_id(client_id: &str) -> String {
    format!("{}:{}", client_id, thread_id_to_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_differs_per_thread() {
        let client = get_lock_id();
        let here = owner_id(&client);
        assert_eq!(here, owner_id(&client));

        let client_clone = client.clone();
        let there = thread::spawn(move || owner_id(&client_clone)).join().unwrap();
        assert_ne!(here, there);
        assert!(there.starts_with(&client));
    }

    #[test]
    fn test_jitter_delay_bounds() {
        let base = Duration::from_millis(100);
        assert_eq!(jitter_delay(base, 0), base);
        for _ in 0..50 {
            let delay = jitter_delay(base, 20);
            assert!(delay >= Duration::from_millis(80));
            assert!(delay <= Duration::from_millis(120));
        }
        assert!(jitter_delay(Duration::MAX, 20) >= Duration::MAX - Duration::from_millis(20));
    }

    #[test]
    fn test_num_milliseconds_clamps() {
        assert_eq!(num_milliseconds(&Duration::from_secs(3)), 3_000);
        assert_eq!(
            num_milliseconds(&Duration::MAX),
            MAX_LOCK_DURATION.as_millis() as u64
        );
    }

    #[test]
    fn test_instant_after_overflow() {
        let now = Instant::now();
        assert_eq!(instant_after(now, Duration::ZERO), Some(now));
        assert!(instant_after(now, Duration::MAX).is_none());
    }
}
