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
use once_cell::sync::Lazy;
use redis::Script;

/// Token-checked lease release (compare-and-delete)
pub static RELEASE_LEASE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(r#"
        local key = KEYS[1]
        local token = ARGV[1]

        -- Only the writer of the lease may remove it
        if redis.call('get', key) == token then
            return redis.call('del', key)
        end

        return 0
    "#)
});

/// Reentrant lock acquisition
pub static LOCK_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(r#"
        local key = KEYS[1]
        local owner = ARGV[1]
        local ttl = ARGV[2]

        if redis.call('exists', key) == 0 then
            redis.call('hset', key, owner, 1)
            redis.call('pexpire', key, ttl)
            return 1
        end

        -- Reentry by the current owner
        if redis.call('hexists', key, owner) == 1 then
            local new_count = redis.call('hincrby', key, owner, 1)
            redis.call('pexpire', key, ttl)
            return new_count
        end

        return 0  -- Held by another owner
    "#)
});

pub static UNLOCK_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(r#"
        local key = KEYS[1]
        local owner = ARGV[1]

        if redis.call('hexists', key, owner) == 0 then
            return -1  -- Not held by this owner
        end

        -- A partial unlock leaves the current expiry untouched
        local counter = redis.call('hincrby', key, owner, -1)
        if counter > 0 then
            return counter  -- Remaining reentrant count
        end

        redis.call('del', key)
        return 0  -- Lock fully released
    "#)
});

/// Renewal script used by the watchdog
pub static RENEW_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(r#"
        local key = KEYS[1]
        local owner = ARGV[1]
        local new_ttl = ARGV[2]

        if redis.call('hexists', key, owner) == 1 then
            redis.call('pexpire', key, new_ttl)
            return 1
        end

        return 0
    "#)
});
