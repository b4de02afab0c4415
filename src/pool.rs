// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reusable staging buffers
//!
//! Every stream rents one staging buffer sized to the engine's preferred
//! chunk and hands it back when it is torn down. The sizes are fixed per
//! engine and mode, so buffers are pooled by exact length.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::constants::DEFAULT_MAX_POOLED;

/// Configuration for a [`BufferPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of idle buffers kept per length
    pub max_pooled: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_pooled: DEFAULT_MAX_POOLED,
        }
    }
}

/// Snapshot of the idle buffers held by a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub pooled_buffers: usize,
    pub pooled_bytes: usize,
}

/// Pool of byte buffers with explicit rent and automatic return
pub struct BufferPool {
    idle: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    config: PoolConfig,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        BufferPool {
            idle: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The process-wide pool streams rent their staging buffers from
    pub fn shared() -> &'static BufferPool {
        static SHARED: OnceLock<BufferPool> = OnceLock::new();
        SHARED.get_or_init(BufferPool::new)
    }

    /// Rent a buffer of exactly `len` bytes. Contents are unspecified.
    pub fn rent(&self, len: usize) -> PooledBuffer<'_> {
        let reused = self.idle.lock().get_mut(&len).and_then(Vec::pop);
        let data = reused.unwrap_or_else(|| vec![0u8; len]);
        PooledBuffer {
            data: Some(data),
            pool: self,
        }
    }

    fn give_back(&self, data: Vec<u8>) {
        let mut idle = self.idle.lock();
        let slot = idle.entry(data.len()).or_default();
        if slot.len() < self.config.max_pooled {
            slot.push(data);
        }
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock();
        idle.iter()
            .fold(PoolStats::default(), |mut stats, (len, buffers)| {
                stats.pooled_buffers += buffers.len();
                stats.pooled_bytes += len * buffers.len();
                stats
            })
    }

    /// Drop every idle buffer
    pub fn clear(&self) {
        self.idle.lock().clear();
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A rented buffer; goes back to its pool when dropped
pub struct PooledBuffer<'a> {
    data: Option<Vec<u8>>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}

impl fmt::Debug for PooledBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len())
            .finish()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.give_back(data);
        }
    }
}
