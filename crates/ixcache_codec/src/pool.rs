//! Reusable scratch buffers.

use bytes::BytesMut;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;

/// Default number of idle buffers kept by a pool.
pub const DEFAULT_MAX_POOLED: usize = 64;

/// Default initial capacity of a freshly allocated buffer.
pub const DEFAULT_INITIAL_CAPACITY: usize = 4 * 1024;

/// Buffers that grew beyond this capacity are dropped instead of pooled.
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 1024 * 1024;

/// A pool of scratch buffers for encoding.
///
/// Buffers are acquired as [`PooledBuffer`] guards and go back to the pool
/// when the guard is dropped, so early returns and unwinding cannot leak
/// them.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<BytesMut>>,
    max_pooled: usize,
    initial_capacity: usize,
    max_retained_capacity: usize,
}

impl BufferPool {
    /// Creates a pool with explicit limits.
    #[must_use]
    pub fn new(max_pooled: usize, initial_capacity: usize, max_retained_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_pooled,
            initial_capacity,
            max_retained_capacity,
        }
    }

    /// Process-wide pool used by the convenience encoders.
    pub fn global() -> &'static BufferPool {
        static GLOBAL: OnceLock<BufferPool> = OnceLock::new();
        GLOBAL.get_or_init(BufferPool::default)
    }

    /// Takes an empty buffer from the pool, allocating if none is idle.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.initial_capacity));
        PooledBuffer { pool: self, buf }
    }

    /// Number of idle buffers currently held.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, mut buf: BytesMut) {
        if buf.capacity() > self.max_retained_capacity {
            return;
        }
        buf.clear();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_pooled {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_POOLED,
            DEFAULT_INITIAL_CAPACITY,
            DEFAULT_MAX_RETAINED_CAPACITY,
        )
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: BytesMut,
}

impl Deref for PooledBuffer<'_> {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
