//! Tensor buffer arena.
//!
//! Every tensor the preprocessor produces borrows its storage from a
//! `BufferPool`. The storage goes back to the pool when the `PooledBuffer`
//! guard drops, on success and error paths alike, so `outstanding()` returning
//! to zero after a call proves nothing leaked.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How many released buffers are retained for reuse.
const MAX_RETAINED: usize = 4;

#[derive(Debug, Default)]
struct PoolInner {
    free: Mutex<Vec<Vec<f32>>>,
    outstanding: AtomicUsize,
}

/// Shared arena of `f32` tensor buffers. Cloning shares the same arena.
#[derive(Debug, Clone, Default)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a zero-filled buffer of exactly `len` elements.
    pub fn acquire(&self, len: usize) -> PooledBuffer {
        let recycled = match self.inner.free.lock() {
            Ok(mut free) => free.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        };
        let mut buf = recycled.unwrap_or_default();
        buf.clear();
        buf.resize(len, 0.0);

        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        PooledBuffer {
            buf,
            pool: self.inner.clone(),
        }
    }

    /// Buffers currently handed out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Buffers parked for reuse.
    pub fn retained(&self) -> usize {
        match self.inner.free.lock() {
            Ok(free) => free.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// RAII guard over pooled storage.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<f32>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        let mut free = match self.pool.free.lock() {
            Ok(free) => free,
            Err(poisoned) => poisoned.into_inner(),
        };
        if free.len() < MAX_RETAINED {
            free.push(buf);
        }
        drop(free);
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
