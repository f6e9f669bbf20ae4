//! # Accumulator Storage Pool
//!
//! Partitions borrow their accumulator storage from a shared pool and give it
//! back when the scan ends. The lease is an RAII guard ([`PooledAccumulator`]):
//! storage is returned exactly once, from `Drop`, on every exit path
//! including evaluation failures and early cancellation.
//!
//! The pool bounds the number of outstanding leases. When the bound is hit
//! `acquire` fails with [`HistogramError::PoolExhausted`] for that partition
//! only; other partitions' leases are unaffected.
//!
//! Idle storage is kept in a lock-free `crossbeam` [`ArrayQueue`] so that
//! partition workers on different threads never contend on a mutex.

use crate::accumulator::Accumulator;
use crate::error::{HistogramError, Result};
use crossbeam::queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

struct PoolInner {
    idle: ArrayQueue<Accumulator>,
    outstanding: AtomicUsize,
    max_outstanding: usize,
}

/// Shared pool of reusable accumulators.
#[derive(Clone)]
pub struct AccumulatorPool {
    inner: Arc<PoolInner>,
}

impl AccumulatorPool {
    /// Create a pool allowing at most `max_outstanding` simultaneous leases.
    ///
    /// At most `max_outstanding` idle accumulators are retained for reuse.
    pub fn new(max_outstanding: usize) -> Result<Self> {
        if max_outstanding == 0 {
            return Err(HistogramError::config(
                "accumulator pool must allow at least one lease",
            ));
        }
        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: ArrayQueue::new(max_outstanding),
                outstanding: AtomicUsize::new(0),
                max_outstanding,
            }),
        })
    }

    /// Lease an empty accumulator.
    pub fn acquire(&self) -> Result<PooledAccumulator> {
        let limit = self.inner.max_outstanding;
        self.inner
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < limit).then_some(current + 1)
            })
            .map_err(|_| HistogramError::PoolExhausted { limit })?;

        let accumulator = self.inner.idle.pop().unwrap_or_default();
        trace!(
            "Leased accumulator ({} outstanding)",
            self.outstanding()
        );
        Ok(PooledAccumulator {
            accumulator,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Number of leases currently held.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Number of idle accumulators ready for reuse.
    pub fn idle(&self) -> usize {
        self.inner.idle.len()
    }

    /// Maximum number of simultaneous leases.
    pub fn capacity(&self) -> usize {
        self.inner.max_outstanding
    }
}

impl std::fmt::Debug for AccumulatorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccumulatorPool")
            .field("outstanding", &self.outstanding())
            .field("idle", &self.idle())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// An accumulator on lease from an [`AccumulatorPool`].
///
/// Dereferences to [`Accumulator`]. Dropping the lease clears the storage and
/// hands it back to the pool.
pub struct PooledAccumulator {
    accumulator: Accumulator,
    pool: Arc<PoolInner>,
}

impl Deref for PooledAccumulator {
    type Target = Accumulator;

    fn deref(&self) -> &Accumulator {
        &self.accumulator
    }
}

impl DerefMut for PooledAccumulator {
    fn deref_mut(&mut self) -> &mut Accumulator {
        &mut self.accumulator
    }
}

impl Drop for PooledAccumulator {
    fn drop(&mut self) {
        let mut accumulator = std::mem::take(&mut self.accumulator);
        accumulator.clear();
        // A full idle queue just means the storage is freed instead of kept.
        let _ = self.pool.idle.push(accumulator);
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
