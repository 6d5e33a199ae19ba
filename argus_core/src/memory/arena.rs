//! Per-owner pooled message arena.
//!
//! Every owner (a node, or the master's registry) constructs its own
//! [`Arena`] and hands clones of the handle to everything it creates; no
//! owner ever shares allocation authority with another. The arena tracks a
//! byte budget with atomics and recycles payload buffers through striped,
//! size-classed free lists, so publishers on foreign threads can allocate
//! concurrently without funnelling through one lock.
//!
//! Two allocation shapes:
//!
//! - [`ArenaLease`] — an RAII budget claim for a typed message sitting in a
//!   topic queue. The lease is carried alongside the message and released
//!   when the message is consumed (or the queue is dropped).
//! - [`PooledBuf`] — a recycled byte buffer for payload data (sensor
//!   samples, blobs). Returned to its shard's free list on drop.
//!
//! Exhaustion is an explicit [`ArgusError::AllocationFailure`]; there is no
//! fallback allocator and no partial allocation. Both handle types hold an
//! `Arc` to the pool, so the pool outlives every allocation it produced —
//! the owner tearing down its `Arena` handle cannot strand a live lease.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::metrics;
use crate::error::{ArgusError, ArgusResult};

/// Number of power-of-two size classes: 64 B .. 128 KiB.
const SIZE_CLASSES: usize = 12;

/// Smallest recycled block size in bytes.
const MIN_BLOCK: usize = 64;

/// Maximum recycled blocks kept per class per shard.
const FREE_LIST_DEPTH: usize = 32;

/// Configuration for an [`Arena`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ArenaConfig {
    /// Total byte budget (default: 16 MiB).
    pub capacity_bytes: usize,
    /// Number of free-list stripes (default: 8).
    pub shards: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 16 * 1024 * 1024,
            shards: 8,
        }
    }
}

impl ArenaConfig {
    /// Create a smaller arena for testing.
    pub fn small() -> Self {
        Self {
            capacity_bytes: 64 * 1024,
            shards: 2,
        }
    }
}

/// Non-atomic usage snapshot.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ArenaStats {
    pub capacity_bytes: usize,
    pub in_use_bytes: usize,
    /// Live leases and pooled buffers not yet released.
    pub outstanding: usize,
}

struct Shard {
    classes: [Mutex<Vec<Box<[u8]>>>; SIZE_CLASSES],
}

impl Shard {
    fn new() -> Self {
        Self {
            classes: std::array::from_fn(|_| Mutex::new(Vec::new())),
        }
    }
}

struct ArenaInner {
    name: String,
    capacity_bytes: usize,
    in_use: AtomicUsize,
    outstanding: AtomicUsize,
    shards: Box<[Shard]>,
}

impl ArenaInner {
    /// Claim `bytes` against the budget, or fail without mutating anything.
    fn charge(&self, bytes: usize) -> ArgusResult<()> {
        let mut current = self.in_use.load(Ordering::Relaxed);
        loop {
            let next = match current.checked_add(bytes) {
                Some(next) if next <= self.capacity_bytes => next,
                _ => {
                    metrics::counter("arena.allocation_failure", 1);
                    return Err(ArgusError::allocation(
                        &self.name,
                        format!(
                            "request for {} bytes exceeds budget ({}/{} in use)",
                            bytes, current, self.capacity_bytes
                        ),
                    ));
                }
            };
            match self.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Smallest size class whose block covers `len`, or `None` when the request
/// is larger than the biggest recycled class.
fn class_for(len: usize) -> Option<usize> {
    (0..SIZE_CLASSES).find(|&class| class_size(class) >= len)
}

#[inline]
fn class_size(class: usize) -> usize {
    MIN_BLOCK << class
}

thread_local! {
    // Each thread sticks to one stripe; assignment is round-robin at first use.
    static SHARD_HINT: Cell<Option<usize>> = const { Cell::new(None) };
}

static NEXT_SHARD: AtomicUsize = AtomicUsize::new(0);

fn shard_index(shard_count: usize) -> usize {
    SHARD_HINT.with(|hint| match hint.get() {
        Some(index) => index % shard_count,
        None => {
            let index = NEXT_SHARD.fetch_add(1, Ordering::Relaxed);
            hint.set(Some(index));
            index % shard_count
        }
    })
}

/// Budgeted, pooled allocation authority scoped to one owner.
///
/// Cloning produces another handle to the same pool; the pool itself is
/// freed once the last handle, lease, and buffer are gone.
#[derive(Clone)]
pub struct Arena {
    inner: Arc<ArenaInner>,
}

impl Arena {
    /// Create an arena with the given budget.
    pub fn new(name: impl Into<String>, config: ArenaConfig) -> Self {
        let shards = config.shards.max(1);
        Self {
            inner: Arc::new(ArenaInner {
                name: name.into(),
                capacity_bytes: config.capacity_bytes,
                in_use: AtomicUsize::new(0),
                outstanding: AtomicUsize::new(0),
                shards: (0..shards).map(|_| Shard::new()).collect(),
            }),
        }
    }

    /// Owner name this arena was created for.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Claim `bytes` of budget for a queued message.
    pub fn try_reserve_bytes(&self, bytes: usize) -> ArgusResult<ArenaLease> {
        let bytes = bytes.max(1);
        self.inner.charge(bytes)?;
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        Ok(ArenaLease {
            bytes,
            inner: Arc::clone(&self.inner),
        })
    }

    /// Claim budget sized for one `T`.
    pub fn try_reserve<T>(&self) -> ArgusResult<ArenaLease> {
        self.try_reserve_bytes(std::mem::size_of::<T>())
    }

    /// Allocate a payload buffer of at least `len` bytes, recycled from the
    /// calling thread's stripe when possible. Contents are not zeroed.
    ///
    /// Buffers beyond the largest size class are served exactly-sized and
    /// never recycled.
    pub fn alloc_buf(&self, len: usize) -> ArgusResult<PooledBuf> {
        let class = class_for(len);
        let charged = class.map(class_size).unwrap_or(len).max(1);
        self.inner.charge(charged)?;
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);

        let data = class
            .and_then(|class| {
                let shard = &self.inner.shards[shard_index(self.inner.shards.len())];
                shard.classes[class].lock().pop()
            })
            .unwrap_or_else(|| vec![0u8; charged].into_boxed_slice());

        Ok(PooledBuf {
            data: Some(data),
            len,
            charged,
            class,
            inner: Arc::clone(&self.inner),
        })
    }

    /// Current usage snapshot.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity_bytes: self.inner.capacity_bytes,
            in_use_bytes: self.inner.in_use.load(Ordering::Acquire),
            outstanding: self.inner.outstanding.load(Ordering::Acquire),
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Arena")
            .field("name", &self.inner.name)
            .field("in_use_bytes", &stats.in_use_bytes)
            .field("capacity_bytes", &stats.capacity_bytes)
            .field("outstanding", &stats.outstanding)
            .finish()
    }
}

/// RAII budget claim for one queued message.
///
/// Dropping the lease returns its bytes to the arena.
pub struct ArenaLease {
    bytes: usize,
    inner: Arc<ArenaInner>,
}

impl ArenaLease {
    /// Bytes this lease holds against the budget.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for ArenaLease {
    fn drop(&mut self) {
        self.inner.release(self.bytes);
    }
}

impl std::fmt::Debug for ArenaLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaLease").field("bytes", &self.bytes).finish()
    }
}

/// Recycled payload buffer.
///
/// Dereferences to `[u8]` of the requested length. On drop, the backing
/// block goes back to the free list of the dropping thread's stripe and the
/// budget is released.
pub struct PooledBuf {
    data: Option<Box<[u8]>>,
    len: usize,
    charged: usize,
    class: Option<usize>,
    inner: Arc<ArenaInner>,
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // data is Some until drop
        &self.data.as_ref().unwrap()[..self.len]
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data.as_mut().unwrap()[..self.len]
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let (Some(data), Some(class)) = (self.data.take(), self.class) {
            let shard = &self.inner.shards[shard_index(self.inner.shards.len())];
            let mut free = shard.classes[class].lock();
            if free.len() < FREE_LIST_DEPTH {
                free.push(data);
            }
        }
        self.inner.release(self.charged);
    }
}
