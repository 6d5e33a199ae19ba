//! Typed, named pub/sub topic.
//!
//! `Topic<T>` is a multi-producer/multi-consumer queue guarded by a mutex
//! and condition variable. Any thread holding a handle may publish; queue
//! reads claim each message at most once. Registered callbacks are the
//! broadcast path: every callback sees every published message.
//!
//! ## Callback contract
//!
//! Callbacks run synchronously on the publisher's thread, in registration
//! order, after the message is enqueued and the queue lock released. A slow
//! callback therefore delays only its own publisher — readers and
//! publishers on other topics are unaffected.
//!
//! ## Ordering
//!
//! FIFO per publisher thread. Concurrent publishers interleave in lock
//! acquisition order; no ordering is guaranteed across topics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::core::metrics;
use crate::core::stop::StopToken;
use crate::error::{ArgusError, ArgusResult};
use crate::memory::{Arena, ArenaLease};

/// Upper bound on one condvar wait slice. Keeps blocking reads re-checking
/// the closed flag at a bounded interval even if a wakeup is lost.
const WAIT_SLICE: Duration = Duration::from_millis(50);

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Atomic per-topic counters.
#[derive(Debug, Default)]
struct TopicCounters {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    publish_rejected: AtomicU64,
    reads_empty: AtomicU64,
}

/// Non-atomic snapshot of topic counters (for external consumers).
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct TopicMetrics {
    /// Messages successfully enqueued
    pub messages_sent: u64,
    /// Messages claimed by a reader
    pub messages_received: u64,
    /// Publishes rejected (closed topic or allocation failure)
    pub publish_rejected: u64,
    /// Non-blocking reads that found nothing
    pub reads_empty: u64,
}

struct QueueItem<T> {
    value: T,
    // Budget claim released when the message is consumed or the queue drops.
    _lease: ArenaLease,
}

struct TopicInner<T> {
    name: String,
    arena: Arena,
    queue: Mutex<VecDeque<QueueItem<T>>>,
    available: Condvar,
    // Transitions under the queue lock; atomic so fast paths can peek.
    closed: AtomicBool,
    callbacks: RwLock<Vec<Callback<T>>>,
    counters: TopicCounters,
}

/// Named, typed MPMC topic. Cloning yields another handle to the same queue.
pub struct Topic<T> {
    inner: Arc<TopicInner<T>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Topic<T> {
    /// Create a topic drawing queue allocations from `arena`.
    pub fn new(name: impl Into<String>, arena: &Arena) -> Self {
        Self {
            inner: Arc::new(TopicInner {
                name: name.into(),
                arena: arena.clone(),
                queue: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
                closed: AtomicBool::new(false),
                callbacks: RwLock::new(Vec::new()),
                counters: TopicCounters::default(),
            }),
        }
    }

    /// Topic name. Always succeeds.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Enqueue `msg` and wake one blocked reader, then invoke registered
    /// callbacks with the message.
    ///
    /// Fails with [`ArgusError::Closed`] once the topic has begun teardown
    /// and with [`ArgusError::AllocationFailure`] when the owning arena
    /// cannot cover the message; in both cases the message is undelivered
    /// and nothing is enqueued.
    pub fn publish(&self, msg: T) -> ArgusResult<()> {
        let inner = &self.inner;

        let lease = match inner.arena.try_reserve::<T>() {
            Ok(lease) => lease,
            Err(err) => {
                inner.counters.publish_rejected.fetch_add(1, Ordering::Relaxed);
                metrics::counter("topic.publish_rejected", 1);
                return Err(err);
            }
        };

        // Clone for the callback pass only when someone is listening.
        let for_callbacks = if inner.callbacks.read().is_empty() {
            None
        } else {
            Some(msg.clone())
        };

        {
            let mut queue = inner.queue.lock();
            if inner.closed.load(Ordering::Relaxed) {
                inner.counters.publish_rejected.fetch_add(1, Ordering::Relaxed);
                metrics::counter("topic.publish_rejected", 1);
                return Err(ArgusError::closed(format!("topic '{}'", inner.name)));
            }
            queue.push_back(QueueItem { value: msg, _lease: lease });
        }
        inner.available.notify_one();

        inner.counters.messages_sent.fetch_add(1, Ordering::Relaxed);
        metrics::counter("topic.publish", 1);

        if let Some(value) = for_callbacks {
            let callbacks = inner.callbacks.read();
            for callback in callbacks.iter() {
                callback(&value);
            }
        }
        Ok(())
    }

    /// Publish a batch, stopping at the first failure.
    pub fn publish_many(&self, messages: impl IntoIterator<Item = T>) -> ArgusResult<usize> {
        let mut published = 0;
        for msg in messages {
            self.publish(msg)?;
            published += 1;
        }
        Ok(published)
    }

    /// Best-effort non-blocking read.
    ///
    /// Returns `Ok(None)` when the queue is empty or the lock is contended
    /// — this call never waits. A closed *and drained* topic returns
    /// [`ArgusError::Closed`] so pollers can distinguish "nothing yet" from
    /// "never again".
    pub fn try_recv(&self) -> ArgusResult<Option<T>> {
        let inner = &self.inner;
        let Some(mut queue) = inner.queue.try_lock() else {
            inner.counters.reads_empty.fetch_add(1, Ordering::Relaxed);
            metrics::counter("topic.read_empty", 1);
            return Ok(None);
        };
        match queue.pop_front() {
            Some(item) => {
                drop(queue);
                inner.counters.messages_received.fetch_add(1, Ordering::Relaxed);
                metrics::counter("topic.read", 1);
                Ok(Some(item.value))
            }
            None if inner.closed.load(Ordering::Relaxed) => {
                Err(ArgusError::closed(format!("topic '{}'", inner.name)))
            }
            None => {
                drop(queue);
                inner.counters.reads_empty.fetch_add(1, Ordering::Relaxed);
                metrics::counter("topic.read_empty", 1);
                Ok(None)
            }
        }
    }

    /// Blocking read: waits until a message arrives or the topic closes.
    ///
    /// Safe to call in a loop — each call claims exactly one message. A
    /// close from any thread wakes all waiters, which then return
    /// [`ArgusError::Closed`] within one wait slice.
    pub fn recv(&self) -> ArgusResult<T> {
        self.recv_deadline(None)
    }

    /// Blocking read with a deadline, [`ArgusError::Timeout`] when it
    /// passes. Timeout is distinct from close: the topic is still live.
    pub fn recv_timeout(&self, max_wait: Duration) -> ArgusResult<T> {
        self.recv_deadline(Some(Instant::now() + max_wait))
    }

    fn recv_deadline(&self, deadline: Option<Instant>) -> ArgusResult<T> {
        let inner = &self.inner;
        let mut queue = inner.queue.lock();
        loop {
            if let Some(item) = queue.pop_front() {
                drop(queue);
                inner.counters.messages_received.fetch_add(1, Ordering::Relaxed);
                metrics::counter("topic.read", 1);
                return Ok(item.value);
            }
            if inner.closed.load(Ordering::Relaxed) {
                return Err(ArgusError::closed(format!("topic '{}'", inner.name)));
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ArgusError::timeout(format!(
                            "recv on topic '{}'",
                            inner.name
                        )));
                    }
                    (deadline - now).min(WAIT_SLICE)
                }
                None => WAIT_SLICE,
            };
            // Spurious or sliced wakeups just re-run the loop checks.
            inner.available.wait_for(&mut queue, slice);
        }
    }

    /// Blocking read that also gives up when `stop` fires, reported as
    /// [`ArgusError::Closed`]. The stop token is re-checked at least once
    /// per wait slice, so shutdown is observed in bounded time even if the
    /// topic itself never closes.
    pub fn recv_interruptible(&self, stop: &StopToken) -> ArgusResult<T> {
        loop {
            if stop.is_stopped() {
                return Err(ArgusError::closed(format!(
                    "topic '{}' (stop requested)",
                    self.inner.name
                )));
            }
            match self.recv_timeout(WAIT_SLICE) {
                Err(ArgusError::Timeout(_)) => continue,
                other => return other,
            }
        }
    }

    /// Register a callback invoked for every subsequently published message,
    /// in registration order, synchronously on the publisher's thread.
    pub fn register_callback(
        &self,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> ArgusResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(ArgusError::closed(format!("topic '{}'", self.inner.name)));
        }
        self.inner.callbacks.write().push(Box::new(callback));
        Ok(())
    }

    /// Begin teardown: reject future publishes and wake all blocked
    /// readers. Messages already queued stay readable until drained.
    /// Idempotent.
    pub fn close(&self) {
        {
            let _queue = self.inner.queue.lock();
            self.inner.closed.store(true, Ordering::Release);
        }
        self.inner.available.notify_all();
    }

    /// Whether teardown has begun.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Queued message count.
    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.inner.queue.lock().is_empty()
    }

    /// Counter snapshot.
    pub fn topic_metrics(&self) -> TopicMetrics {
        let counters = &self.inner.counters;
        TopicMetrics {
            messages_sent: counters.messages_sent.load(Ordering::Relaxed),
            messages_received: counters.messages_received.load(Ordering::Relaxed),
            publish_rejected: counters.publish_rejected.load(Ordering::Relaxed),
            reads_empty: counters.reads_empty.load(Ordering::Relaxed),
        }
    }
}

impl<T> std::fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.inner.name)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ArenaConfig;

    fn test_arena() -> Arena {
        Arena::new("topic-tests", ArenaConfig::small())
    }

    #[test]
    fn test_fifo_single_publisher() {
        let arena = test_arena();
        let topic = Topic::new("fifo", &arena);

        for value in [1, 2, 3] {
            topic.publish(value).unwrap();
        }
        assert_eq!(topic.try_recv().unwrap(), Some(1));
        assert_eq!(topic.try_recv().unwrap(), Some(2));
        assert_eq!(topic.try_recv().unwrap(), Some(3));
        assert_eq!(topic.try_recv().unwrap(), None);
    }

    #[test]
    fn test_publish_fails_after_close() {
        let arena = test_arena();
        let topic = Topic::new("closing", &arena);

        topic.publish(1).unwrap();
        topic.close();

        let err = topic.publish(2).unwrap_err();
        assert!(matches!(err, ArgusError::Closed(_)));

        // Already-queued messages drain, then the closed state shows.
        assert_eq!(topic.try_recv().unwrap(), Some(1));
        assert!(matches!(topic.try_recv(), Err(ArgusError::Closed(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let arena = test_arena();
        let topic = Topic::<u8>::new("twice", &arena);
        topic.close();
        topic.close();
        assert!(topic.is_closed());
    }

    #[test]
    fn test_recv_returns_closed_within_bounded_time() {
        let arena = test_arena();
        let topic = Topic::<u32>::new("wake", &arena);

        let reader = {
            let topic = topic.clone();
            std::thread::spawn(move || topic.recv())
        };

        std::thread::sleep(Duration::from_millis(20));
        topic.close();

        let result = reader.join().unwrap();
        assert!(matches!(result, Err(ArgusError::Closed(_))));
    }

    #[test]
    fn test_recv_interruptible_observes_stop() {
        let arena = test_arena();
        let topic = Topic::<u32>::new("interruptible", &arena);
        let stop = StopToken::new();

        let reader = {
            let topic = topic.clone();
            let stop = stop.clone();
            std::thread::spawn(move || topic.recv_interruptible(&stop))
        };

        std::thread::sleep(Duration::from_millis(20));
        stop.stop();

        let result = reader.join().unwrap();
        assert!(matches!(result, Err(ArgusError::Closed(_))));
        // The topic itself was never closed, only the loop cancelled.
        assert!(!topic.is_closed());
    }

    #[test]
    fn test_recv_timeout_distinct_from_closed() {
        let arena = test_arena();
        let topic = Topic::<u32>::new("deadline", &arena);

        let start = Instant::now();
        let err = topic.recv_timeout(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, ArgusError::Timeout(_)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!topic.is_closed());
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let arena = test_arena();
        let topic = Topic::new("cbs", &arena);

        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            topic
                .register_callback(move |value: &i32| {
                    seen.lock().push((tag, *value));
                })
                .unwrap();
        }

        topic.publish(7).unwrap();
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);

        // The queue path still delivers independently of callbacks.
        assert_eq!(topic.try_recv().unwrap(), Some(7));
    }

    #[test]
    fn test_register_callback_on_closed_topic_fails() {
        let arena = test_arena();
        let topic = Topic::<i32>::new("late", &arena);
        topic.close();
        assert!(matches!(
            topic.register_callback(|_| {}),
            Err(ArgusError::Closed(_))
        ));
    }

    #[test]
    fn test_publish_failure_releases_budget() {
        let arena = Arena::new(
            "tiny",
            ArenaConfig {
                capacity_bytes: 4,
                shards: 1,
            },
        );
        let topic = Topic::new("starved", &arena);

        // u64 needs 8 bytes against a 4-byte budget.
        let err = topic.publish(1u64).unwrap_err();
        assert!(matches!(err, ArgusError::AllocationFailure { .. }));
        assert_eq!(arena.stats().in_use_bytes, 0);
        assert_eq!(topic.len(), 0);
        assert_eq!(topic.topic_metrics().publish_rejected, 1);
    }

    #[test]
    fn test_metrics_snapshot_counts() {
        let arena = test_arena();
        let topic = Topic::new("counted", &arena);

        topic.publish(1).unwrap();
        topic.publish(2).unwrap();
        let _ = topic.try_recv().unwrap();
        let _ = topic.try_recv().unwrap();
        let _ = topic.try_recv().unwrap(); // empty

        let snapshot = topic.topic_metrics();
        assert_eq!(snapshot.messages_sent, 2);
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.reads_empty, 1);
    }

    #[test]
    fn test_queued_leases_release_with_queue() {
        let arena = test_arena();
        {
            let topic = Topic::new("leaky?", &arena);
            topic.publish(123u64).unwrap();
            assert!(arena.stats().in_use_bytes > 0);
        }
        // Dropping the last handle drops the queue and its leases.
        assert_eq!(arena.stats().in_use_bytes, 0);
    }
}
