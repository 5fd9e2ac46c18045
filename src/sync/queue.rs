//! Blocking bounded MPMC queue for in-process (inter-thread) communication.
//!
//! A fixed-capacity FIFO queue guarded by a single mutex, with condition
//! variables parking producers while the queue is full and consumers while it
//! is empty.
//!
//! # Overview
//!
//! - [`BoundedQueue`] - shared by any number of producers and consumers
//! - Strict FIFO at the buffer level: a pop always yields the oldest item
//! - Cooperative shutdown: [`BoundedQueue::shutdown`] wakes every parked
//!   thread, producers back out, consumers drain what is buffered
//!
//! # Differences from a lock-free ring
//!
//! All operations serialize on one lock, and the blocking forms park the
//! calling thread instead of spinning. Capacities are expected to be small,
//! so the single lock is not a bottleneck by design.

use std::collections::TryReserveError;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use minstant::Instant;
use thiserror::Error;

use crate::ring::Ring;
use crate::trace::{debug, trace};

/// Errors that can occur when constructing a queue.
#[derive(Debug, Error)]
pub enum CreateError {
    /// A queue must be able to hold at least one item.
    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,
    /// The slot storage could not be allocated. Nothing is left behind;
    /// the caller simply has no queue.
    #[error("failed to allocate storage for {capacity} queue slots")]
    Allocation {
        /// The capacity that was requested.
        capacity: usize,
        /// The allocator's report.
        source: TryReserveError,
    },
}

/// Error returned by [`BoundedQueue::push`] when the queue is shut down.
///
/// Carries the rejected item back to the caller, which keeps ownership and
/// decides its disposal.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("queue is shut down")]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    /// Returns the item that was not enqueued.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Errors that can occur on a non-blocking push.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TryPushError<T> {
    /// The queue was at capacity; the item is returned to the caller.
    #[error("queue is full")]
    Full(T),
    /// The queue is shut down; the item is returned to the caller.
    #[error("queue is shut down")]
    Shutdown(T),
}

impl<T> TryPushError<T> {
    /// Returns the item that was not enqueued.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Shutdown(item) => item,
        }
    }
}

/// Errors that can occur on a deadline-bounded push.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushTimeoutError<T> {
    /// The wait expired with the queue still full; the item is returned to
    /// the caller.
    #[error("timed out waiting for a free queue slot")]
    Timeout(T),
    /// The queue is shut down; the item is returned to the caller.
    #[error("queue is shut down")]
    Shutdown(T),
}

impl<T> PushTimeoutError<T> {
    /// Returns the item that was not enqueued.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Timeout(item) | Self::Shutdown(item) => item,
        }
    }
}

/// Errors that can occur on a non-blocking pop.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TryPopError {
    /// The queue held no item at the time of the call.
    #[error("queue is empty")]
    Empty,
    /// The queue is shut down and fully drained; no item will ever arrive.
    #[error("queue is shut down and drained")]
    Drained,
}

/// Errors that can occur on a deadline-bounded pop.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PopTimeoutError {
    /// The wait expired with the queue still empty.
    #[error("timed out waiting for an item")]
    Timeout,
    /// The queue is shut down and fully drained; no item will ever arrive.
    #[error("queue is shut down and drained")]
    Drained,
}

/// Everything the queue lock guards: the buffer and the shutdown flag.
///
/// The flag only ever transitions false to true and never resets.
struct Shared<T> {
    ring: Ring<T>,
    shutdown: bool,
}

/// Fixed-capacity blocking FIFO queue shared between threads.
///
/// Producers transfer ownership of each item into the queue on a successful
/// push; a pop transfers it out to the consumer. The queue never copies or
/// inspects the items it holds.
///
/// # Thread Safety
///
/// All methods take `&self`; share the queue across threads with
/// [`std::sync::Arc`]. Blocking methods park the calling thread on a
/// condition variable and re-test their condition on every wake, so spurious
/// wakeups are harmless.
///
/// # Shutdown
///
/// [`shutdown`](Self::shutdown) is one-way and idempotent. After it, pushes
/// fail immediately handing the item back, while pops keep draining buffered
/// items in FIFO order and then report the drained state forever.
///
/// # Teardown
///
/// Dropping the queue releases the buffer and all synchronization state. A
/// drop while another thread is blocked inside an operation is
/// unrepresentable in safe code: the `Arc` keeping that thread's reference
/// alive also keeps the queue alive.
///
/// # Poisoning
///
/// Mutex poisoning is recovered transparently. No caller code runs while the
/// lock is held, so a panic in another thread cannot leave the buffer in a
/// torn state.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use conveyor::BoundedQueue;
///
/// let queue = Arc::new(BoundedQueue::new(2)?);
///
/// let consumer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || {
///         let mut seen = Vec::new();
///         while let Some(item) = queue.pop() {
///             seen.push(item);
///         }
///         seen
///     })
/// };
///
/// queue.push("job-1")?;
/// queue.push("job-2")?;
/// queue.shutdown();
///
/// assert_eq!(consumer.join().unwrap(), vec!["job-1", "job-2"]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct BoundedQueue<T> {
    shared: Mutex<Shared<T>>,
    /// Producers park here; signaled on pop and broadcast on shutdown.
    not_full: Condvar,
    /// Consumers park here; signaled on push and broadcast on shutdown.
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue with room for `capacity` items.
    ///
    /// The capacity is fixed for the queue's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`CreateError::ZeroCapacity`] for a zero capacity and
    /// [`CreateError::Allocation`] if the slot storage cannot be allocated.
    pub fn new(capacity: usize) -> Result<Self, CreateError> {
        if capacity == 0 {
            return Err(CreateError::ZeroCapacity);
        }
        let ring = Ring::with_capacity(capacity)
            .map_err(|source| CreateError::Allocation { capacity, source })?;
        debug!(capacity, "bounded queue created");
        Ok(Self {
            shared: Mutex::new(Shared {
                ring,
                shutdown: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    /// Inserts an item, blocking while the queue is full.
    ///
    /// Returns once the item is in the buffer or the queue shuts down,
    /// whichever happens first. A parked producer is released by the shutdown
    /// broadcast and backs out without waiting for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`PushError`] carrying the item if the queue is shut down.
    pub fn push(&self, mut item: T) -> Result<(), PushError<T>> {
        let mut shared = self.lock();
        loop {
            if shared.shutdown {
                return Err(PushError(item));
            }
            match shared.ring.push(item) {
                Ok(()) => {
                    drop(shared);
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(returned) => {
                    item = returned;
                    trace!("producer parked: queue full");
                    shared = self.wait_not_full(shared);
                }
            }
        }
    }

    /// Attempts to insert an item without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TryPushError::Full`] if no slot is free and
    /// [`TryPushError::Shutdown`] if the queue is shut down, carrying the
    /// item in both cases.
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut shared = self.lock();
        if shared.shutdown {
            return Err(TryPushError::Shutdown(item));
        }
        match shared.ring.push(item) {
            Ok(()) => {
                drop(shared);
                self.not_empty.notify_one();
                Ok(())
            }
            Err(item) => Err(TryPushError::Full(item)),
        }
    }

    /// Inserts an item, blocking for at most `timeout`.
    ///
    /// The wait is re-entered after every wake with the remaining time, so a
    /// wake that finds the queue still full does not shorten or forfeit the
    /// deadline, and an expired waiter never swallows a wake meant for
    /// another producer.
    ///
    /// # Errors
    ///
    /// Returns [`PushTimeoutError::Timeout`] if the deadline passes with the
    /// queue still full and [`PushTimeoutError::Shutdown`] if the queue shuts
    /// down, carrying the item in both cases.
    pub fn push_timeout(&self, mut item: T, timeout: Duration) -> Result<(), PushTimeoutError<T>> {
        let deadline = Instant::now() + timeout;
        let mut shared = self.lock();
        loop {
            if shared.shutdown {
                return Err(PushTimeoutError::Shutdown(item));
            }
            match shared.ring.push(item) {
                Ok(()) => {
                    drop(shared);
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(returned) => {
                    item = returned;
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PushTimeoutError::Timeout(item));
                    }
                    trace!("producer parked: queue full");
                    shared = self.wait_not_full_timeout(shared, deadline.duration_since(now));
                }
            }
        }
    }

    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is shut down and fully drained. That
    /// state is terminal: every subsequent call returns `None` immediately,
    /// making it the natural exit signal for consumer loops.
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        let mut shared = self.lock();
        loop {
            if let Some(item) = shared.ring.pop() {
                drop(shared);
                self.not_full.notify_one();
                return Some(item);
            }
            if shared.shutdown {
                return None;
            }
            trace!("consumer parked: queue empty");
            shared = self.wait_not_empty(shared);
        }
    }

    /// Attempts to remove the oldest item without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TryPopError::Empty`] if the queue held no item and
    /// [`TryPopError::Drained`] if it is shut down and empty for good.
    pub fn try_pop(&self) -> Result<T, TryPopError> {
        let mut shared = self.lock();
        match shared.ring.pop() {
            Some(item) => {
                drop(shared);
                self.not_full.notify_one();
                Ok(item)
            }
            None if shared.shutdown => Err(TryPopError::Drained),
            None => Err(TryPopError::Empty),
        }
    }

    /// Removes the oldest item, blocking for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PopTimeoutError::Timeout`] if the deadline passes with the
    /// queue still empty and [`PopTimeoutError::Drained`] if the queue is
    /// shut down and empty for good.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopTimeoutError> {
        let deadline = Instant::now() + timeout;
        let mut shared = self.lock();
        loop {
            if let Some(item) = shared.ring.pop() {
                drop(shared);
                self.not_full.notify_one();
                return Ok(item);
            }
            if shared.shutdown {
                return Err(PopTimeoutError::Drained);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PopTimeoutError::Timeout);
            }
            trace!("consumer parked: queue empty");
            shared = self.wait_not_empty_timeout(shared, deadline.duration_since(now));
        }
    }

    /// Shuts the queue down and wakes every parked thread.
    ///
    /// One-way and idempotent: the first call sets the flag, later calls do
    /// nothing. Parked producers return [`PushError`]; parked consumers drain
    /// whatever is buffered and then observe the drained state.
    pub fn shutdown(&self) {
        let mut shared = self.lock();
        if shared.shutdown {
            return;
        }
        shared.shutdown = true;
        drop(shared);
        debug!("queue shut down");
        // Every waiter has to re-evaluate the flag, so both sides get a
        // broadcast. Push and pop only ever notify_one: they make one unit
        // of progress available, and waking more would stampede.
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    /// Returns the number of buffered items.
    ///
    /// A snapshot for diagnostics: concurrent pushes and pops can invalidate
    /// it before the caller acts on it. Rely on the blocking operations' own
    /// return values for control flow, not on this.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().ring.len()
    }

    /// Returns `true` when the queue holds no items.
    ///
    /// Snapshot semantics, see [`len`](Self::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().ring.is_empty()
    }

    /// Returns `true` when the queue is at capacity.
    ///
    /// Snapshot semantics, see [`len`](Self::len).
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lock().ring.is_full()
    }

    /// Returns the fixed capacity the queue was created with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().ring.capacity()
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_not_full<'a>(&self, guard: MutexGuard<'a, Shared<T>>) -> MutexGuard<'a, Shared<T>> {
        self.not_full
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_not_empty<'a>(&self, guard: MutexGuard<'a, Shared<T>>) -> MutexGuard<'a, Shared<T>> {
        self.not_empty
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_not_full_timeout<'a>(
        &self,
        guard: MutexGuard<'a, Shared<T>>,
        remaining: Duration,
    ) -> MutexGuard<'a, Shared<T>> {
        let (guard, _) = self
            .not_full
            .wait_timeout(guard, remaining)
            .unwrap_or_else(PoisonError::into_inner);
        guard
    }

    fn wait_not_empty_timeout<'a>(
        &self,
        guard: MutexGuard<'a, Shared<T>>,
        remaining: Duration,
    ) -> MutexGuard<'a, Shared<T>> {
        let (guard, _) = self
            .not_empty
            .wait_timeout(guard, remaining)
            .unwrap_or_else(PoisonError::into_inner);
        guard
    }
}
