//! Bounded blocking FIFO queues for handing work between threads.
//!
//! The crate's centerpiece is [`BoundedQueue`], a fixed-capacity
//! multi-producer multi-consumer queue with a cooperative shutdown protocol:
//! instead of killing blocked threads or poisoning them with sentinel items,
//! [`BoundedQueue::shutdown`] releases every parked producer and consumer
//! deterministically while the buffered items drain in order.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use conveyor::BoundedQueue;
//!
//! let queue = Arc::new(BoundedQueue::new(8)?);
//!
//! let workers: Vec<_> = (0..2)
//!     .map(|_| {
//!         let queue = Arc::clone(&queue);
//!         thread::spawn(move || {
//!             // `pop` returns `None` only after shutdown, once the queue
//!             // has drained; that is the worker's exit signal.
//!             let mut done = 0;
//!             while queue.pop().is_some() {
//!                 done += 1;
//!             }
//!             done
//!         })
//!     })
//!     .collect();
//!
//! for job in 0..100 {
//!     queue.push(job)?;
//! }
//! queue.shutdown();
//!
//! let done: i32 = workers.into_iter().map(|w| w.join().unwrap()).sum();
//! assert_eq!(done, 100);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod sync;

mod ring;
mod trace;

pub use trace::init_tracing;

#[doc(inline)]
pub use sync::queue::BoundedQueue;
