//! Synchronization primitives for in-process communication.
//!
//! This module provides thread-safe queues for handing owned work items
//! between threads within the same process.

pub mod queue;
