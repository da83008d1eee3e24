//! The Beacon dispatch queue.
//!
//! Holds one FIFO command sequence per registered agent. Operators append to
//! the tail (or retract from it), agents consume from the head. Everything is
//! in memory; nothing here performs I/O or survives a restart.

/// The agent-to-queue map and its operations.
pub mod dispatch;
/// Outcome of broadcast operations.
pub mod report;
mod worker;

pub use dispatch::DispatchQueue;
pub use report::{BroadcastReport, Delivery, Failure};
