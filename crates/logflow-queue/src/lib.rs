//! Queue adapter for logflow
//!
//! The gateway only sees [`Publisher`]; the worker consumes [`Delivery`]
//! values and settles each one with `ack` or `nack`. [`MemoryQueue`] is an
//! in-process at-least-once implementation of both sides.

pub mod error;
pub mod memory;
pub mod publisher;

pub use error::{QueueError, Result};
pub use memory::{Delivery, MemoryQueue, QueueStats, ReceivedMessage};
pub use publisher::{MessageId, OutboundMessage, Publisher};
