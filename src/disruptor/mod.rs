//! LMAX Disruptor-style bounded ring buffer for single-producer,
//! multi-subscriber event hand-off.
//!
//! The ring buffer consists of:
//! - a fixed, power-of-two array of caller-typed event slots
//! - a monotonic publication cursor (`next_sequence`)
//! - a registry of subscriber progress records
//! - two condition variables implementing the producer-waits-for-slowest-
//!   subscriber and subscriber-waits-for-publication blocking protocols
//!
//! See the crate root for a worked producer/subscriber example.

pub mod consumer;
pub mod event_slot;
pub mod producer;
pub mod ring_buffer;
pub mod sequence;
mod wait_strategy;

pub use consumer::Subscriber;
pub use event_slot::EventSlot;
pub use producer::Publisher;
pub use ring_buffer::{Disruptor, DisruptorOptions};
pub use sequence::Sequence;
