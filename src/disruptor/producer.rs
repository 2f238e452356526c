//! Publisher handle returned by [`Disruptor::register_publisher`].

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

use super::event_slot::EventSlot;
use super::ring_buffer::Disruptor;
use super::sequence::Sequence;

/// Handle held by the single producer thread.
///
/// Equivalent to calling [`Disruptor::publish_event`] directly; it exists so
/// that "a publisher is registered" is a capability the type system tracks
/// rather than an ambient permission every caller of `Disruptor` implicitly
/// has.
pub struct Publisher<T: EventSlot> {
    disruptor: Arc<Disruptor<T>>,
}

impl<T: EventSlot> Publisher<T> {
    pub(crate) fn new(disruptor: Arc<Disruptor<T>>) -> Self {
        Self { disruptor }
    }

    /// Claims the next sequence, blocks until every subscriber has passed
    /// the slot being reclaimed (or `timeout` elapses), invokes `cb` to
    /// mutate the claimed slot in place, then publishes the sequence.
    pub fn publish_event<F>(&self, cb: F, timeout: Option<Duration>) -> Result<Sequence>
    where
        F: FnOnce(&mut T, Sequence),
    {
        self.disruptor.publish_event(cb, timeout)
    }

    /// The highest sequence published so far.
    pub fn cursor(&self) -> Result<Sequence> {
        self.disruptor.cursor()
    }

    /// Whether the underlying disruptor has been closed.
    pub fn is_closed(&self) -> bool {
        self.disruptor.is_closed()
    }

    /// Closes the underlying disruptor.
    pub fn close(&self) {
        self.disruptor.close();
    }
}
