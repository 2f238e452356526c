//! Subscriber handle: a non-owning reference to a registered consumer's
//! progress record. The `Disruptor` owns the record itself (see
//! `SPEC_FULL.md` §9, "cyclic references").

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

use super::event_slot::EventSlot;
use super::ring_buffer::{Disruptor, SubscriberSlot};
use super::sequence::Sequence;

/// Handle held by a consumer thread, tracking its acknowledged progress
/// against a [`Disruptor`].
///
/// A `Subscriber` doesn't own its progress record — the `Disruptor` does,
/// keyed by [`Subscriber::id`]. This is a cheap handle onto that record plus
/// a reference back to the disruptor, so every method call is self
/// contained.
pub struct Subscriber<T: EventSlot> {
    disruptor: Arc<Disruptor<T>>,
    slot: Arc<SubscriberSlot>,
}

impl<T: EventSlot> Subscriber<T> {
    pub(crate) fn new(disruptor: Arc<Disruptor<T>>, slot: Arc<SubscriberSlot>) -> Self {
        Self { disruptor, slot }
    }

    /// This subscriber's stable identifier, assigned at registration.
    pub fn id(&self) -> u64 {
        self.slot.id
    }

    /// The highest sequence this subscriber has acknowledged, or `None` if
    /// it hasn't processed anything yet.
    pub fn current_sequence(&self) -> Option<Sequence> {
        let raw = self.slot.sequence.load(Ordering::Acquire);
        if raw < 0 {
            None
        } else {
            Some(Sequence(raw))
        }
    }

    /// Records that this subscriber has finished processing `seq`, releasing
    /// any producer blocked on this subscriber having passed a value `<= seq`.
    ///
    /// `seq` should be monotonically increasing across calls from a given
    /// subscriber; the disruptor doesn't defend against a caller going
    /// backwards, matching the single well-behaved consumer loop the source
    /// assumes per subscriber.
    pub fn update_sequence(&self, seq: Sequence) {
        self.disruptor.update_subscriber_sequence(&self.slot, seq);
    }

    /// Blocks until `seq` has been published, the disruptor closes, or
    /// `timeout` elapses. `timeout = None` waits indefinitely;
    /// `Some(Duration::ZERO)` checks without blocking.
    pub fn wait_for(&self, seq: Sequence, timeout: Option<Duration>) -> Result<Sequence> {
        self.disruptor.wait_for(seq, timeout)
    }

    /// Reads the slot for `seq`. The caller must have already observed a
    /// successful [`Subscriber::wait_for`] for this sequence.
    pub fn get(&self, seq: Sequence) -> Result<&T> {
        self.disruptor.get(seq)
    }

    /// Blocks the caller (conventionally a producer) until this subscriber's
    /// [`Subscriber::current_sequence`] has passed `seq`, the disruptor
    /// closes, or `timeout` elapses.
    ///
    /// `Disruptor::publish_event`'s backpressure loop is built on the same
    /// wait primitive this delegates to; it is exposed here so a caller that
    /// holds a `Subscriber` handle directly (e.g. to drive custom
    /// backpressure) doesn't need a second notification mechanism.
    pub fn wait_until_passed(&self, seq: Sequence, timeout: Option<Duration>) -> Result<()> {
        self.disruptor.wait_until_subscriber_passed(&self.slot, seq, timeout)
    }
}
