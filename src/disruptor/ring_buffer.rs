//! The disruptor core: ring storage, the publication cursor, subscriber
//! bookkeeping, and the two blocking protocols described in `SPEC_FULL.md`
//! §4.E.
//!
//! # Locking discipline
//!
//! `next_sequence` and each subscriber's acknowledged sequence are atomics,
//! read lock-free by the non-blocking fast paths (`get`, `cursor`,
//! `Subscriber::current_sequence`). But every mutation that a condition
//! variable predicate depends on — publishing, acknowledging, removing a
//! subscriber, closing — is performed while holding `registry`, the same
//! mutex paired with both condvars. That's what makes the wait protocols
//! race-free: a waiter that finds its predicate false while holding
//! `registry` is guaranteed to still be holding it (or already parked)
//! when a notifier tries to mutate state, because the notifier needs the
//! same lock first.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::{DisruptorError, Result};

use super::consumer::Subscriber;
use super::event_slot::EventSlot;
use super::producer::Publisher;
use super::sequence::Sequence;
use super::wait_strategy::{deadline_from, wait_while_with_timeout, WaitOutcome};

/// Construction-time tuning for a [`Disruptor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisruptorOptions {
    /// Requests a cross-process signalling backend instead of the default
    /// thread-local one, mirroring the source implementation's `multiproc`
    /// switch. This port implements only the thread-local backend (see
    /// `SPEC_FULL.md` §9): setting this to `true` neither errors nor enables
    /// process-shared signalling today. It is accepted for API parity and as
    /// the documented seam a process-shared backend would hang off.
    pub multiproc: bool,
}

/// The progress record the `Disruptor` owns for one registered subscriber.
///
/// Subscribers hold a non-owning `Arc` to this record rather than the record
/// itself — the `Disruptor`'s registry is the sole owner, matching
/// `SPEC_FULL.md` §9's "cyclic references" resolution.
pub(crate) struct SubscriberSlot {
    pub(crate) id: u64,
    pub(crate) sequence: AtomicI64,
}

struct Registry {
    subscribers: HashMap<u64, Arc<SubscriberSlot>>,
    publisher_registered: bool,
    next_subscriber_id: u64,
}

/// Bounded, single-producer / multi-subscriber ring buffer.
///
/// Producers publish events in place via [`Disruptor::publish_event`] (or
/// the [`Publisher`] handle returned by [`Disruptor::register_publisher`]);
/// subscribers consume them in publication order via a [`Subscriber`]
/// handle's `wait_for` + `get` + `update_sequence` cycle. See the crate-level
/// docs for a worked example.
pub struct Disruptor<T: EventSlot> {
    capacity: usize,
    mask: u64,
    ring: Box<[UnsafeCell<T>]>,
    next_sequence: AtomicI64,
    registry: Mutex<Registry>,
    /// Producers wait here for a lagging subscriber to advance.
    producer_cv: Condvar,
    /// Subscribers wait here for the producer to publish.
    consumer_cv: Condvar,
    closed: AtomicBool,
    options: DisruptorOptions,
}

// SAFETY: cross-thread access to `ring` is mediated entirely by the publish
// and wait protocols below. Invariant 5 (SPEC_FULL.md §3) guarantees the
// producer is the sole writer of slot `s & mask` during the window
// `next_sequence == s`, and that no subscriber reads that slot until it has
// observed the publish of `s` through `wait_for`. Invariant 3 guarantees a
// subscriber's unacknowledged slot cannot be reclaimed by the producer while
// that subscriber might still read it. No per-slot lock is needed as a
// result, matching the source design.
unsafe impl<T: EventSlot> Sync for Disruptor<T> {}

impl<T: EventSlot> Disruptor<T> {
    /// Builds a new disruptor with the given `capacity`, which must be a
    /// nonzero power of two, invoking `factory` once per slot to populate
    /// the ring.
    pub fn new<F>(capacity: usize, mut factory: F, options: DisruptorOptions) -> Result<Arc<Self>>
    where
        F: FnMut() -> T,
    {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(DisruptorError::InvalidCapacity);
        }

        let ring: Box<[UnsafeCell<T>]> = (0..capacity).map(|_| UnsafeCell::new(factory())).collect();

        debug!(capacity, multiproc = options.multiproc, "disruptor constructed");

        Ok(Arc::new(Self {
            capacity,
            mask: (capacity - 1) as u64,
            ring,
            next_sequence: AtomicI64::new(0),
            registry: Mutex::new(Registry {
                subscribers: HashMap::new(),
                publisher_registered: false,
                next_subscriber_id: 0,
            }),
            producer_cv: Condvar::new(),
            consumer_cv: Condvar::new(),
            closed: AtomicBool::new(false),
            options,
        }))
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The construction-time options this disruptor was built with.
    pub fn options(&self) -> DisruptorOptions {
        self.options
    }

    /// Whether [`Disruptor::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Registers the single producer, returning a handle whose
    /// `publish_event` is equivalent to calling [`Disruptor::publish_event`]
    /// directly.
    pub fn register_publisher(self: &Arc<Self>) -> Result<Publisher<T>> {
        if self.is_closed() {
            return Err(DisruptorError::DisruptorClosed);
        }
        let mut registry = self.registry.lock();
        if registry.publisher_registered {
            return Err(DisruptorError::PublisherAlreadyRegistered);
        }
        registry.publisher_registered = true;
        drop(registry);
        debug!("publisher registered");
        Ok(Publisher::new(self.clone()))
    }

    /// Registers a new subscriber, starting at the "nothing acknowledged
    /// yet" sentinel regardless of how much has already been published.
    pub fn register_subscriber(self: &Arc<Self>) -> Result<Subscriber<T>> {
        if self.is_closed() {
            return Err(DisruptorError::DisruptorClosed);
        }
        let mut registry = self.registry.lock();
        let id = registry.next_subscriber_id;
        registry.next_subscriber_id += 1;
        let slot = Arc::new(SubscriberSlot {
            id,
            sequence: AtomicI64::new(Sequence::NONE.0),
        });
        registry.subscribers.insert(id, slot.clone());
        drop(registry);
        trace!(subscriber_id = id, "subscriber registered");
        Ok(Subscriber::new(self.clone(), slot))
    }

    /// Removes a previously-registered subscriber, waking any producer
    /// blocked waiting on its progress so it doesn't deadlock against a
    /// consumer that has gone away.
    pub fn remove_subscriber(&self, subscriber: &Subscriber<T>) -> Result<()> {
        let mut registry = self.registry.lock();
        if registry.subscribers.remove(&subscriber.id()).is_none() {
            return Err(DisruptorError::SubscriberNotFound);
        }
        self.producer_cv.notify_all();
        drop(registry);
        trace!(subscriber_id = subscriber.id(), "subscriber removed");
        Ok(())
    }

    /// The highest published sequence. Fails with [`DisruptorError::Empty`]
    /// if nothing has been published yet.
    pub fn cursor(&self) -> Result<Sequence> {
        let next = self.next_sequence.load(Ordering::Acquire);
        if next == 0 {
            return Err(DisruptorError::Empty);
        }
        Ok(Sequence(next - 1))
    }

    /// Reads the slot for `seq`. Callers (subscribers) must have already
    /// observed a successful `wait_for(seq)` before calling this.
    ///
    /// Fails with [`DisruptorError::OutdatedSequence`] if the slot has
    /// already been (or is currently being) overwritten, or
    /// [`DisruptorError::SequenceNotFound`] if `seq` is strictly ahead of
    /// what has been produced.
    pub fn get(&self, seq: Sequence) -> Result<&T> {
        let next = self.next_sequence.load(Ordering::Acquire);
        if seq.0 < next - self.capacity as i64 {
            return Err(DisruptorError::OutdatedSequence);
        }
        if seq.0 > next {
            return Err(DisruptorError::SequenceNotFound);
        }
        let idx = seq.index(self.mask);
        // SAFETY: see the `unsafe impl Sync` comment above.
        Ok(unsafe { &*self.ring[idx].get() })
    }

    /// Blocks until `seq` has been published, the disruptor closes, or
    /// `timeout` elapses.
    pub(crate) fn wait_for(&self, seq: Sequence, timeout: Option<Duration>) -> Result<Sequence> {
        if self.is_closed() {
            return Err(DisruptorError::DisruptorClosed);
        }
        if seq.0 < self.next_sequence.load(Ordering::Acquire) {
            return Ok(seq);
        }

        let guard = self.registry.lock();
        let deadline = deadline_from(timeout);
        let (_guard, outcome) = wait_while_with_timeout(&self.consumer_cv, guard, deadline, |_| {
            self.closed.load(Ordering::Acquire) || seq.0 < self.next_sequence.load(Ordering::Acquire)
        });

        if self.closed.load(Ordering::Acquire) {
            return Err(DisruptorError::DisruptorClosed);
        }
        match outcome {
            WaitOutcome::Ready => Ok(seq),
            WaitOutcome::TimedOut => Err(DisruptorError::Timeout),
        }
    }

    /// Claims the next sequence, blocks until every subscriber has passed
    /// the slot being reclaimed (or `timeout` elapses), invokes `cb` to
    /// mutate the slot in place, then publishes the sequence.
    pub(crate) fn publish_event<F>(&self, cb: F, timeout: Option<Duration>) -> Result<Sequence>
    where
        F: FnOnce(&mut T, Sequence),
    {
        if self.is_closed() {
            return Err(DisruptorError::DisruptorClosed);
        }

        let s = Sequence(self.next_sequence.load(Ordering::Acquire));
        let gate = s.0 - self.capacity as i64;

        self.wait_for_subscribers_past(gate, timeout)?;

        let idx = s.index(self.mask);
        // SAFETY: see the `unsafe impl Sync` comment on `Disruptor`. Every
        // subscriber that was gating this publish has now acknowledged
        // `gate`, so no subscriber can be reading slot `idx` concurrently
        // with this write (invariant 5, SPEC_FULL.md §3).
        let slot = unsafe { &mut *self.ring[idx].get() };
        cb(slot, s);

        let guard = self.registry.lock();
        self.next_sequence.store(s.0 + 1, Ordering::Release);
        self.consumer_cv.notify_all();
        drop(guard);

        trace!(sequence = s.0, "published");
        Ok(s)
    }

    /// Blocks until every subscriber has acknowledged past `gate`, or until
    /// `timeout` elapses. A subscriber that is removed while being waited on
    /// no longer gates the producer.
    ///
    /// The loop may re-scan several times as different subscribers become
    /// the laggard; `timeout` bounds the whole loop, not each iteration, so
    /// the deadline is computed once up front and the *remaining* time is
    /// what's passed to each `wait_while_with_timeout` call.
    fn wait_for_subscribers_past(&self, gate: i64, timeout: Option<Duration>) -> Result<()> {
        let deadline = deadline_from(timeout);
        loop {
            let guard = self.registry.lock();
            let lagging = guard
                .subscribers
                .values()
                .find(|slot| slot.sequence.load(Ordering::Acquire) <= gate)
                .cloned();

            let Some(lagging) = lagging else {
                return Ok(());
            };

            let (_guard, outcome) =
                wait_while_with_timeout(&self.producer_cv, guard, deadline, |registry| {
                    self.closed.load(Ordering::Acquire)
                        || lagging.sequence.load(Ordering::Acquire) > gate
                        || !registry.subscribers.contains_key(&lagging.id)
                });

            if self.closed.load(Ordering::Acquire) {
                return Err(DisruptorError::DisruptorClosed);
            }
            if outcome == WaitOutcome::TimedOut {
                return Err(DisruptorError::Timeout);
            }
            // Re-scan: another subscriber may now be the laggard.
        }
    }

    /// Records that `slot` has processed `seq`, waking any producer blocked
    /// on this subscriber having passed a value `<= seq`.
    pub(crate) fn update_subscriber_sequence(&self, slot: &SubscriberSlot, seq: Sequence) {
        let guard = self.registry.lock();
        slot.sequence.store(seq.0, Ordering::Release);
        self.producer_cv.notify_all();
        drop(guard);
        trace!(subscriber_id = slot.id, sequence = seq.0, "subscriber advanced");
    }

    /// Blocks the caller until `slot.sequence > seq`, the disruptor closes,
    /// or `timeout` elapses. This is the producer-side half of the barrier
    /// described in `SPEC_FULL.md` §4.C (`Subscriber::wait_until_passed`);
    /// `publish_event`'s backpressure loop is built on the same primitive.
    pub(crate) fn wait_until_subscriber_passed(
        &self,
        slot: &SubscriberSlot,
        seq: Sequence,
        timeout: Option<Duration>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(DisruptorError::DisruptorClosed);
        }
        let guard = self.registry.lock();
        let deadline = deadline_from(timeout);
        let (_guard, outcome) = wait_while_with_timeout(&self.producer_cv, guard, deadline, |_| {
            self.closed.load(Ordering::Acquire) || slot.sequence.load(Ordering::Acquire) > seq.0
        });

        if self.closed.load(Ordering::Acquire) {
            return Err(DisruptorError::DisruptorClosed);
        }
        match outcome {
            WaitOutcome::Ready => Ok(()),
            WaitOutcome::TimedOut => Err(DisruptorError::Timeout),
        }
    }

    /// Closes the disruptor. Idempotent: only the first call has effect.
    /// Every subsequent registration or blocking call fails with
    /// [`DisruptorError::DisruptorClosed`], and every waiter blocked in
    /// `publish_event` or `wait_for` at the time of the call wakes within
    /// bounded time with that error.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let guard = self.registry.lock();
        self.producer_cv.notify_all();
        self.consumer_cv.notify_all();
        drop(guard);
        debug!("disruptor closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::thread;

    fn build(capacity: usize) -> Arc<Disruptor<i64>> {
        Disruptor::new(capacity, || 0i64, DisruptorOptions::default()).unwrap()
    }

    /// S6: any non-power-of-two (or zero) capacity is rejected.
    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(5)]
    #[case(6)]
    #[case(7)]
    #[case(100)]
    #[case(1023)]
    fn rejects_non_power_of_two_capacity(#[case] capacity: usize) {
        let err = Disruptor::new(capacity, || 0i64, DisruptorOptions::default()).unwrap_err();
        assert_eq!(err, DisruptorError::InvalidCapacity);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    #[case(1024)]
    fn accepts_power_of_two_capacity(#[case] capacity: usize) {
        let disruptor = Disruptor::new(capacity, || 0i64, DisruptorOptions::default()).unwrap();
        assert_eq!(disruptor.capacity(), capacity);
    }

    #[test]
    fn cursor_is_empty_before_first_publish() {
        let d = build(4);
        assert_eq!(d.cursor().unwrap_err(), DisruptorError::Empty);
    }

    #[test]
    fn publish_without_subscribers_never_blocks() {
        let d = build(2);
        let publisher = d.register_publisher().unwrap();
        for i in 0..10 {
            publisher.publish_event(|slot, _seq| *slot = i, None).unwrap();
        }
        assert_eq!(d.cursor().unwrap(), Sequence(9));
    }

    #[test]
    fn double_publisher_registration_fails() {
        let d = build(4);
        let _p = d.register_publisher().unwrap();
        assert_eq!(
            d.register_publisher().unwrap_err(),
            DisruptorError::PublisherAlreadyRegistered
        );
    }

    #[test]
    fn get_reports_outdated_and_not_found() {
        let d = build(2);
        let publisher = d.register_publisher().unwrap();
        publisher.publish_event(|slot, _| *slot = 1, None).unwrap();
        publisher.publish_event(|slot, _| *slot = 2, None).unwrap();

        // seq 0 has been overwritten: capacity 2, next_sequence is now 2.
        assert_eq!(d.get(Sequence(0)).unwrap_err(), DisruptorError::OutdatedSequence);
        assert_eq!(d.get(Sequence(5)).unwrap_err(), DisruptorError::SequenceNotFound);
        assert_eq!(*d.get(Sequence(1)).unwrap(), 2);
    }

    #[test]
    fn slow_subscriber_backpressures_producer() {
        let d = build(2);
        let publisher = d.register_publisher().unwrap();
        publisher.publish_event(|slot, _| *slot = 1, None).unwrap();
        publisher.publish_event(|slot, _| *slot = 2, None).unwrap();

        let subscriber = d.register_subscriber().unwrap();
        subscriber.wait_for(Sequence(0), None).unwrap();
        subscriber.update_sequence(Sequence(0));

        let err = publisher
            .publish_event(|slot, _| *slot = 3, Some(Duration::ZERO))
            .unwrap_err();
        assert_eq!(err, DisruptorError::Timeout);
    }

    #[test]
    fn wait_for_on_empty_ring_times_out() {
        let d = build(4);
        let publisher = d.register_publisher().unwrap();
        let subscriber = d.register_subscriber().unwrap();
        publisher.publish_event(|slot, _| *slot = 0, None).unwrap();
        subscriber.wait_for(Sequence(0), None).unwrap();
        subscriber.update_sequence(Sequence(0));

        let err = subscriber
            .wait_for(Sequence(1), Some(Duration::ZERO))
            .unwrap_err();
        assert_eq!(err, DisruptorError::Timeout);
    }

    #[test]
    fn close_wakes_blocked_producer_and_subscriber() {
        let d = build(2);
        let publisher = d.register_publisher().unwrap();
        publisher.publish_event(|slot, _| *slot = 1, None).unwrap();
        publisher.publish_event(|slot, _| *slot = 2, None).unwrap();
        let subscriber = d.register_subscriber().unwrap();

        let producer_thread = thread::spawn(move || {
            publisher.publish_event(|slot, _| *slot = 3, Some(Duration::from_secs(5)))
        });

        let subscriber_thread = thread::spawn(move || {
            subscriber.wait_for(Sequence(5), Some(Duration::from_secs(5)))
        });

        thread::sleep(Duration::from_millis(50));
        d.close();

        assert_eq!(producer_thread.join().unwrap().unwrap_err(), DisruptorError::DisruptorClosed);
        assert_eq!(
            subscriber_thread.join().unwrap().unwrap_err(),
            DisruptorError::DisruptorClosed
        );
    }

    #[test]
    fn operations_fail_after_close() {
        let d = build(4);
        d.close();
        assert!(d.is_closed());
        assert_eq!(
            d.register_publisher().unwrap_err(),
            DisruptorError::DisruptorClosed
        );
        assert_eq!(
            d.register_subscriber().unwrap_err(),
            DisruptorError::DisruptorClosed
        );
    }

    #[test]
    fn removing_a_subscriber_unblocks_the_producer() {
        let d = build(2);
        let publisher = d.register_publisher().unwrap();
        publisher.publish_event(|slot, _| *slot = 1, None).unwrap();
        publisher.publish_event(|slot, _| *slot = 2, None).unwrap();

        let subscriber = d.register_subscriber().unwrap();
        // Never acknowledges anything; producer would otherwise block.

        let d2 = d.clone();
        let handle = thread::spawn(move || {
            d2.remove_subscriber(&subscriber).unwrap();
        });
        handle.join().unwrap();

        publisher
            .publish_event(|slot, _| *slot = 3, Some(Duration::from_secs(2)))
            .unwrap();
    }
}
