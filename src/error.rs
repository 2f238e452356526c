//! Error types for the disruptor core.

use thiserror::Error;

/// Result type alias for disruptor operations.
pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Errors surfaced by [`crate::disruptor::Disruptor`] and its handles.
///
/// Every failure mode is reported synchronously to the caller; the core never
/// retries or recovers internally. `Timeout` and `DisruptorClosed` are expected,
/// non-fatal outcomes of a bounded wait. `OutdatedSequence` is diagnostic: a
/// subscriber that receives it has lost data irrecoverably and must restart
/// from [`crate::disruptor::Disruptor::cursor`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisruptorError {
    /// The disruptor has been closed; no further registration or blocking
    /// operation will succeed.
    #[error("disruptor is closed")]
    DisruptorClosed,

    /// `register_publisher` was called while a publisher is already registered.
    #[error("a publisher is already registered")]
    PublisherAlreadyRegistered,

    /// `remove_subscriber` referenced a subscriber id that is not registered.
    #[error("subscriber not found")]
    SubscriberNotFound,

    /// The requested sequence has fallen more than `capacity` slots behind the
    /// cursor; its slot has been overwritten by the producer.
    #[error("sequence has been overwritten by the producer")]
    OutdatedSequence,

    /// The requested sequence has not been published yet.
    #[error("sequence has not been produced yet")]
    SequenceNotFound,

    /// `cursor` was called before anything had been published.
    #[error("nothing has been published yet")]
    Empty,

    /// A bounded wait elapsed before its predicate became true.
    #[error("operation timed out")]
    Timeout,

    /// `capacity` was zero or not a power of two.
    #[error("capacity must be a nonzero power of two")]
    InvalidCapacity,

    /// The event slot factory failed to produce a usable slot.
    ///
    /// Kept for parity with the source error taxonomy; a Rust factory is
    /// `FnMut() -> T`, so an invalid factory isn't representable at this
    /// call site and this variant is currently never constructed.
    #[error("event slot factory is invalid")]
    InvalidFactory,
}

impl DisruptorError {
    /// Whether this error is an expected, non-fatal outcome of a bounded wait
    /// rather than a programming error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout | Self::DisruptorClosed)
    }
}
