//! The payload contract the ring buffer requires of caller-supplied events.

/// Marker trait for values the ring buffer can store.
///
/// The core never introspects an event's contents: it only needs to own the
/// value, hand out `&mut T` to the producer's callback during the publish
/// window, and hand out `&T` to subscribers afterwards. Any `Send` type
/// satisfies that contract, so this trait is blanket-implemented — it exists
/// to make the `Disruptor<T>` contract self-documenting at the type level,
/// the same role [`crate::disruptor::Sequence`] plays for sequence arithmetic.
pub trait EventSlot: Send {}

impl<T: Send> EventSlot for T {}
