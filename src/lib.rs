//! Flux - bounded single-producer / multi-subscriber ring buffer
//! implementing the LMAX Disruptor pattern.
//!
//! A [`disruptor::Disruptor`] hands typed events from one producer to any
//! number of subscribers without per-message allocation: the producer
//! claims the next slot, blocks only if the slowest subscriber hasn't yet
//! passed it, mutates it in place, then publishes. Subscribers block on the
//! publication cursor rather than polling.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use flux_disruptor::disruptor::{Disruptor, DisruptorOptions, Sequence};
//!
//! let disruptor: Arc<Disruptor<i64>> =
//!     Disruptor::new(8, || 0i64, DisruptorOptions::default()).unwrap();
//!
//! let publisher = disruptor.register_publisher().unwrap();
//! let subscriber = disruptor.register_subscriber().unwrap();
//!
//! publisher
//!     .publish_event(|slot, _seq| *slot = 42, None)
//!     .unwrap();
//!
//! let seq = subscriber.wait_for(Sequence(0), Some(Duration::from_secs(1))).unwrap();
//! assert_eq!(*subscriber.get(seq).unwrap(), 42);
//! subscriber.update_sequence(seq);
//! ```

pub mod disruptor;
pub mod error;

pub use disruptor::{Disruptor, DisruptorOptions, EventSlot, Publisher, Sequence, Subscriber};
pub use error::{DisruptorError, Result};

/// Crate version, re-exported for callers that want to log or assert it.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
