//! A lock-free, zero-copy multi-producer/multi-consumer circular buffer.
//!
//! Two storage regimes:
//! - **Inline** ([`Ring`]): payload lives directly inside the ring's own
//!   block storage. Build one with [`Ring::new`] (plain heap memory) or
//!   [`Ring::new_mapped`] (mmap'ed file, so [`splice_from_pipe`]/
//!   [`splice_to_pipe`] can move bytes in and out with a single `splice(2)`
//!   call and no userspace copy).
//! - **Pointer** ([`PointerRing`]): the ring carries only small tracking
//!   records; payload lives in a backing-store file shared by every block,
//!   referenced by `(blk_offset, blk_len, data_len)`.
//!
//! A producer calls [`Ring::reserve_tx`], writes into the returned
//! [`Reservation`]'s blocks (directly or via splice), and calls
//! [`Reservation::commit`]; a consumer mirrors this with
//! [`Ring::reserve_rx`]. [`Checkpoint`] lets a producer detect, after
//! releasing everything it submitted, when the consumer side has drained
//! past that point — even with other producers interleaving and position
//! counters wrapping.
//!
//! This crate never blocks or parks a thread: a failed reservation or a
//! would-block splice returns a sentinel, and the caller decides whether and
//! how to retry ([`Backoff`] helps with the former). There is no
//! cross-process shared memory and no guarantee about payload byte ordering
//! beyond the order callers chose to release in.

mod backing_store;
mod backoff;
mod checkpoint;
mod config;
mod error;
mod geometry;
mod invariants;
mod metrics;
mod pointer_ring;
mod reservation;
mod ring;
mod splice;

pub use backoff::Backoff;
pub use checkpoint::Checkpoint;
pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use error::CbufError;
pub use geometry::{Geometry, GeometryError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pointer_ring::{PointerReservation, PointerRing};
pub use reservation::Reservation;
pub use ring::Ring;
pub use splice::{splice_from_pipe, splice_sz, splice_to_pipe};
