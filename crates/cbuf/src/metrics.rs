use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe running counters for a [`crate::Ring`]; sampled into a
/// [`MetricsSnapshot`] on demand.
///
/// Plain atomics plus a `snapshot()` method; no logging dependency, counters
/// plus the `debug_assert_*!` macros in [`crate::invariants`] cover
/// observability instead.
#[derive(Debug, Default)]
pub struct Metrics {
    blocks_sent: AtomicU64,
    blocks_received: AtomicU64,
    reserve_spins: AtomicU64,
    splice_bytes_in: AtomicU64,
    splice_bytes_out: AtomicU64,
    splice_retries: AtomicU64,
}

impl Metrics {
    /// Creates a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_blocks_sent(&self, n: u64) {
        self.blocks_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_blocks_received(&self, n: u64) {
        self.blocks_received.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_reserve_spin(&self) {
        self.reserve_spins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_splice_bytes_in(&self, n: u64) {
        self.splice_bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_splice_bytes_out(&self, n: u64) {
        self.splice_bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_splice_retry(&self) {
        self.splice_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_sent: self.blocks_sent.load(Ordering::Relaxed),
            blocks_received: self.blocks_received.load(Ordering::Relaxed),
            reserve_spins: self.reserve_spins.load(Ordering::Relaxed),
            splice_bytes_in: self.splice_bytes_in.load(Ordering::Relaxed),
            splice_bytes_out: self.splice_bytes_out.load(Ordering::Relaxed),
            splice_retries: self.splice_retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a [`Metrics`] counter set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total blocks released by producers.
    pub blocks_sent: u64,
    /// Total blocks released by consumers.
    pub blocks_received: u64,
    /// Number of times a reservation attempt found insufficient space.
    pub reserve_spins: u64,
    /// Bytes pulled in via `splice_from_pipe`.
    pub splice_bytes_in: u64,
    /// Bytes pushed out via `splice_to_pipe`.
    pub splice_bytes_out: u64,
    /// Number of `EWOULDBLOCK` retries across all splice calls.
    pub splice_retries: u64,
}

impl std::ops::AddAssign for MetricsSnapshot {
    fn add_assign(&mut self, rhs: Self) {
        self.blocks_sent += rhs.blocks_sent;
        self.blocks_received += rhs.blocks_received;
        self.reserve_spins += rhs.reserve_spins;
        self.splice_bytes_in += rhs.splice_bytes_in;
        self.splice_bytes_out += rhs.splice_bytes_out;
        self.splice_retries += rhs.splice_retries;
    }
}
