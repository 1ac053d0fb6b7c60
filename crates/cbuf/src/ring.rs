//! The ring core: geometry-backed byte storage plus the six-counter
//! reservation/release state machine.
//!
//! Three logically distinct regions, split across cache lines:
//! - **immutable**: `block_size`/`block_shift`/`overflow_mask`/`buf` — set at
//!   construction, read-only afterwards, no padding needed.
//! - **producer line** (`CachePadded<ProducerLine>`): `snd_pos`, `sz_unused`,
//!   `snd_reserved`, `snd_uncommitted` — written by producers, read by
//!   consumers taking a checkpoint.
//! - **consumer line** (`CachePadded<ConsumerLine>`): `rcv_pos`, `sz_ready`,
//!   `rcv_reserved`, `rcv_uncommitted` — the mirror image.
//!
//! Reservation uses a fetch-then-undo trick (attempt the subtraction
//! optimistically, put it back if it went negative) rather than a CAS retry
//! loop — cheaper under the single-writer-per-attempt contention this buffer
//! expects.

use std::cell::UnsafeCell;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crossbeam_utils::CachePadded;

use crate::backing_store::BackingStore;
use crate::config::Config;
use crate::error::CbufError;
use crate::invariants::{
    debug_assert_block_in_span, debug_assert_block_multiple, debug_assert_conserved, debug_assert_pool_bounded,
};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::reservation::Reservation;

/// Byte length of the little-endian length header inline splice prefixes onto
/// each block; `payload_offset` skips exactly this many bytes.
pub(crate) const PAYLOAD_HEADER_LEN: u32 = 8;

/// Which side of the ring an operation concerns. Not exposed on the public
/// API directly — callers reach it through `reserve_tx`/`reserve_rx` and
/// friends; `Reservation` remembers its side so `commit` releases correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Tx,
    Rx,
}

#[derive(Debug)]
struct ProducerLine {
    snd_pos: AtomicU32,
    sz_unused: AtomicI64,
    snd_reserved: AtomicU32,
    snd_uncommitted: AtomicU32,
}

#[derive(Debug)]
struct ConsumerLine {
    rcv_pos: AtomicU32,
    sz_ready: AtomicI64,
    rcv_reserved: AtomicU32,
    rcv_uncommitted: AtomicU32,
}

/// Where the ring's bytes actually live.
enum Storage {
    /// Plain process-heap memory — the common case for an inline ring used
    /// only for in-process handoff, and always the case for a pointer-ring's
    /// tracking-record ring (see `pointer_ring.rs`).
    Heap(Box<[u8]>),
    /// An mmap'ed regular file — lets `splice.rs` move bytes directly between
    /// a pipe and this ring's memory via the file's fd, true zero-copy.
    Mapped(BackingStore),
}

impl Storage {
    fn as_ptr(&self) -> *const u8 {
        match self {
            Self::Heap(b) => b.as_ptr(),
            Self::Mapped(m) => m.as_ptr(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Heap(b) => b.len(),
            Self::Mapped(m) => m.len(),
        }
    }

    fn fd(&self) -> Option<RawFd> {
        match self {
            Self::Heap(_) => None,
            Self::Mapped(m) => Some(m.fd()),
        }
    }
}

/// A lock-free, fixed-capacity, multi-producer/multi-consumer block buffer.
///
/// See the crate docs for the inline-vs-pointer storage distinction; a
/// `Ring` is the inline regime's complete implementation and also the
/// tracking-record storage underneath [`crate::pointer_ring::PointerRing`].
pub struct Ring {
    block_size: u32,
    block_shift: u32,
    block_count: u32,
    overflow_mask: u32,
    buf: UnsafeCell<Storage>,
    producer: CachePadded<ProducerLine>,
    consumer: CachePadded<ConsumerLine>,
    metrics: Metrics,
    enable_metrics: bool,
}

// SAFETY: all access to `buf` goes through `offset`-derived, non-overlapping
// block ranges guarded by the six-counter reservation protocol below; no two
// live `&mut [u8]` ever alias the same bytes.
unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Ring {
    /// Builds a heap-backed ring: `config.block_size` and `config.block_count`
    /// are rounded to powers of two by [`crate::geometry::Geometry`].
    pub fn new(config: Config) -> Result<Self, CbufError> {
        let geometry = config.geometry()?;
        let buf = vec![0u8; geometry.total_bytes() as usize].into_boxed_slice();
        Ok(Self::from_storage(geometry, Storage::Heap(buf), config.enable_metrics))
    }

    /// Builds an mmap-file-backed ring in `dir`, so [`crate::splice`] can
    /// splice directly into its memory via the backing file's descriptor.
    pub fn new_mapped(config: Config, dir: &std::path::Path) -> Result<Self, CbufError> {
        let geometry = config.geometry()?;
        let store = BackingStore::create(dir, geometry.total_bytes() as usize)?;
        Ok(Self::from_storage(geometry, Storage::Mapped(store), config.enable_metrics))
    }

    fn from_storage(geometry: crate::geometry::Geometry, storage: Storage, enable_metrics: bool) -> Self {
        debug_assert_eq!(storage.len(), geometry.total_bytes() as usize);
        Self {
            block_size: geometry.block_size,
            block_shift: geometry.block_shift,
            block_count: geometry.block_count,
            overflow_mask: geometry.overflow_mask,
            buf: UnsafeCell::new(storage),
            producer: CachePadded::new(ProducerLine {
                snd_pos: AtomicU32::new(0),
                sz_unused: AtomicI64::new(i64::from(geometry.total_bytes())),
                snd_reserved: AtomicU32::new(0),
                snd_uncommitted: AtomicU32::new(0),
            }),
            consumer: CachePadded::new(ConsumerLine {
                rcv_pos: AtomicU32::new(0),
                sz_ready: AtomicI64::new(0),
                rcv_reserved: AtomicU32::new(0),
                rcv_uncommitted: AtomicU32::new(0),
            }),
            metrics: Metrics::new(),
            enable_metrics,
        }
    }

    /// Resets the ring to a freshly-constructed state: all blocks unused,
    /// nothing ready, no positions advanced. Construction-time only — callers
    /// are responsible for ensuring no reservations are outstanding, checked
    /// with a `debug_assert!` rather than enforced at runtime.
    pub fn zero(&self) {
        debug_assert_eq!(self.producer.snd_reserved.load(Ordering::Acquire), 0, "zero() called with outstanding tx reservations");
        debug_assert_eq!(self.consumer.rcv_reserved.load(Ordering::Acquire), 0, "zero() called with outstanding rx reservations");
        self.producer.snd_pos.store(0, Ordering::Release);
        self.consumer.rcv_pos.store(0, Ordering::Release);
        self.producer.snd_reserved.store(0, Ordering::Release);
        self.producer.snd_uncommitted.store(0, Ordering::Release);
        self.consumer.rcv_reserved.store(0, Ordering::Release);
        self.consumer.rcv_uncommitted.store(0, Ordering::Release);
        self.producer.sz_unused.store(i64::from(self.total_bytes()), Ordering::Release);
        self.consumer.sz_ready.store(0, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    #[inline]
    #[must_use]
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    #[inline]
    #[must_use]
    pub fn total_bytes(&self) -> u32 {
        self.overflow_mask + 1
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn metrics_ref(&self) -> &Metrics {
        &self.metrics
    }

    pub(crate) fn metrics_enabled(&self) -> bool {
        self.enable_metrics
    }

    /// Descriptor of the backing file, if this ring was built with
    /// [`Ring::new_mapped`] — `None` for a heap-backed ring.
    #[must_use]
    pub(crate) fn mmap_fd(&self) -> Option<RawFd> {
        // SAFETY: reading the storage's own fd never touches ring bytes.
        unsafe { (*self.buf.get()).fd() }
    }

    /// Byte offset of the `i`-th block past position `pos`, wrapped into the
    /// buffer span. `pos` is a raw, unmasked running byte count (as returned
    /// by `snd_pos`/`rcv_pos`); masking happens only here, at the point of
    /// dereference — positions themselves stay monotonic (mod 2^32) so
    /// [`crate::checkpoint`] can diff them safely across wraparound.
    #[inline]
    #[must_use]
    pub fn offset(&self, pos: u32, i: u32) -> u32 {
        let byte_off = i << self.block_shift;
        let addr = pos.wrapping_add(byte_off) & self.overflow_mask;
        debug_assert_block_in_span!(addr, self.block_size, self.total_bytes());
        addr
    }

    /// Like [`Ring::offset`] but skips the length header inline splice writes
    /// at the start of each block.
    #[inline]
    #[must_use]
    pub(crate) fn payload_offset(&self, pos: u32, i: u32) -> u32 {
        self.offset(pos, i) + PAYLOAD_HEADER_LEN
    }

    fn base_ptr(&self) -> *mut u8 {
        // SAFETY: the returned pointer is only ever used to derive
        // non-overlapping block slices under the reservation protocol.
        unsafe { (*self.buf.get()).as_ptr() as *mut u8 }
    }

    /// # Safety
    /// The caller must hold a live reservation covering block `i` at `pos`.
    pub(crate) unsafe fn block_slice_mut<'a>(&'a self, pos: u32, i: u32) -> &'a mut [u8] {
        let off = self.offset(pos, i) as usize;
        let len = self.block_size as usize;
        std::slice::from_raw_parts_mut(self.base_ptr().add(off), len)
    }

    /// # Safety
    /// The caller must hold a live reservation covering block `i` at `pos`.
    pub(crate) unsafe fn block_slice<'a>(&'a self, pos: u32, i: u32) -> &'a [u8] {
        let off = self.offset(pos, i) as usize;
        let len = self.block_size as usize;
        std::slice::from_raw_parts(self.base_ptr().add(off), len)
    }

    // ------------------------------------------------------------------
    // reserve / release — producer side
    // ------------------------------------------------------------------

    /// Reserves exactly `n` blocks for the producer side, or `None` if fewer
    /// than `n` blocks are currently unused.
    pub fn reserve_tx(&self, n: u32) -> Option<Reservation<'_>> {
        self.reserve_side(Side::Tx, n)
    }

    /// Reserves up to `n` blocks, accepting fewer if the pool can't cover
    /// all of `n` right now. Returns `None` only if zero blocks are
    /// available.
    pub fn reserve_tx_cap(&self, n: u32) -> Option<Reservation<'_>> {
        self.reserve_cap_side(Side::Tx, n)
    }

    /// Releases `n` previously-reserved producer blocks, making them visible
    /// to the consumer side once all concurrently-outstanding producer
    /// reservations have drained.
    pub(crate) fn release_tx(&self, n: u32) {
        self.release_side(Side::Tx, n);
    }

    /// Releases `n` blocks directly into the consumer's ready pool, skipping
    /// the uncommitted staging step entirely.
    ///
    /// # Safety
    /// Valid only under single-reserver discipline: the caller must guarantee
    /// no other producer reservation is concurrently outstanding. Violating
    /// this can make the ready pool visible out of position order.
    pub unsafe fn release_tx_scary(&self, n: u32) {
        self.release_side_scary(Side::Tx, n);
    }

    // ------------------------------------------------------------------
    // reserve / release — consumer side
    // ------------------------------------------------------------------

    /// Reserves exactly `n` ready blocks for the consumer side, or `None`.
    pub fn reserve_rx(&self, n: u32) -> Option<Reservation<'_>> {
        self.reserve_side(Side::Rx, n)
    }

    /// Reserves up to `n` ready blocks, accepting fewer.
    pub fn reserve_rx_cap(&self, n: u32) -> Option<Reservation<'_>> {
        self.reserve_cap_side(Side::Rx, n)
    }

    pub(crate) fn release_rx(&self, n: u32) {
        self.release_side(Side::Rx, n);
    }

    /// # Safety
    /// Valid only under single-reserver discipline (see [`Ring::release_tx_scary`]).
    pub unsafe fn release_rx_scary(&self, n: u32) {
        self.release_side_scary(Side::Rx, n);
    }

    /// The consumer's current logical position — `(snd_pos + sz_unused) &
    /// overflow_mask` — and how many blocks it presently holds across both
    /// `reserved` and `uncommitted`. Not thread-safe with respect to other
    /// consumer-side operations; for single-consumer introspection only.
    #[must_use]
    pub fn rcv_held(&self) -> (u32, u32) {
        let snd_pos = self.producer.snd_pos.load(Ordering::Acquire);
        let sz_unused = self.producer.sz_unused.load(Ordering::Acquire).max(0) as u32;
        let pos = snd_pos.wrapping_add(sz_unused) & self.overflow_mask;
        let held_bytes = self.consumer.rcv_reserved.load(Ordering::Acquire)
            + self.consumer.rcv_uncommitted.load(Ordering::Acquire);
        (pos, held_bytes / self.block_size)
    }

    /// Raw (unmasked) producer position — used by [`crate::checkpoint`].
    pub(crate) fn snd_pos_raw(&self) -> u32 {
        self.producer.snd_pos.load(Ordering::Acquire)
    }

    /// Raw (unmasked) consumer position — used by [`crate::checkpoint`].
    pub(crate) fn rcv_pos_raw(&self) -> u32 {
        self.consumer.rcv_pos.load(Ordering::Acquire)
    }

    pub(crate) fn sz_unused_raw(&self) -> i64 {
        self.producer.sz_unused.load(Ordering::Acquire)
    }

    pub(crate) fn sz_ready_raw(&self) -> i64 {
        self.consumer.sz_ready.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // shared implementation
    // ------------------------------------------------------------------

    fn reserve_side(&self, side: Side, n: u32) -> Option<Reservation<'_>> {
        let nbytes = i64::from(n) * i64::from(self.block_size);
        let pool = match side {
            Side::Tx => &self.producer.sz_unused,
            Side::Rx => &self.consumer.sz_ready,
        };

        // Optimistic fetch_sub: try to take the bytes, then check whether the
        // pool went negative. If it did, nobody else can have observed a
        // valid (non-negative) pool in the interim because every other
        // reserver performs the same check-and-undo, so putting the bytes
        // back is safe and uncontended in effect.
        let prev = pool.fetch_sub(nbytes, Ordering::AcqRel);
        if prev - nbytes < 0 {
            pool.fetch_add(nbytes, Ordering::AcqRel);
            if self.enable_metrics {
                self.metrics.add_reserve_spin();
            }
            return None;
        }

        let reserved_counter = match side {
            Side::Tx => &self.producer.snd_reserved,
            Side::Rx => &self.consumer.rcv_reserved,
        };
        reserved_counter.fetch_add(n * self.block_size, Ordering::AcqRel);
        debug_assert_block_multiple!("reserved", reserved_counter.load(Ordering::Relaxed), self.block_size);

        let pos_counter = match side {
            Side::Tx => &self.producer.snd_pos,
            Side::Rx => &self.consumer.rcv_pos,
        };
        let pos = pos_counter.fetch_add(nbytes as u32, Ordering::AcqRel);

        Some(Reservation::new(self, side, pos, n))
    }

    fn reserve_cap_side(&self, side: Side, mut n: u32) -> Option<Reservation<'_>> {
        loop {
            if n == 0 {
                return None;
            }
            if let Some(r) = self.reserve_side(side, n) {
                return Some(r);
            }
            let pool = match side {
                Side::Tx => &self.producer.sz_unused,
                Side::Rx => &self.consumer.sz_ready,
            };
            let avail_bytes = pool.load(Ordering::Acquire).max(0) as u64;
            let avail_blocks = (avail_bytes / u64::from(self.block_size)) as u32;
            if avail_blocks == 0 {
                return None;
            }
            n = n.min(avail_blocks);
        }
    }

    fn release_side(&self, side: Side, n: u32) {
        let nbytes = n * self.block_size;
        match side {
            Side::Tx => {
                self.producer.snd_reserved.fetch_sub(nbytes, Ordering::AcqRel);
                self.producer.snd_uncommitted.fetch_add(nbytes, Ordering::AcqRel);
                self.try_migrate(Side::Tx);
                if self.enable_metrics {
                    self.metrics.add_blocks_sent(u64::from(n));
                }
            }
            Side::Rx => {
                self.consumer.rcv_reserved.fetch_sub(nbytes, Ordering::AcqRel);
                self.consumer.rcv_uncommitted.fetch_add(nbytes, Ordering::AcqRel);
                self.try_migrate(Side::Rx);
                if self.enable_metrics {
                    self.metrics.add_blocks_received(u64::from(n));
                }
            }
        }
        debug_assert_pool_bounded!("sz_unused", self.producer.sz_unused.load(Ordering::Relaxed), self.total_bytes());
        debug_assert_pool_bounded!("sz_ready", self.consumer.sz_ready.load(Ordering::Relaxed), self.total_bytes());
        debug_assert_conserved!(
            self.producer.sz_unused.load(Ordering::Relaxed),
            self.consumer.sz_ready.load(Ordering::Relaxed),
            self.producer.snd_reserved.load(Ordering::Relaxed),
            self.producer.snd_uncommitted.load(Ordering::Relaxed),
            self.consumer.rcv_reserved.load(Ordering::Relaxed),
            self.consumer.rcv_uncommitted.load(Ordering::Relaxed),
            self.total_bytes()
        );
    }

    /// Moves a side's staged `uncommitted` bytes into the opposite side's
    /// pool once that side's `reserved` counter has drained to zero.
    ///
    /// `swap(0, ..)` makes concurrent migration attempts idempotent: if two
    /// releasers both observe `reserved == 0` and both swap, the second swap
    /// reads back 0 and adds nothing, so bytes are never double-counted or
    /// lost regardless of which thread's release happened to be "last".
    fn try_migrate(&self, side: Side) {
        match side {
            Side::Tx => {
                if self.producer.snd_reserved.load(Ordering::Acquire) == 0 {
                    let staged = self.producer.snd_uncommitted.swap(0, Ordering::AcqRel);
                    if staged > 0 {
                        self.consumer.sz_ready.fetch_add(i64::from(staged), Ordering::AcqRel);
                    }
                }
            }
            Side::Rx => {
                if self.consumer.rcv_reserved.load(Ordering::Acquire) == 0 {
                    let staged = self.consumer.rcv_uncommitted.swap(0, Ordering::AcqRel);
                    if staged > 0 {
                        self.producer.sz_unused.fetch_add(i64::from(staged), Ordering::AcqRel);
                    }
                }
            }
        }
    }

    fn release_side_scary(&self, side: Side, n: u32) {
        let nbytes = n * self.block_size;
        match side {
            Side::Tx => {
                self.producer.snd_reserved.fetch_sub(nbytes, Ordering::AcqRel);
                self.consumer.sz_ready.fetch_add(i64::from(nbytes), Ordering::AcqRel);
                if self.enable_metrics {
                    self.metrics.add_blocks_sent(u64::from(n));
                }
            }
            Side::Rx => {
                self.consumer.rcv_reserved.fetch_sub(nbytes, Ordering::AcqRel);
                self.producer.sz_unused.fetch_add(i64::from(nbytes), Ordering::AcqRel);
                if self.enable_metrics {
                    self.metrics.add_blocks_received(u64::from(n));
                }
            }
        }
    }
}
