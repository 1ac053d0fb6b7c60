//! The pointer-ring (`p-ring`): a ring whose blocks hold tracking records
//! instead of payload, pointing into a separately-mapped backing-store file.
//!
//! Rather than repeating a `(fd, iovec, file_path)` tuple per block, those
//! fields live once, in an `Arc<BackingStore>` shared by every
//! [`PointerReservation`], and each block stores only `(blk_id, blk_offset,
//! blk_len, data_len)` — all `Copy`, read and written through safe
//! little-endian byte conversion rather than a raw pointer overlaid onto ring
//! memory, which would risk writing past a block's own bounds into its
//! neighbors.

use std::os::unix::io::RawFd;
use std::path::Path;
use std::sync::Arc;

use crate::backing_store::BackingStore;
use crate::config::Config;
use crate::error::CbufError;
use crate::ring::Ring;
use crate::splice::{file_to_pipe, pipe_to_file};

/// Size in bytes of a serialized tracking record: `blk_id: u32`,
/// `blk_offset: u64`, `blk_len: u32`, `data_len: u64`.
const RECORD_SIZE: u32 = 4 + 8 + 4 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockSlot {
    blk_id: u32,
    blk_offset: u64,
    blk_len: u32,
    data_len: u64,
}

impl BlockSlot {
    fn read(bytes: &[u8]) -> Self {
        Self {
            blk_id: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            blk_offset: u64::from_le_bytes(bytes[4..12].try_into().unwrap()),
            blk_len: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
            data_len: u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
        }
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.blk_id.to_le_bytes());
        bytes[4..12].copy_from_slice(&self.blk_offset.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.blk_len.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.data_len.to_le_bytes());
    }
}

/// A ring whose blocks are tracking records referencing slices of a shared,
/// mmap'ed backing-store file.
pub struct PointerRing {
    tracking: Ring,
    backing: Arc<BackingStore>,
}

impl PointerRing {
    /// Creates a pointer-ring: an inline tracking-record ring of `block_count`
    /// slots, plus a backing-store file in `backing_dir` sized to hold
    /// `block_count` (rounded up, per the tracking ring's own geometry)
    /// slices of `payload_block_size` bytes each.
    ///
    /// Initializes every slot: reserve and release each tracking block once
    /// on the producer side (writing its permanent `(blk_id, blk_offset)`),
    /// then reserve and release the whole ring on the consumer side, so every
    /// slot starts out in the producer's unused pool exactly as a
    /// freshly-created inline ring would.
    pub fn new(payload_block_size: u32, block_count: u32, backing_dir: &Path) -> Result<Self, CbufError> {
        if payload_block_size == 0 {
            return Err(CbufError::Geometry(crate::geometry::GeometryError::ZeroSize));
        }
        let tracking = Ring::new(Config::new(RECORD_SIZE, block_count, false))?;
        let slots = tracking.block_count();
        let backing = Arc::new(BackingStore::create(backing_dir, payload_block_size as usize * slots as usize)?);

        for blk_id in 0..slots {
            let mut res = tracking.reserve_tx(1).expect("freshly-created ring always has room for its own init pass");
            let slot = BlockSlot {
                blk_id,
                blk_offset: u64::from(blk_id) * u64::from(payload_block_size),
                blk_len: payload_block_size,
                data_len: 0,
            };
            slot.write(res.block_mut(0));
            res.commit();
        }
        let drain = tracking.reserve_rx(slots).expect("every block was just released to the ready pool");
        drain.commit();

        Ok(Self { tracking, backing })
    }

    #[must_use]
    pub fn block_count(&self) -> u32 {
        self.tracking.block_count()
    }

    #[must_use]
    pub fn payload_block_size(&self) -> u32 {
        (self.backing.len() / self.tracking.block_count().max(1) as usize) as u32
    }

    #[must_use]
    pub fn backing_path(&self) -> &Path {
        self.backing.path()
    }

    pub fn reserve_tx(&self, n: u32) -> Option<PointerReservation<'_>> {
        self.tracking.reserve_tx(n).map(|inner| PointerReservation::new(inner, &self.backing, &self.tracking))
    }

    pub fn reserve_tx_cap(&self, n: u32) -> Option<PointerReservation<'_>> {
        self.tracking.reserve_tx_cap(n).map(|inner| PointerReservation::new(inner, &self.backing, &self.tracking))
    }

    pub fn reserve_rx(&self, n: u32) -> Option<PointerReservation<'_>> {
        self.tracking.reserve_rx(n).map(|inner| PointerReservation::new(inner, &self.backing, &self.tracking))
    }

    pub fn reserve_rx_cap(&self, n: u32) -> Option<PointerReservation<'_>> {
        self.tracking.reserve_rx_cap(n).map(|inner| PointerReservation::new(inner, &self.backing, &self.tracking))
    }
}

/// A run of tracking-record blocks held by one side, paired with the shared
/// backing store they reference.
pub struct PointerReservation<'a> {
    inner: crate::reservation::Reservation<'a>,
    backing: &'a Arc<BackingStore>,
    tracking: &'a Ring,
}

impl<'a> PointerReservation<'a> {
    fn new(inner: crate::reservation::Reservation<'a>, backing: &'a Arc<BackingStore>, tracking: &'a Ring) -> Self {
        Self { inner, backing, tracking }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn slot(&self, i: usize) -> BlockSlot {
        BlockSlot::read(self.inner.block(i))
    }

    /// Splices up to `size` bytes from `fd_pipe` into block `i`'s backing
    /// slice, obeying `blk_len` as the maximum transfer, and records the
    /// transferred length as `data_len`.
    pub fn splice_from_pipe(&mut self, i: usize, fd_pipe: RawFd, size: usize) -> usize {
        let slot = self.slot(i);
        let clamped = size.min(slot.blk_len as usize);
        let n = pipe_to_file(
            fd_pipe,
            self.backing.fd(),
            slot.blk_offset,
            clamped,
            self.tracking.metrics_ref(),
            self.tracking.metrics_enabled(),
        );
        BlockSlot { data_len: n as u64, ..slot }.write(self.inner.block_mut(i));
        n
    }

    /// Splices block `i`'s recorded `data_len` bytes from the backing store
    /// out to `fd_pipe`. Returns 0 if `data_len` is 0.
    #[must_use]
    pub fn splice_to_pipe(&self, i: usize, fd_pipe: RawFd) -> usize {
        let slot = self.slot(i);
        if slot.data_len == 0 {
            return 0;
        }
        file_to_pipe(
            self.backing.fd(),
            slot.blk_offset,
            fd_pipe,
            slot.data_len as usize,
            self.tracking.metrics_ref(),
            self.tracking.metrics_enabled(),
        )
    }

    /// The payload length recorded for block `i` (`data_len`).
    #[must_use]
    pub fn splice_sz(&self, i: usize) -> usize {
        self.slot(i).data_len as usize
    }

    pub fn commit(self) {
        self.inner.commit();
    }

    pub fn commit_n(self, n: usize) {
        self.inner.commit_n(n);
    }
}
