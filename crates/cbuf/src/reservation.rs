use crate::ring::{Ring, Side};

/// A run of `n` blocks held exclusively by one side (producer or consumer)
/// between `reserve` and `release`.
///
/// A reservation may straddle the end of the buffer, so instead of handing
/// out one contiguous slice, [`Reservation::block`] / [`Reservation::block_mut`]
/// address one block at a time through [`Ring::offset`], which resolves the
/// wraparound for each index independently.
pub struct Reservation<'a> {
    ring: &'a Ring,
    side: Side,
    pos: u32,
    n: u32,
    released: bool,
}

impl<'a> Reservation<'a> {
    pub(crate) fn new(ring: &'a Ring, side: Side, pos: u32, n: u32) -> Self {
        Self {
            ring,
            side,
            pos,
            n,
            released: false,
        }
    }

    /// Number of blocks actually reserved (may be less than requested for a
    /// `reserve_*_cap` call).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.n as usize
    }

    /// True if this reservation holds zero blocks.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The starting position token — opaque, not a byte address. Meaningful
    /// only when re-fed to [`Ring::offset`] (e.g. for splicing).
    #[inline]
    #[must_use]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Mutable view of the `i`-th block (`i < len()`), address resolved via
    /// [`Ring::offset`] so callers never hand-roll the wraparound mask.
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    pub fn block_mut(&mut self, i: usize) -> &mut [u8] {
        assert!(i < self.len(), "block index {i} out of range ({})", self.n);
        // SAFETY: this side exclusively owns blocks [pos, pos+n) until release();
        // no other thread can alias this range (see Ring's state-machine invariants).
        unsafe { self.ring.block_slice_mut(self.pos, i as u32) }
    }

    /// Immutable view of the `i`-th block (`i < len()`).
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    pub fn block(&self, i: usize) -> &[u8] {
        assert!(i < self.len(), "block index {i} out of range ({})", self.n);
        // SAFETY: see `block_mut`.
        unsafe { self.ring.block_slice(self.pos, i as u32) }
    }

    /// Releases all `len()` blocks, making them visible to the opposite side
    /// once every concurrently outstanding reservation on this side has also
    /// released.
    pub fn commit(self) {
        let n = self.n;
        self.commit_n(n as usize);
    }

    /// Releases `n <= len()` blocks.
    ///
    /// # Panics
    /// Panics if `n > len()`.
    pub fn commit_n(mut self, n: usize) {
        assert!(n <= self.len(), "cannot release more than reserved");
        #[allow(clippy::cast_possible_truncation)]
        let n = n as u32;
        match self.side {
            Side::Tx => self.ring.release_tx(n),
            Side::Rx => self.ring.release_rx(n),
        }
        self.released = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        // A reservation dropped without `commit`/`commit_n` permanently holds
        // its blocks reserved; nothing releases on your behalf.
        debug_assert!(
            self.released || self.n == 0,
            "Reservation dropped without commit — {} block(s) leaked",
            self.n
        );
    }
}
