//! Zero-copy transfer between pipe file descriptors and ring blocks, via the
//! Linux `splice(2)` syscall.
//!
//! Every block reserves its first 8 bytes as a little-endian length header
//! (`PAYLOAD_HEADER_LEN` in `ring.rs`). Errors coalesce to a `0`-length
//! transfer rather than a `Result` — `splice_sz` is how a caller observes
//! that a transfer came up short.

use std::os::unix::io::RawFd;
use std::ptr;

use crate::backoff::splice_yield;
use crate::metrics::Metrics;
use crate::ring::{Ring, PAYLOAD_HEADER_LEN};

const SPLICE_FLAGS: libc::c_uint = libc::SPLICE_F_MOVE | libc::SPLICE_F_NONBLOCK;

/// Retries `attempt` on `EWOULDBLOCK`/`EAGAIN` with a fixed ~100µs sleep;
/// any other error, or a non-negative return, ends the loop.
fn retry_on_wouldblock<F: FnMut() -> isize>(mut attempt: F, metrics: &Metrics, metrics_enabled: bool) -> usize {
    loop {
        let rc = attempt();
        if rc >= 0 {
            return rc as usize;
        }
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        if errno == libc::EWOULDBLOCK || errno == libc::EAGAIN {
            if metrics_enabled {
                metrics.add_splice_retry();
            }
            splice_yield();
            continue;
        }
        return 0;
    }
}

/// `fd_pipe -> (fd_file, file_offset)`, up to `len` bytes.
pub(crate) fn pipe_to_file(fd_pipe: RawFd, fd_file: RawFd, file_offset: u64, len: usize, metrics: &Metrics, metrics_enabled: bool) -> usize {
    retry_on_wouldblock(
        || {
            let mut off = file_offset as libc::loff_t;
            // SAFETY: `fd_pipe` and `fd_file` are valid descriptors for the
            // lifetime of this call, supplied by the caller.
            unsafe { libc::splice(fd_pipe, ptr::null_mut(), fd_file, &mut off, len, SPLICE_FLAGS) }
        },
        metrics,
        metrics_enabled,
    )
}

/// `(fd_file, file_offset) -> fd_pipe`, up to `len` bytes.
pub(crate) fn file_to_pipe(fd_file: RawFd, file_offset: u64, fd_pipe: RawFd, len: usize, metrics: &Metrics, metrics_enabled: bool) -> usize {
    retry_on_wouldblock(
        || {
            let mut off = file_offset as libc::loff_t;
            // SAFETY: see `pipe_to_file`.
            unsafe { libc::splice(fd_file, &mut off, fd_pipe, ptr::null_mut(), len, SPLICE_FLAGS) }
        },
        metrics,
        metrics_enabled,
    )
}

fn write_header(ring: &Ring, pos: u32, i: u32, n: u64) {
    // SAFETY: caller holds a live reservation covering block `i` at `pos`.
    let block = unsafe { ring.block_slice_mut(pos, i) };
    block[..8].copy_from_slice(&n.to_le_bytes());
}

fn read_header(ring: &Ring, pos: u32, i: u32) -> u64 {
    // SAFETY: caller holds a live reservation covering block `i` at `pos`.
    let block = unsafe { ring.block_slice(pos, i) };
    u64::from_le_bytes(block[..8].try_into().unwrap())
}

/// Splices up to `size` bytes from `fd_pipe` into block `i` of the
/// reservation at `pos`, writing the transferred length into the block's
/// header. Requires `ring` to have been built with [`Ring::new_mapped`] —
/// returns 0 for a heap-backed ring, since there is no fd to splice into.
#[must_use]
pub fn splice_from_pipe(ring: &Ring, pos: u32, i: u32, fd_pipe: RawFd, size: usize) -> usize {
    let Some(fd_file) = ring.mmap_fd() else {
        write_header(ring, pos, i, 0);
        return 0;
    };
    let max_payload = (ring.block_size() - PAYLOAD_HEADER_LEN) as usize;
    let clamped = size.min(max_payload);
    let file_offset = u64::from(ring.payload_offset(pos, i));
    let n = pipe_to_file(fd_pipe, fd_file, file_offset, clamped, ring.metrics_ref(), ring.metrics_enabled());
    write_header(ring, pos, i, n as u64);
    if ring.metrics_enabled() {
        ring.metrics_ref().add_splice_bytes_in(n as u64);
    }
    n
}

/// Splices the payload recorded in block `i`'s header out to `fd_pipe`.
/// Returns 0 (and transfers nothing) if the header is 0 or the ring is
/// heap-backed.
#[must_use]
pub fn splice_to_pipe(ring: &Ring, pos: u32, i: u32, fd_pipe: RawFd) -> usize {
    let Some(fd_file) = ring.mmap_fd() else {
        return 0;
    };
    let len = read_header(ring, pos, i);
    if len == 0 {
        return 0;
    }
    let file_offset = u64::from(ring.payload_offset(pos, i));
    let n = file_to_pipe(fd_file, file_offset, fd_pipe, len as usize, ring.metrics_ref(), ring.metrics_enabled());
    if ring.metrics_enabled() {
        ring.metrics_ref().add_splice_bytes_out(n as u64);
    }
    n
}

/// The payload length represented by block `i` of reservation `pos`: the
/// length header for an inline ring.
#[must_use]
pub fn splice_sz(ring: &Ring, pos: u32, i: u32) -> usize {
    read_header(ring, pos, i) as usize
}
