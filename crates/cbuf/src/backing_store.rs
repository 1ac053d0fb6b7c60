//! The pointer-ring's backing-store file: a regular file, mmap'ed, sized to
//! hold `block_count * block_size` payload bytes.
//!
//! A plain temp file under a caller-chosen directory rather than POSIX
//! shared memory (`shm_open`), since splicing requires a real file:
//! `mkstemp` to create it, `ftruncate` to size it, `mmap` with `MAP_SHARED`
//! so writes land in the file, and `munmap`/`close`/`remove_file` in `Drop`.

use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::ptr;

use crate::error::CbufError;

/// An mmap'ed regular file backing a ring (either the inline ring itself, or
/// a pointer-ring's separate payload store).
pub(crate) struct BackingStore {
    fd: RawFd,
    ptr: *mut u8,
    len: usize,
    path: PathBuf,
}

// SAFETY: the mapping is exclusively owned by this `BackingStore`; callers
// reach its bytes only through `Ring`'s reservation-guarded block accessors.
unsafe impl Send for BackingStore {}
unsafe impl Sync for BackingStore {}

impl BackingStore {
    /// Creates a `len`-byte temp file inside `dir`, sizes it with
    /// `ftruncate`, and maps it `MAP_SHARED` so writes through the mapping
    /// land in the file (and are visible to `splice()` against the same fd).
    pub(crate) fn create(dir: &Path, len: usize) -> Result<Self, CbufError> {
        if dir.as_os_str().is_empty() {
            return Err(CbufError::MissingBackingDir);
        }
        std::fs::create_dir_all(dir).map_err(CbufError::BackingStoreIo)?;

        let template = dir.join("cbuf-XXXXXX");
        let mut template_bytes = template.as_os_str().as_encoded_bytes().to_vec();
        template_bytes.push(0);
        let template_cstr =
            CString::from_vec_with_nul(template_bytes).expect("template has no interior NUL");
        let mut template_buf = template_cstr.into_bytes_with_nul();

        // SAFETY: `template_buf` is a valid NUL-terminated buffer with six
        // trailing `X`s for mkstemp to rewrite in place.
        let fd = unsafe { libc::mkstemp(template_buf.as_mut_ptr().cast::<libc::c_char>()) };
        if fd < 0 {
            return Err(CbufError::Os {
                call: "mkstemp",
                errno: std::io::Error::last_os_error().raw_os_error().unwrap_or(-1),
            });
        }
        let path = PathBuf::from(
            std::ffi::OsStr::new(
                std::str::from_utf8(&template_buf[..template_buf.len() - 1]).unwrap_or_default(),
            )
            .to_owned(),
        );

        // SAFETY: `fd` was just opened above and is owned by this call until
        // returned inside `Self`.
        let rc = unsafe { libc::ftruncate(fd, len as libc::off_t) };
        if rc < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
            unsafe {
                libc::close(fd);
            }
            let _ = std::fs::remove_file(&path);
            return Err(CbufError::Os { call: "ftruncate", errno });
        }

        // SAFETY: `fd` is open and sized to at least `len` bytes.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
            unsafe {
                libc::close(fd);
            }
            let _ = std::fs::remove_file(&path);
            return Err(CbufError::Os { call: "mmap", errno });
        }

        Ok(Self {
            fd,
            ptr: ptr.cast::<u8>(),
            len,
            path,
        })
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.cast::<libc::c_void>(), self.len);
            libc::close(self.fd);
        }
        let _ = std::fs::remove_file(&self.path);
    }
}
