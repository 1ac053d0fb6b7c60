use thiserror::Error;

/// Errors from ring/backing-store construction.
///
/// Nothing inside the hot path (`reserve`/`release`/splice) returns `Result` —
/// those degrade to a sentinel (`None`, `0`) instead. `CbufError` only covers
/// the fallible, one-time construction step.
#[derive(Debug, Error)]
pub enum CbufError {
    /// Requested block size or block count can't be rounded into a valid
    /// geometry (see [`crate::geometry`]).
    #[error(transparent)]
    Geometry(#[from] crate::geometry::GeometryError),

    /// The backing-store directory was not provided where required (a null
    /// `map_dir` for a pointer-ring, or an empty path).
    #[error("backing store requires a directory")]
    MissingBackingDir,

    /// Opening, sizing, or mapping the backing-store file failed.
    #[error("backing store I/O failed: {0}")]
    BackingStoreIo(#[source] std::io::Error),

    /// A raw OS call (`mmap`, `mkstemp`, `ftruncate`) returned an error code.
    #[error("{call} failed: errno {errno}")]
    Os {
        /// Name of the failing syscall, for diagnostics.
        call: &'static str,
        /// The raw `errno` value at the time of failure.
        errno: i32,
    },
}
