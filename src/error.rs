//! Error taxonomy for the filesystem core.
//!
//! A single sum-typed result, rather than overloading a byte count with
//! negative values to signal failure.

use std::io;

/// Failure modes surfaced by the filesystem core.
///
/// There is no `NotMounted` variant: owning a [`crate::Filesystem`] is
/// itself the proof of being mounted, so the condition is unrepresentable
/// rather than merely unchecked. See DESIGN.md for this Open Question's
/// resolution.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// `open` for read, or `delete`, found no file by that name.
    #[error("no such file")]
    NotFound,
    /// `open` for write, or a mid-write block rollover, found no free
    /// block to allocate.
    #[error("no space left on device")]
    NoSpace,
    /// `read`, `write`, `close`, `seek_to_end` or `delete` were called
    /// with no file currently open.
    #[error("no file is open")]
    InvalidHandle,
    /// The device adapter's `read`/`write` callback failed.
    #[error("device I/O error")]
    Io(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;
