//! Mount lifecycle: mount state, the scan cursor, the two staging buffers
//! and the single handle all live on one owned value, so "at most one
//! filesystem, at most one handle" holds because there is exactly one
//! `Filesystem` to ask, not by convention.

use crate::block::DEFAULT_BLOCK_SIZE;
use crate::device::BlockDevice;
use crate::handle::Handle;

/// The filesystem region's configuration: everything but the device
/// adapter itself (that's the `device: D` parameter to
/// [`Filesystem::mount`]).
#[derive(Clone, Copy, Debug)]
pub struct MountConfig {
    /// Start offset of the filesystem region on the device.
    pub start: u32,
    /// End offset (exclusive) of the filesystem region.
    pub end: u32,
    /// Block size in bytes. Must divide `end - start`; nominally 256.
    pub block_size: u32,
}

impl MountConfig {
    pub fn new(start: u32, end: u32, block_size: u32) -> Self {
        Self {
            start,
            end,
            block_size,
        }
    }
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// A mounted filesystem. Construction (`mount`) is the only way to obtain
/// one, and `unmount` consumes it — so a caller can never hold a
/// `Filesystem` value that isn't mounted.
pub struct Filesystem<D: BlockDevice> {
    pub(crate) device: D,
    pub(crate) start: u32,
    pub(crate) end: u32,
    pub(crate) block_size: u32,
    pub(crate) scan_cursor: u32,
    /// Working block of the currently open handle, if any.
    pub(crate) read_cache: Vec<u8>,
    /// Scratch block used by scans (`next_empty_block`, `next_file`,
    /// `find_by_name`) — kept separate from `read_cache` so a scan run
    /// while a file is open for writing never clobbers its staged block.
    pub(crate) seek_cache: Vec<u8>,
    pub(crate) handle: Option<Handle>,
}

impl<D: BlockDevice> Filesystem<D> {
    /// Mounts `device` under `config`. There is no superblock to
    /// validate, so this cannot fail: a zero-initialized region is a
    /// valid empty filesystem, and an already-populated one is accepted
    /// as-is.
    pub fn mount(device: D, config: MountConfig) -> Self {
        log::debug!(
            "mounting: start={} end={} block_size={}",
            config.start,
            config.end,
            config.block_size
        );
        Self {
            device,
            start: config.start,
            end: config.end,
            block_size: config.block_size,
            scan_cursor: config.start,
            read_cache: vec![0u8; config.block_size as usize],
            seek_cache: vec![0u8; config.block_size as usize],
            handle: None,
        }
    }

    /// Unmounts the filesystem, dropping both staging buffers and the
    /// device. There's nothing to fail: consuming `self` is the
    /// unmount.
    pub fn unmount(self) {
        log::debug!("unmounting");
    }

    /// Block size this filesystem was mounted with.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }
}
