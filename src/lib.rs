//! redsfs — a block-chaining embedded filesystem core.
//!
//! A flat namespace of named byte streams over a flat region of
//! equally-sized blocks, with no directory, no allocation table, and no
//! in-RAM index: every file is a singly linked chain of 256-byte blocks,
//! and both free-block lookup and file enumeration are linear scans that
//! interpret block headers as they go.
//!
//! This crate is the core engine only — the hard part of maintaining
//! header/link invariants across partial writes with a strict
//! frame-at-a-time discipline. The physical medium is abstracted behind
//! [`BlockDevice`]; a host-side tool that imports/exports whole
//! directories into an image lives in `src/bin/redsimg.rs`, layered on
//! top of the same public API a caller would use.
//!
//! ```
//! use redsfs::{BlockDevice, FileMode, Filesystem, MemBlockDevice, MountConfig};
//!
//! let device = MemBlockDevice::new(4096);
//! let mut fs = Filesystem::mount(device, MountConfig::new(0, 4096, 256));
//!
//! fs.open(b"hello.txt", FileMode::Write).unwrap();
//! fs.write(b"hi").unwrap();
//! fs.close().unwrap();
//!
//! fs.open(b"hello.txt", FileMode::Read).unwrap();
//! let mut buf = [0u8; 2];
//! fs.read(&mut buf).unwrap();
//! assert_eq!(&buf, b"hi");
//! # let _: &dyn BlockDevice = &MemBlockDevice::new(0);
//! ```

pub mod block;
mod device;
mod error;
mod handle;
mod mount;
mod scan;

pub use block::{
    BLK_OFFSET_CHUNK, BLK_OFFSET_FIRST, BlockFlags, BlockView, DEFAULT_BLOCK_SIZE, HEADER_LEN,
    NAME_LEN,
};
#[cfg(unix)]
pub use device::FileBlockDevice;
pub use device::{BlockDevice, MemBlockDevice};
pub use error::{FsError, FsResult};
pub use handle::FileMode;
pub use mount::{Filesystem, MountConfig};

#[cfg(test)]
impl<D: BlockDevice> Filesystem<D> {
    fn find_by_name_for_test(&mut self, name: &[u8]) -> u32 {
        self.find_by_name(name).unwrap()
    }

    fn read_cache_for_test(&self) -> Vec<u8> {
        self.read_cache.clone()
    }
}
