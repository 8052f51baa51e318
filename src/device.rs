//! The device adapter: the boundary between the core and whatever backs
//! the actual storage (SPI flash, memory-mapped NOR, or a plain host
//! file). Expressed as a trait rather than a pair of raw function
//! pointers, so a host tool can plug in a backend without the core
//! caring what it is.

use std::io;

/// A block-addressable storage backend. Implementors are not required to
/// do anything beyond copying bytes; erase-before-write semantics on real
/// flash are the implementor's responsibility, not the core's.
pub trait BlockDevice {
    /// Copies `buf.len()` bytes from device offset `addr` into `buf`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()>;

    /// Copies `buf.len()` bytes from `buf` to device offset `addr`.
    fn write(&mut self, addr: u32, buf: &[u8]) -> io::Result<()>;
}

/// A [`BlockDevice`] backed by an in-memory buffer, zeroed at
/// construction — a zero-initialized region is a valid empty filesystem.
/// Used by the crate's own tests and by callers who want a scratch volume
/// without touching disk.
pub struct MemBlockDevice {
    data: Vec<u8>,
}

impl MemBlockDevice {
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0u8; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl BlockDevice for MemBlockDevice {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()> {
        let start = addr as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of device",
            ));
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write(&mut self, addr: u32, buf: &[u8]) -> io::Result<()> {
        let start = addr as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "write past end of device",
            ));
        }
        self.data[start..end].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(unix)]
mod file_device {
    use super::*;
    use std::fs::File;
    use std::os::unix::fs::FileExt;

    /// A [`BlockDevice`] backed by a host file — a raw disk device node or
    /// a plain image file opened interchangeably.
    pub struct FileBlockDevice {
        file: File,
    }

    impl FileBlockDevice {
        pub fn new(file: File) -> Self {
            Self { file }
        }
    }

    impl BlockDevice for FileBlockDevice {
        fn read(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()> {
            self.file.read_exact_at(buf, addr as u64)
        }

        fn write(&mut self, addr: u32, buf: &[u8]) -> io::Result<()> {
            self.file.write_all_at(buf, addr as u64)
        }
    }
}

#[cfg(unix)]
pub use file_device::FileBlockDevice;
