//! Allocator and scanner: free-block lookup, file enumeration and
//! name lookup. There is no directory or allocation table — every one of
//! these is a linear scan over the block region that interprets each
//! block's header.

use crate::block::{BlockFlags, BlockView, HEADER_LEN};
use crate::device::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::mount::Filesystem;

impl<D: BlockDevice> Filesystem<D> {
    /// Finds the first block whose `USED` flag is clear, scanning from
    /// `start` to `end` in `block_size` strides. Only the header is read
    /// of each candidate, via the scratch `seek_cache`.
    pub fn next_empty_block(&mut self) -> FsResult<u32> {
        let mut chunk = self.start;
        while chunk < self.end {
            self.device
                .read(chunk, &mut self.seek_cache[..HEADER_LEN])?;
            let used = BlockView::new(&self.seek_cache[..HEADER_LEN])
                .flags()
                .contains(BlockFlags::USED);
            if !used {
                return Ok(chunk);
            }
            chunk += self.block_size;
        }
        Err(FsError::NoSpace)
    }

    /// Advances the enumeration cursor to the next file head, returning
    /// its name, or `None` once the region is exhausted. Resuming after
    /// `None` yields `None` again until the filesystem is remounted,
    /// which resets the cursor to `start`.
    pub fn next_file(&mut self) -> Option<Vec<u8>> {
        let mut chunk = self.scan_cursor;
        while chunk < self.end {
            if self
                .device
                .read(chunk, &mut self.seek_cache[..HEADER_LEN])
                .is_err()
            {
                break;
            }
            let is_first = BlockView::new(&self.seek_cache[..HEADER_LEN])
                .flags()
                .contains(BlockFlags::FIRST);
            if is_first {
                self.scan_cursor = chunk + self.block_size;
                if self.device.read(chunk, &mut self.seek_cache).is_err() {
                    break;
                }
                return Some(BlockView::new(&self.seek_cache).name().to_vec());
            }
            chunk += self.block_size;
        }
        self.scan_cursor = self.end;
        None
    }

    /// Locates the head block of `name`, reading full blocks into
    /// `read_cache` as it goes. On success, `read_cache` holds the head
    /// block's current contents — `open` relies on this to avoid a
    /// redundant re-read.
    pub(crate) fn find_by_name(&mut self, name: &[u8]) -> FsResult<u32> {
        let mut chunk = self.start;
        while chunk < self.end {
            self.device.read(chunk, &mut self.read_cache)?;
            let view = BlockView::new(&self.read_cache);
            let flags = view.flags();
            if flags.contains(BlockFlags::USED)
                && flags.contains(BlockFlags::FIRST)
                && view.name() == name
            {
                return Ok(chunk);
            }
            chunk += self.block_size;
        }
        Err(FsError::NotFound)
    }
}
