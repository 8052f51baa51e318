//! The file engine: the single-handle state machine driving open, read,
//! write, close, delete and seek-to-end. This is the hard part: it has to
//! keep header/link invariants intact across partial writes without any
//! in-RAM index, using only the two staging buffers owned by
//! [`Filesystem`].

use crate::block::{BLK_OFFSET_CHUNK, BLK_OFFSET_FIRST, BlockFlags, BlockView, BlockViewMut};
use crate::device::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::mount::Filesystem;

/// How a file was opened. `Append` behaves like `Write` once
/// [`Filesystem::seek_to_end`] has positioned the cursor; `Read` is
/// tracked only to decide what [`Filesystem::close`] commits — `read`
/// itself does not check the mode, so a handle opened `Write` or `Append`
/// can still be read from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileMode {
    Read,
    Write,
    Append,
}

/// State of the single currently-open file. `cur_offset` is measured from
/// the start of `cur_blk`, so it begins at [`BLK_OFFSET_FIRST`] on a fresh
/// head block or [`BLK_OFFSET_CHUNK`] after `seek_to_end` lands on a
/// continuation block.
pub(crate) struct Handle {
    pub(crate) mode: FileMode,
    pub(crate) start_blk: u32,
    pub(crate) cur_blk: u32,
    pub(crate) cur_offset: u32,
}

impl<D: BlockDevice> Filesystem<D> {
    /// Opens `name` under `mode`.
    ///
    /// Opening an existing file for `Write` does **not** truncate it: the
    /// existing head block (and its current `size`) is reused as-is, and
    /// subsequent writes append into whatever room is left in that block
    /// before rolling over. This is documented, intentional behavior —
    /// callers that want a fresh file should `delete` first.
    pub fn open(&mut self, name: &[u8], mode: FileMode) -> FsResult<()> {
        match self.find_by_name(name) {
            Ok(head) => {
                // `find_by_name` left the head block's contents in `read_cache`.
                self.handle = Some(Handle {
                    mode,
                    start_blk: head,
                    cur_blk: head,
                    cur_offset: BLK_OFFSET_FIRST as u32,
                });
                if mode == FileMode::Append {
                    self.seek_to_end()?;
                }
                Ok(())
            }
            Err(FsError::NotFound) => {
                if mode == FileMode::Read {
                    return Err(FsError::NotFound);
                }
                let chunk = self.next_empty_block()?;
                self.read_cache.fill(0);
                let mut view = BlockViewMut::new(&mut self.read_cache);
                view.set_flags(BlockFlags::USED | BlockFlags::FIRST);
                view.set_name(name);
                self.handle = Some(Handle {
                    mode: FileMode::Write,
                    start_blk: chunk,
                    cur_blk: chunk,
                    cur_offset: BLK_OFFSET_FIRST as u32,
                });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Positions the handle's cursor one byte past the last written byte
    /// of the currently open file.
    ///
    /// This walks the region in raw `block_size` strides from
    /// `start_blk`, stopping at the first block carrying `USED | LAST`,
    /// rather than following `next_blk_addr` link by link. This is a
    /// latent hazard — if an unrelated block happens to carry
    /// `USED | LAST` earlier in the region, the scan lands there instead
    /// of on this file's true tail — preserved as documented behavior
    /// rather than switched to link-following. See DESIGN.md.
    pub fn seek_to_end(&mut self) -> FsResult<()> {
        let start_blk = self
            .handle
            .as_ref()
            .ok_or(FsError::InvalidHandle)?
            .start_blk;

        let mut chunk = start_blk;
        let mut landing = None;
        while chunk < self.end {
            self.device.read(chunk, &mut self.read_cache)?;
            let view = BlockView::new(&self.read_cache);
            let flags = view.flags();
            if flags.contains(BlockFlags::USED) && flags.contains(BlockFlags::LAST) {
                landing = Some(view.header_offset() as u32 + view.size());
                break;
            }
            chunk += self.block_size;
        }

        if let Some(offset) = landing {
            let handle = self.handle.as_mut().expect("handle checked above");
            handle.cur_blk = chunk;
            handle.cur_offset = offset;
        }
        Ok(())
    }

    /// Reads up to `buf.len()` bytes from the currently open file into
    /// `buf`, returning the number of bytes actually copied. Does not
    /// check `mode` — a handle opened for `Write`/`Append` can still be
    /// read.
    pub fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        if self.handle.is_none() {
            return Err(FsError::InvalidHandle);
        }

        let mut done = 0usize;
        while done < buf.len() {
            let cur_blk = self.handle.as_ref().unwrap().cur_blk;
            let cur_offset = self.handle.as_ref().unwrap().cur_offset as usize;

            self.device.read(cur_blk, &mut self.read_cache)?;
            let view = BlockView::new(&self.read_cache);
            let header_offset = view.header_offset();
            let block_end = header_offset + view.size() as usize;
            let cache_left = block_end.saturating_sub(cur_offset);
            if cache_left == 0 {
                break;
            }

            let remaining = buf.len() - done;
            let copy = remaining.min(cache_left);
            buf[done..done + copy].copy_from_slice(&self.read_cache[cur_offset..cur_offset + copy]);
            done += copy;

            let new_offset = cur_offset + copy;
            let handle = self.handle.as_mut().unwrap();
            // Only follow `next_blk_addr` once the raw block is exhausted
            // *and* this isn't the last block — on a full `LAST` block
            // that address is stale (usually 0) and must not be chased.
            if new_offset >= self.block_size as usize && !view.flags().contains(BlockFlags::LAST) {
                handle.cur_blk = view.next_blk_addr();
                handle.cur_offset = BLK_OFFSET_CHUNK as u32;
            } else {
                handle.cur_offset = new_offset as u32;
            }
        }
        Ok(done)
    }

    /// Writes `buf` to the currently open file, returning the number of
    /// bytes actually written. A new block is allocated and chained in
    /// whenever the current one fills; the rollover commits the full
    /// block twice — once with `LAST` cleared before allocating, once
    /// more after `next_blk_addr` is patched in — so a crash between the
    /// two leaves the chain's tail marked non-last but otherwise intact.
    /// Preserved intentionally; see DESIGN.md.
    pub fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        if self.handle.is_none() {
            return Err(FsError::InvalidHandle);
        }

        let mut done = 0usize;
        while done < buf.len() {
            let cur_blk = self.handle.as_ref().unwrap().cur_blk;
            let cur_offset = self.handle.as_ref().unwrap().cur_offset as usize;

            // The previous iteration (or a previous `write` call) filled
            // this block exactly; only now, with more data to place, do
            // we roll over to a new block. Writing exactly the block's
            // remaining capacity and stopping there leaves a single,
            // terminal block rather than eagerly pre-allocating a
            // continuation that would end up empty.
            if cur_offset >= self.block_size as usize {
                BlockViewMut::new(&mut self.read_cache).remove_flags(BlockFlags::LAST);
                self.device.write(cur_blk, &self.read_cache)?;

                let next = self.next_empty_block()?;

                BlockViewMut::new(&mut self.read_cache).set_next_blk_addr(next);
                self.device.write(cur_blk, &self.read_cache)?;

                self.read_cache.fill(0);
                BlockViewMut::new(&mut self.read_cache)
                    .set_flags(BlockFlags::USED | BlockFlags::CONT);

                let handle = self.handle.as_mut().unwrap();
                handle.cur_blk = next;
                handle.cur_offset = BLK_OFFSET_CHUNK as u32;
                continue;
            }

            let cache_left = self.block_size as usize - cur_offset;
            let remaining = buf.len() - done;
            let w = remaining.min(cache_left);
            if w > 0 {
                self.read_cache[cur_offset..cur_offset + w].copy_from_slice(&buf[done..done + w]);
            }
            BlockViewMut::new(&mut self.read_cache).add_size(w as u32);
            done += w;

            let handle = self.handle.as_mut().unwrap();
            handle.cur_offset = (cur_offset + w) as u32;
        }
        Ok(done)
    }

    /// Closes the currently open file. If it was opened `Write` or
    /// `Append`, the staged block in `read_cache` is finalized with
    /// `USED | LAST` and committed. Reading a file has nothing to
    /// commit.
    pub fn close(&mut self) -> FsResult<()> {
        let handle = self.handle.take().ok_or(FsError::InvalidHandle)?;
        if matches!(handle.mode, FileMode::Write | FileMode::Append) {
            BlockViewMut::new(&mut self.read_cache)
                .insert_flags(BlockFlags::USED | BlockFlags::LAST);
            self.device.write(handle.cur_blk, &self.read_cache)?;
        }
        Ok(())
    }

    /// Deletes `name`, opening it for read and then zeroing every block in
    /// its chain (which clears `USED`, returning each block to the free
    /// pool for future allocation).
    pub fn delete(&mut self, name: &[u8]) -> FsResult<()> {
        self.open(name, FileMode::Read)?;

        loop {
            let cur_blk = self.handle.as_ref().expect("just opened").cur_blk;
            let next = BlockView::new(&self.read_cache).next_blk_addr();

            self.read_cache.fill(0);
            self.device.write(cur_blk, &self.read_cache)?;

            if next == 0 {
                break;
            }
            self.device.read(next, &mut self.read_cache)?;
            self.handle.as_mut().expect("just opened").cur_blk = next;
        }

        self.handle = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemBlockDevice;
    use crate::mount::MountConfig;

    fn mounted(blocks: u32) -> Filesystem<MemBlockDevice> {
        let block_size = 256;
        let dev = MemBlockDevice::new((blocks * block_size) as usize);
        Filesystem::mount(dev, MountConfig::new(0, blocks * block_size, block_size))
    }

    #[test]
    fn write_close_read_round_trips() {
        let mut fs = mounted(16);
        fs.open(b"hello.txt", FileMode::Write).unwrap();
        assert_eq!(fs.write(b"hi").unwrap(), 2);
        fs.close().unwrap();

        fs.open(b"hello.txt", FileMode::Read).unwrap();
        let mut buf = [0u8; 256];
        let n = fs.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi");
    }

    #[test]
    fn open_read_missing_file_fails() {
        let mut fs = mounted(4);
        assert!(matches!(
            fs.open(b"nope", FileMode::Read),
            Err(FsError::NotFound)
        ));
    }

    #[test]
    fn read_past_end_yields_zero() {
        let mut fs = mounted(4);
        fs.open(b"a", FileMode::Write).unwrap();
        fs.write(b"abc").unwrap();
        fs.close().unwrap();

        fs.open(b"a", FileMode::Read).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(fs.read(&mut buf).unwrap(), 3);
        assert_eq!(fs.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn exact_single_block_fill_yields_first_last_used() {
        // block_size=256, BLK_OFFSET_FIRST=44 -> 212 bytes fit in one block.
        let mut fs = mounted(4);
        let payload = vec![b'x'; 212];
        fs.open(b"fill.txt", FileMode::Write).unwrap();
        assert_eq!(fs.write(&payload).unwrap(), 212);
        fs.close().unwrap();

        let head = fs.find_by_name(b"fill.txt").unwrap();
        assert_eq!(head, 0);
        let view = BlockView::new(&fs.read_cache);
        assert_eq!(view.size(), 212);
        assert_eq!(view.next_blk_addr(), 0);
        assert!(
            view.flags()
                .contains(BlockFlags::USED | BlockFlags::FIRST | BlockFlags::LAST)
        );
    }

    #[test]
    fn one_byte_spill_makes_a_two_block_chain() {
        let mut fs = mounted(4);
        let payload = vec![b'y'; 213];
        fs.open(b"spill.txt", FileMode::Write).unwrap();
        assert_eq!(fs.write(&payload).unwrap(), 213);
        fs.close().unwrap();

        fs.open(b"spill.txt", FileMode::Read).unwrap();
        let mut buf = vec![0u8; 213];
        assert_eq!(fs.read(&mut buf).unwrap(), 213);
        assert!(buf.iter().all(|&b| b == b'y'));

        let head = fs.find_by_name(b"spill.txt").unwrap();
        let head_view = BlockView::new(&fs.read_cache);
        let next = head_view.next_blk_addr();
        assert_ne!(next, 0);

        fs.device.read(next, &mut fs.seek_cache).unwrap();
        let tail_view = BlockView::new(&fs.seek_cache);
        assert_eq!(tail_view.size(), 1);
        assert!(
            tail_view
                .flags()
                .contains(BlockFlags::USED | BlockFlags::CONT | BlockFlags::LAST)
        );
        let _ = head;
    }

    #[test]
    fn empty_file_close_writes_header_only_block() {
        let mut fs = mounted(4);
        fs.open(b"empty.txt", FileMode::Write).unwrap();
        fs.close().unwrap();

        let head = fs.find_by_name(b"empty.txt").unwrap();
        assert_eq!(head, 0);
        let view = BlockView::new(&fs.read_cache);
        assert_eq!(view.size(), 0);
        assert!(
            view.flags()
                .contains(BlockFlags::USED | BlockFlags::FIRST | BlockFlags::LAST)
        );
    }

    #[test]
    fn write_on_existing_file_does_not_truncate() {
        let mut fs = mounted(4);
        fs.open(b"a.txt", FileMode::Write).unwrap();
        fs.write(b"abc").unwrap();
        fs.close().unwrap();

        // Re-opening for WRITE resets the cursor to the start of the head
        // block's payload (not its end), so these three bytes overwrite
        // "abc" in place rather than extending it — while `size` keeps
        // accumulating additively (3 + 3 = 6), leaving a trailing byte
        // that was never overwritten.
        fs.open(b"a.txt", FileMode::Write).unwrap();
        fs.write(b"def").unwrap();
        fs.close().unwrap();

        fs.open(b"a.txt", FileMode::Read).unwrap();
        let mut buf = [0u8; 8];
        let n = fs.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], [b'd', b'e', b'f', 0, 0, 0]);
    }

    #[test]
    fn append_continues_after_existing_content() {
        let mut fs = mounted(4);
        fs.open(b"a.txt", FileMode::Write).unwrap();
        fs.write(b"abc").unwrap();
        fs.close().unwrap();

        fs.open(b"a.txt", FileMode::Append).unwrap();
        fs.write(b"def").unwrap();
        fs.close().unwrap();

        fs.open(b"a.txt", FileMode::Read).unwrap();
        let mut buf = [0u8; 8];
        let n = fs.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abcdef");
    }

    #[test]
    fn delete_frees_every_block_in_the_chain() {
        let mut fs = mounted(4);
        let payload = vec![b'z'; 213]; // forces a two-block chain
        fs.open(b"d.txt", FileMode::Write).unwrap();
        fs.write(&payload).unwrap();
        fs.close().unwrap();

        let head = fs.find_by_name(b"d.txt").unwrap();
        let tail = BlockView::new(&fs.read_cache).next_blk_addr();
        assert_ne!(tail, 0);

        fs.delete(b"d.txt").unwrap();

        assert!(matches!(
            fs.open(b"d.txt", FileMode::Read),
            Err(FsError::NotFound)
        ));

        fs.device.read(head, &mut fs.seek_cache).unwrap();
        assert_eq!(BlockView::new(&fs.seek_cache).flags(), BlockFlags::empty());
        fs.device.read(tail, &mut fs.seek_cache).unwrap();
        assert_eq!(BlockView::new(&fs.seek_cache).flags(), BlockFlags::empty());
    }

    #[test]
    fn two_files_in_sequence_do_not_share_bytes() {
        let mut fs = mounted(8);
        fs.open(b"a", FileMode::Write).unwrap();
        fs.write(b"AAAA").unwrap();
        fs.close().unwrap();

        fs.open(b"b", FileMode::Write).unwrap();
        fs.write(b"BBBB").unwrap();
        fs.close().unwrap();

        fs.open(b"a", FileMode::Read).unwrap();
        let mut buf = [0u8; 4];
        fs.read(&mut buf).unwrap();
        assert_eq!(&buf, b"AAAA");

        fs.open(b"b", FileMode::Read).unwrap();
        let mut buf = [0u8; 4];
        fs.read(&mut buf).unwrap();
        assert_eq!(&buf, b"BBBB");
    }

    #[test]
    fn write_returns_no_space_when_device_is_full() {
        let mut fs = mounted(1);
        fs.open(b"a", FileMode::Write).unwrap();
        // One block holds 212 payload bytes before rollover must allocate.
        let payload = vec![b'x'; 213];
        assert!(matches!(fs.write(&payload), Err(FsError::NoSpace)));
    }
}
