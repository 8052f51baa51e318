//! On-disk block layout: the fixed 256-byte frame, its header fields and
//! the explicit little-endian codec used to read and write them.
//!
//! Fields are read and written at their documented byte offset rather
//! than reinterpreting a raw buffer through a packed struct, so
//! correctness never depends on the host's struct packing or endianness.

use bitflags::bitflags;

/// The nominal block size used by `redsimg` and the tests. Mounted
/// filesystems may use a different `block_size`, as long as it divides the
/// region evenly.
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Bytes read by [`BlockView::decode_header`]-style header-only scans.
///
/// This intentionally stops 4 bytes short of the end of `namedata`
/// (offset 12, 32 bytes long): header-only scans only ever inspect
/// `flags`, `next_blk_addr` and `size` from this region — the filename is
/// always read back in a second, full-block pass.
pub const HEADER_LEN: usize = 40;

/// Offset of the payload in a block carrying the `FIRST` flag, i.e. past
/// the 12-byte header and the 32-byte filename field.
pub const BLK_OFFSET_FIRST: usize = 44;

/// Offset of the payload in a continuation block, i.e. past the 12-byte
/// header alone.
pub const BLK_OFFSET_CHUNK: usize = 12;

/// Length of the filename field carried by a `FIRST` block.
pub const NAME_LEN: usize = 32;

bitflags! {
    /// Per-block flag bits. Bit numbering matches `redsfs.h`'s
    /// `FB_IS_*` macros so the wire format is unchanged.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct BlockFlags: u32 {
        /// The block belongs to a live chain; clear on a free block.
        const USED = 1 << 0;
        /// The block is the head of its chain and carries `namedata`.
        const FIRST = 1 << 1;
        /// The block is an interior link; `next_blk_addr` is nonzero.
        const CONT = 1 << 2;
        /// The block is the tail of its chain.
        const LAST = 1 << 3;
    }
}

/// Read/write accessors over a raw block buffer, at the documented byte
/// offsets. `buf` must be at least [`HEADER_LEN`] bytes long for the
/// header-only accessors, and a full block for [`name`](Self::name) and
/// the payload helpers.
pub struct BlockView<'a> {
    buf: &'a [u8],
}

impl<'a> BlockView<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn flags(&self) -> BlockFlags {
        BlockFlags::from_bits_truncate(u32::from_le_bytes(self.buf[0..4].try_into().unwrap()))
    }

    pub fn next_blk_addr(&self) -> u32 {
        u32::from_le_bytes(self.buf[4..8].try_into().unwrap())
    }

    pub fn size(&self) -> u32 {
        u32::from_le_bytes(self.buf[8..12].try_into().unwrap())
    }

    /// The NUL-terminated filename carried by a `FIRST` block. Callers must
    /// have a full-block buffer; panics otherwise.
    pub fn name(&self) -> &[u8] {
        let field = &self.buf[12..12 + NAME_LEN];
        let end = field.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &field[..end]
    }

    /// Payload offset for this block, depending on whether it is a `FIRST`
    /// or continuation block.
    pub fn header_offset(&self) -> usize {
        if self.flags().contains(BlockFlags::FIRST) {
            BLK_OFFSET_FIRST
        } else {
            BLK_OFFSET_CHUNK
        }
    }
}

/// Mutable counterpart of [`BlockView`], used while staging a block before
/// it is committed with a full-block write.
pub struct BlockViewMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> BlockViewMut<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    pub fn as_view(&self) -> BlockView<'_> {
        BlockView::new(self.buf)
    }

    pub fn flags(&self) -> BlockFlags {
        self.as_view().flags()
    }

    pub fn set_flags(&mut self, flags: BlockFlags) {
        self.buf[0..4].copy_from_slice(&flags.bits().to_le_bytes());
    }

    pub fn insert_flags(&mut self, flags: BlockFlags) {
        self.set_flags(self.flags() | flags);
    }

    pub fn remove_flags(&mut self, flags: BlockFlags) {
        self.set_flags(self.flags() - flags);
    }

    pub fn next_blk_addr(&self) -> u32 {
        self.as_view().next_blk_addr()
    }

    pub fn set_next_blk_addr(&mut self, addr: u32) {
        self.buf[4..8].copy_from_slice(&addr.to_le_bytes());
    }

    pub fn size(&self) -> u32 {
        self.as_view().size()
    }

    pub fn set_size(&mut self, size: u32) {
        self.buf[8..12].copy_from_slice(&size.to_le_bytes());
    }

    pub fn add_size(&mut self, delta: u32) {
        let size = self.size() + delta;
        self.set_size(size);
    }

    /// Writes `name` into the filename field, truncated to [`NAME_LEN`]
    /// bytes and NUL-padded. The caller is expected to have zeroed the
    /// buffer beforehand (fresh blocks are always zeroed before their
    /// flags and name are set, so the padding falls out for free).
    pub fn set_name(&mut self, name: &[u8]) {
        let field = &mut self.buf[12..12 + NAME_LEN];
        field.fill(0);
        let len = name.len().min(NAME_LEN);
        field[..len].copy_from_slice(&name[..len]);
    }

    pub fn header_offset(&self) -> usize {
        self.as_view().header_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_round_trip() {
        let mut buf = vec![0u8; DEFAULT_BLOCK_SIZE as usize];
        let mut view = BlockViewMut::new(&mut buf);
        view.set_flags(BlockFlags::USED | BlockFlags::FIRST);
        assert_eq!(view.flags(), BlockFlags::USED | BlockFlags::FIRST);
        assert!(view.as_view().flags().contains(BlockFlags::FIRST));
    }

    #[test]
    fn header_offset_depends_on_first() {
        let mut buf = vec![0u8; DEFAULT_BLOCK_SIZE as usize];
        let mut view = BlockViewMut::new(&mut buf);
        view.set_flags(BlockFlags::USED | BlockFlags::CONT);
        assert_eq!(view.header_offset(), BLK_OFFSET_CHUNK);
        view.set_flags(BlockFlags::USED | BlockFlags::FIRST);
        assert_eq!(view.header_offset(), BLK_OFFSET_FIRST);
    }

    #[test]
    fn name_is_nul_terminated() {
        let mut buf = vec![0u8; DEFAULT_BLOCK_SIZE as usize];
        let mut view = BlockViewMut::new(&mut buf);
        view.set_name(b"hello.txt");
        assert_eq!(view.as_view().name(), b"hello.txt");
    }

    #[test]
    fn name_truncates_to_field_length() {
        let mut buf = vec![0u8; DEFAULT_BLOCK_SIZE as usize];
        let mut view = BlockViewMut::new(&mut buf);
        let long = [b'x'; 64];
        view.set_name(&long);
        assert_eq!(view.as_view().name().len(), NAME_LEN);
    }

    #[test]
    fn size_and_next_addr_are_little_endian() {
        let mut buf = vec![0u8; DEFAULT_BLOCK_SIZE as usize];
        let mut view = BlockViewMut::new(&mut buf);
        view.set_size(212);
        view.set_next_blk_addr(0x1000);
        assert_eq!(buf[8..12], 212u32.to_le_bytes());
        assert_eq!(buf[4..8], 0x1000u32.to_le_bytes());
        assert_eq!(BlockView::new(&buf).size(), 212);
        assert_eq!(BlockView::new(&buf).next_blk_addr(), 0x1000);
    }
}
