use std::ptr::{self, NonNull};

use crate::{
    block::{FREE_HEADER_SIZE, FreeHeader, USED_HEADER_SIZE, UsedHeader},
    kernel,
    utils::ALIGNMENT,
};

/// The fixed byte range the allocator manages.
///
/// The backing region is reserved from the kernel exactly once, never moves
/// and never grows. Everything the allocator knows about blocks lives *inside*
/// this region, as headers written at block boundaries:
///
/// ```text
///  base                                                          base + size
///   |                                                                 |
///   v                                                                 v
///   +--------+-----------+--------+--------------+--------+-----------+
///   | Header |  Content  | Header |   (free ...) | Header |  Content  |
///   +--------+-----------+--------+--------------+--------+-----------+
///   \------- block ------/\-------- block -------/\------- block -----/
/// ```
///
/// All header accesses go through the typed read/write helpers below, which
/// take offsets from `base` instead of raw pointers. Callers must only pass
/// offsets that lie on a block boundary; the helpers bound-check in debug
/// builds.
pub(crate) struct Arena {
    base: NonNull<u8>,
    size: usize,
}

impl Arena {
    /// Reserves the backing region and hands back the arena.
    ///
    /// There is no allocator without an arena, so a failed reservation is
    /// fatal rather than recoverable.
    pub fn init(size: usize) -> Self {
        assert!(
            size >= FREE_HEADER_SIZE && size <= u32::MAX as usize,
            "arena capacity must fit a free block header and a u32 size field"
        );
        assert!(
            size % ALIGNMENT == 0,
            "arena capacity must be a multiple of the word size"
        );

        let base = unsafe { kernel::request_memory(size) }
            .expect("failed to reserve the arena's backing memory");

        Self { base, size }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn base_ptr(&self) -> NonNull<u8> {
        self.base
    }

    /// Address of the byte at `offset`.
    #[inline]
    fn at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.size);
        unsafe { self.base.as_ptr().add(offset) }
    }

    /// Maps a pointer back into an arena offset, or `None` if the pointer
    /// does not point into the managed region at all.
    pub fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let addr = ptr.as_ptr() as usize;
        let base = self.base.as_ptr() as usize;

        if addr < base || addr >= base + self.size {
            return None;
        }

        Some(addr - base)
    }

    /// Pointer to the payload that starts at `offset`.
    pub fn payload_ptr(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset < self.size);
        unsafe { NonNull::new_unchecked(self.at(offset)) }
    }

    /// Reads the header prefix of the block at `offset`. This works for both
    /// block states since [`UsedHeader`] is the common prefix.
    pub fn read_used(&self, offset: usize) -> UsedHeader {
        debug_assert!(offset + USED_HEADER_SIZE <= self.size);
        unsafe { self.at(offset).cast::<UsedHeader>().read_unaligned() }
    }

    pub fn write_used(&mut self, offset: usize, header: UsedHeader) {
        debug_assert!(offset + USED_HEADER_SIZE <= self.size);
        unsafe { self.at(offset).cast::<UsedHeader>().write_unaligned(header) }
    }

    pub fn read_free(&self, offset: usize) -> FreeHeader {
        debug_assert!(offset + FREE_HEADER_SIZE <= self.size);
        unsafe { self.at(offset).cast::<FreeHeader>().read_unaligned() }
    }

    pub fn write_free(&mut self, offset: usize, header: FreeHeader) {
        debug_assert!(offset + FREE_HEADER_SIZE <= self.size);
        unsafe { self.at(offset).cast::<FreeHeader>().write_unaligned(header) }
    }

    /// Relinks the free block at `offset` without touching its other fields.
    pub fn set_free_next(&mut self, offset: usize, next: u64) {
        let mut header = self.read_free(offset);
        header.next = next;
        self.write_free(offset, header);
    }

    /// Zeroes `len` bytes starting at `offset`. Used to scrub stale headers
    /// and free-list links before a region changes state.
    pub fn zero(&mut self, offset: usize, len: usize) {
        debug_assert!(offset + len <= self.size);
        unsafe { ptr::write_bytes(self.at(offset), 0, len) }
    }

    /// Walks the block tiling from the arena base, classifying each block by
    /// its header prefix. Read-only; safe at any quiescent point.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            arena: self,
            offset: 0,
        }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { kernel::return_memory(self.base.as_ptr(), self.size) }
    }
}

/// One entry of a block walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockView {
    /// Offset of the block header from the arena base.
    pub offset: usize,
    pub is_free: bool,
    /// Raw header size field: whole block for free blocks, payload only for
    /// used blocks.
    pub size: usize,
    /// Bytes this block spans in the tiling.
    pub footprint: usize,
}

pub(crate) struct Blocks<'a> {
    arena: &'a Arena,
    offset: usize,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = BlockView;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.arena.capacity() {
            return None;
        }

        let header = self.arena.read_used(self.offset);
        let is_free = header.is_free != 0;
        let size = header.size as usize;

        let footprint = if is_free {
            size
        } else {
            USED_HEADER_SIZE + size
        };

        // A zero footprint means a corrupted free header; stop rather than
        // spin in place.
        if footprint == 0 || self.offset + footprint > self.arena.capacity() {
            debug_assert!(false, "malformed block header at offset {}", self.offset);
            return None;
        }

        let view = BlockView {
            offset: self.offset,
            is_free,
            size,
            footprint,
        };

        self.offset += footprint;

        Some(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::NO_NEXT;

    #[test]
    fn offset_of_bounds() {
        let arena = Arena::init(64);

        let inside = arena.payload_ptr(8);
        assert_eq!(Some(8), arena.offset_of(inside));

        let mut outside = 0u8;
        assert_eq!(None, arena.offset_of(NonNull::from(&mut outside)));
    }

    #[test]
    fn walk_classifies_blocks() {
        let mut arena = Arena::init(128);

        arena.write_used(
            0,
            UsedHeader {
                size: 24,
                is_free: 0,
            },
        );
        arena.write_free(
            32,
            FreeHeader {
                size: 96,
                is_free: 1,
                next: NO_NEXT,
            },
        );

        let blocks: Vec<BlockView> = arena.blocks().collect();

        assert_eq!(2, blocks.len());
        assert_eq!((0, false, 32), (blocks[0].offset, blocks[0].is_free, blocks[0].footprint));
        assert_eq!((32, true, 96), (blocks[1].offset, blocks[1].is_free, blocks[1].footprint));
    }

    #[test]
    fn zero_scrubs_headers() {
        let mut arena = Arena::init(64);

        arena.write_free(
            0,
            FreeHeader {
                size: 64,
                is_free: 1,
                next: NO_NEXT,
            },
        );
        arena.zero(0, 64);

        let header = arena.read_used(0);
        assert_eq!(0, header.size);
        assert_eq!(0, header.is_free);
    }
}
