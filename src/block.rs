use std::mem;

/// Header size of a used block. Only the size word survives once a block is
/// handed out, so this is strictly smaller than [`FREE_HEADER_SIZE`]. The
/// split-threshold arithmetic in the allocator relies on that.
pub(crate) const USED_HEADER_SIZE: usize = mem::size_of::<UsedHeader>();

/// Header size of a free block, free-list link included.
pub(crate) const FREE_HEADER_SIZE: usize = mem::size_of::<FreeHeader>();

/// Smallest payload we ever hand out. A used block of this size can always be
/// re-tagged as a free block later, header and link included.
pub(crate) const MIN_BLOCK_SIZE: usize = FREE_HEADER_SIZE - USED_HEADER_SIZE;

/// Sentinel for "no next free block". The zero offset is a valid block
/// address, so it cannot double as the terminator.
pub(crate) const NO_NEXT: u64 = u64::MAX;

/// Every block starts with a header; its shape depends on the block's state.
/// The content is placed right after the header and the pointer handed to the
/// user points at the content, never at the header.
///
/// ```text
///         Free block                      Used block
/// +---------------------+ <---+     +---------------------+ <---+
/// |        size         |     |     |        size         |     | -> Header
/// +---------------------+     |     +---------------------+     |
/// |       is_free       |     |     |    is_free (= 0)    |     |
/// +---------------------+     | H   +---------------------+ <---+
/// |        next         |     |     |       Content       |
/// +---------------------+ <---+     |         ...         |
/// |     (unused ...)    |           +---------------------+
/// +---------------------+
/// ```
///
/// Both shapes share the [`UsedHeader`] prefix, so a walk over the arena can
/// read the prefix of any block, look at `is_free` and interpret the size
/// field accordingly: a free block's `size` covers the whole block, header
/// included, while a used block's `size` counts payload bytes only.
///
/// The `next` field is an offset from the arena base rather than a raw
/// pointer; a rebuilt index can never leave a dangling address behind.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct FreeHeader {
    /// Total bytes of this block, header included.
    pub size: u32,
    /// Always nonzero for a free block.
    pub is_free: u32,
    /// Arena offset of the next free block in address order, or [`NO_NEXT`].
    pub next: u64,
}

/// Metadata of a used block. This is also the common prefix of both header
/// shapes: `is_free` sits at the same byte offset as in [`FreeHeader`] and is
/// zeroed whenever a block is carved out, so state checks stay uniform.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct UsedHeader {
    /// Payload bytes only, header excluded. A recorded size of 0 means
    /// "not a live used block" and is what size queries key off.
    pub size: u32,
    /// Always zero for a used block.
    pub is_free: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_footprints() {
        assert_eq!(8, USED_HEADER_SIZE);
        assert_eq!(16, FREE_HEADER_SIZE);
        // The no-split threshold only makes sense while this holds.
        assert!(USED_HEADER_SIZE < FREE_HEADER_SIZE);
    }

    #[test]
    fn used_header_is_free_header_prefix() {
        assert_eq!(MIN_BLOCK_SIZE, FREE_HEADER_SIZE - USED_HEADER_SIZE);
        assert_eq!(
            mem::offset_of!(UsedHeader, is_free),
            mem::offset_of!(FreeHeader, is_free)
        );
    }
}
