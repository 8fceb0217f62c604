use std::{cmp, error::Error, fmt, ptr::NonNull};

use log::{debug, error, info, warn};

use crate::{
    arena::Arena,
    block::{FREE_HEADER_SIZE, FreeHeader, MIN_BLOCK_SIZE, NO_NEXT, USED_HEADER_SIZE, UsedHeader},
    freelist::FreeList,
    policy::{FitPolicy, Selector},
    utils::{ALIGNMENT, align},
};

/// Arena capacity used by [`FitAlloc::init`].
pub const DEFAULT_ARENA_SIZE: usize = 512;

/// Failure values surfaced by [`FitAlloc::allocate`].
///
/// An out-of-memory result is recoverable: the arena is left exactly as it
/// was and a smaller request may still succeed. An invalid size is a usage
/// error on the caller's side; it also performs no mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The requested size was zero.
    InvalidSize,
    /// No free block is large enough for the request.
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::InvalidSize => write!(f, "requested size must be greater than 0"),
            AllocError::OutOfMemory => write!(f, "no free block is large enough"),
        }
    }
}

impl Error for AllocError {}

/// The allocator context: one fixed arena, the derived free-list index over
/// it and the active fit policy.
///
/// Single-threaded by design. All entry points take `&mut self` (or `&self`
/// for pure reads), so the borrow checker enforces the serialization the
/// header-rewrite and index-rebuild sequences rely on; a concurrent port
/// would have to wrap the whole surface in a mutex.
pub struct FitAlloc {
    arena: Arena,
    free_list: FreeList,
    selector: Selector,
}

impl FitAlloc {
    /// Creates an allocator over an arena of [`DEFAULT_ARENA_SIZE`] bytes.
    ///
    /// Panics if the backing region cannot be reserved; there is no
    /// allocator without an arena.
    pub fn init(policy: FitPolicy) -> Self {
        Self::with_capacity(DEFAULT_ARENA_SIZE, policy)
    }

    /// Creates an allocator over an arena of `capacity` bytes and installs
    /// one giant free block spanning all of it.
    ///
    /// `capacity` must be word-aligned, at least one free header large and
    /// at most `u32::MAX` bytes.
    pub fn with_capacity(capacity: usize, policy: FitPolicy) -> Self {
        let mut arena = Arena::init(capacity);

        arena.write_free(
            0,
            FreeHeader {
                size: capacity as u32,
                is_free: 1,
                next: NO_NEXT,
            },
        );

        let mut free_list = FreeList::new();
        free_list.rebuild(&mut arena);

        let base = arena.base_ptr().as_ptr();
        info!(
            "memory : [{:p} {:p}] ({} bytes)",
            base,
            unsafe { base.add(capacity) },
            capacity
        );

        Self {
            arena,
            free_list,
            selector: Selector::new(policy),
        }
    }

    /// Total size of the managed arena in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Carves a block of at least `size` payload bytes out of a free block
    /// and returns a pointer to the payload.
    ///
    /// The requested size is rounded up to the word size (and to the minimum
    /// payload that can later host a free header again), so the handed-out
    /// block may be slightly larger than asked for; [`FitAlloc::query_size`]
    /// reports the real footprint.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size == 0 {
            error!("ALLOC error : size should be greater than 0");
            return Err(AllocError::InvalidSize);
        }

        if size > self.arena.capacity() {
            error!("ALLOC error : can't allocate {} bytes", size);
            return Err(AllocError::OutOfMemory);
        }

        let payload = align(cmp::max(size, MIN_BLOCK_SIZE), ALIGNMENT);

        // A candidate must cover the payload even on the no-split path,
        // where a free header's worth of bytes stays reserved out of the
        // block. A tighter block would record fewer payload bytes than the
        // caller may write, letting those writes reach the block's trailing
        // residue; such blocks are no candidates at all.
        let needed = payload + FREE_HEADER_SIZE;

        // No candidate means out of memory; no header may be touched past
        // this point in that case.
        let Some(offset) = self.selector.select(&self.arena, &self.free_list, needed) else {
            error!("ALLOC error : can't allocate {} bytes", size);
            return Err(AllocError::OutOfMemory);
        };

        let avail = self.arena.read_free(offset).size as usize;

        // Scrub the candidate before re-tagging it so no stale free-list
        // link or size can leak into the payload.
        self.arena.zero(offset, avail);

        if avail < payload + USED_HEADER_SIZE + FREE_HEADER_SIZE {
            // The remainder after carving could not host a free header:
            // hand out the whole block. The recorded payload size keeps a
            // free header's worth of bytes reserved even though no free
            // block is carved off; the candidate predicate above guarantees
            // it still covers the requested payload.
            self.arena.write_used(
                offset,
                UsedHeader {
                    size: (avail - FREE_HEADER_SIZE) as u32,
                    is_free: 0,
                },
            );
        } else {
            self.arena.write_used(
                offset,
                UsedHeader {
                    size: payload as u32,
                    is_free: 0,
                },
            );

            let remainder = offset + USED_HEADER_SIZE + payload;
            self.arena.write_free(
                remainder,
                FreeHeader {
                    size: (avail - USED_HEADER_SIZE - payload) as u32,
                    is_free: 1,
                    next: NO_NEXT,
                },
            );
        }

        self.free_list.rebuild(&mut self.arena);

        let payload_offset = offset + USED_HEADER_SIZE;
        debug!("ALLOC at : {} ({} byte(s))", payload_offset, size);

        Ok(self.arena.payload_ptr(payload_offset))
    }

    /// Returns the block at `ptr` to the arena and merges it with any
    /// address-adjacent free neighbor.
    ///
    /// Pointers that do not name a live used block of this allocator are
    /// ignored with a warning, which catches double frees and stray arena
    /// pointers. That detection is best effort, not a guarantee.
    ///
    /// # Safety
    ///
    /// `ptr` must either be a payload pointer previously returned by
    /// [`FitAlloc::allocate`] on this allocator and not freed since, or a
    /// pointer that does not point into this arena at all. A forged pointer
    /// *into* the arena that happens to look like a live used block corrupts
    /// the block tiling.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        let Some(payload_offset) = self.arena.offset_of(ptr) else {
            warn!("FREE ignored : pointer outside the arena");
            return;
        };

        let total = self.query_size(ptr);
        if total == 0 {
            warn!("FREE ignored : {} is not a live used block", payload_offset);
            return;
        }

        let offset = payload_offset - USED_HEADER_SIZE;

        // Re-tag the block as free; its footprint becomes the free size.
        let mut size = total;
        self.arena.write_free(
            offset,
            FreeHeader {
                size: size as u32,
                is_free: 1,
                next: NO_NEXT,
            },
        );

        debug!("FREE  at : {}", payload_offset);

        // Forward coalesce: absorb the block right after this one if it is
        // free. The absorbed header is scrubbed so it can never be walked
        // into again.
        let next_offset = offset + size;
        if next_offset + USED_HEADER_SIZE <= self.arena.capacity() {
            let next = self.arena.read_used(next_offset);
            if next.is_free != 0 {
                size += next.size as usize;
                self.arena.write_free(
                    offset,
                    FreeHeader {
                        size: size as u32,
                        is_free: 1,
                        next: NO_NEXT,
                    },
                );
                self.arena.zero(next_offset, next.size as usize);
            }
        }

        // Backward coalesce: find the nearest free block below this one.
        // The index is stale (it predates this free call) but every entry
        // below `offset` is untouched, and the scan stops before reaching
        // any entry this call may have absorbed.
        let mut prev: Option<(usize, usize)> = None;
        for (free_offset, header) in self.free_list.iter(&self.arena) {
            if free_offset >= offset {
                break;
            }
            prev = Some((free_offset, header.size as usize));
        }

        if let Some((prev_offset, prev_size)) = prev {
            if prev_offset + prev_size == offset {
                self.arena.write_free(
                    prev_offset,
                    FreeHeader {
                        size: (prev_size + size) as u32,
                        is_free: 1,
                        next: NO_NEXT,
                    },
                );
                self.arena.zero(offset, size);
            }
        }

        self.free_list.rebuild(&mut self.arena);
    }

    /// Total footprint (header plus payload) of the live used block behind
    /// `ptr`, or 0 if `ptr` is not recognized as one. Pure read.
    pub fn query_size(&self, ptr: NonNull<u8>) -> usize {
        let Some(payload_offset) = self.arena.offset_of(ptr) else {
            return 0;
        };

        if payload_offset < USED_HEADER_SIZE || payload_offset % ALIGNMENT != 0 {
            return 0;
        }

        let header = self.arena.read_used(payload_offset - USED_HEADER_SIZE);

        if header.is_free != 0 || header.size == 0 {
            return 0;
        }

        if payload_offset + header.size as usize > self.arena.capacity() {
            return 0;
        }

        header.size as usize + USED_HEADER_SIZE
    }

    /// Renders the occupancy of the arena for human inspection: one `X` per
    /// used payload byte, one `_` per free block byte. Never mutates state.
    pub fn dump(&self) -> String {
        let mut out = String::with_capacity(self.arena.capacity() + 2);
        out.push('[');

        for block in self.arena.blocks() {
            let glyph = if block.is_free { '_' } else { 'X' };
            for _ in 0..block.size {
                out.push(glyph);
            }
        }

        out.push(']');
        out
    }
}

impl Drop for FitAlloc {
    fn drop(&mut self) {
        // Exit-time diagnostics only; the arena hands its region back to the
        // kernel in its own drop. While unwinding the tiling may be in any
        // state, and a second panic here would abort the process.
        if std::thread::panicking() {
            return;
        }

        let (mut used, mut free) = (0usize, 0usize);
        for block in self.arena.blocks() {
            if block.is_free {
                free += 1;
            } else {
                used += 1;
            }
        }

        debug!("arena teardown : {} used block(s), {} free block(s)", used, free);
    }
}
