use crate::{
    arena::Arena,
    block::{FREE_HEADER_SIZE, FreeHeader, NO_NEXT, USED_HEADER_SIZE},
};

/// Address-ordered index over the free blocks of the arena.
///
/// This is not an independent store. The links live inside the free block
/// headers themselves (as arena offsets) and only the list head is kept here:
///
/// ```text
///  head ---+
///          |        next                     next
///          v     +---------------------+  +------------------------+
///          |     |                     |  |                        |
///   +------|-----|------+--------------|--|---+--------------------|--+
///   | Free | ... | Used | ... |  Free  | ...  |  Used  |  Free     |  |
///   +------+-----+------+--------------+------+--------------------+--+
/// ```
///
/// The index is a derived structure: after every allocate and free it is
/// discarded and recomputed by a full linear scan of the block tiling. Any
/// cursor obtained from it before a mutating call is invalid afterwards, so
/// consumers (the fit policies) re-enter through [`FreeList::iter`] every
/// time.
pub(crate) struct FreeList {
    head: Option<usize>,
}

impl FreeList {
    /// Creates a new empty index.
    pub const fn new() -> Self {
        Self { head: None }
    }

    #[cfg(test)]
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Recomputes the index from a full walk over the block tiling.
    ///
    /// Each free block found gets linked to the following one in address
    /// order; the last one is terminated with [`NO_NEXT`] and an arena with
    /// no free blocks at all yields an empty index.
    pub fn rebuild(&mut self, arena: &mut Arena) {
        self.head = None;

        let mut prev: Option<usize> = None;
        let mut offset = 0;

        while offset < arena.capacity() {
            // Common header prefix; valid for both block states.
            let header = arena.read_used(offset);

            if header.is_free != 0 {
                debug_assert!(header.size as usize >= FREE_HEADER_SIZE);

                match prev {
                    Some(p) => arena.set_free_next(p, offset as u64),
                    None => self.head = Some(offset),
                }

                prev = Some(offset);
                offset += header.size as usize;
            } else {
                offset += USED_HEADER_SIZE + header.size as usize;
            }
        }

        if let Some(p) = prev {
            arena.set_free_next(p, NO_NEXT);
        }
    }

    /// Iterates the free blocks in ascending address order by chasing the
    /// offsets stored in the headers.
    pub fn iter<'a>(&self, arena: &'a Arena) -> FreeIter<'a> {
        FreeIter {
            arena,
            current: self.head,
        }
    }
}

pub(crate) struct FreeIter<'a> {
    arena: &'a Arena,
    current: Option<usize>,
}

impl<'a> Iterator for FreeIter<'a> {
    type Item = (usize, FreeHeader);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.current?;
        let header = self.arena.read_free(offset);

        self.current = match header.next {
            NO_NEXT => None,
            next => Some(next as usize),
        };

        Some((offset, header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::UsedHeader;

    #[test]
    fn single_free_block_after_init() {
        let mut arena = Arena::init(64);
        arena.write_free(
            0,
            FreeHeader {
                size: 64,
                is_free: 1,
                next: NO_NEXT,
            },
        );

        let mut list = FreeList::new();
        list.rebuild(&mut arena);

        assert_eq!(Some(0), list.head());

        let entries: Vec<usize> = list.iter(&arena).map(|(offset, _)| offset).collect();
        assert_eq!(vec![0], entries);
    }

    #[test]
    fn rebuild_links_in_address_order() {
        let mut arena = Arena::init(512);

        // free | used | free | used | free
        arena.write_free(0, FreeHeader { size: 32, is_free: 1, next: NO_NEXT });
        arena.write_used(32, UsedHeader { size: 96, is_free: 0 });
        arena.write_free(136, FreeHeader { size: 48, is_free: 1, next: NO_NEXT });
        arena.write_used(184, UsedHeader { size: 120, is_free: 0 });
        arena.write_free(312, FreeHeader { size: 200, is_free: 1, next: NO_NEXT });

        let mut list = FreeList::new();
        list.rebuild(&mut arena);

        let entries: Vec<usize> = list.iter(&arena).map(|(offset, _)| offset).collect();
        assert_eq!(vec![0, 136, 312], entries);
    }

    #[test]
    fn fully_occupied_arena_yields_empty_index() {
        let mut arena = Arena::init(64);
        arena.write_used(0, UsedHeader { size: 56, is_free: 0 });

        let mut list = FreeList::new();
        // Start from a stale non-empty state to prove it is discarded.
        list.head = Some(0);
        list.rebuild(&mut arena);

        assert_eq!(None, list.head());
        assert!(list.iter(&arena).next().is_none());
    }
}
