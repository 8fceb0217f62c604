use crate::{arena::Arena, freelist::FreeList};

/// Strategy used to pick a candidate free block for a request.
///
/// All three scan only the free-list index, never used blocks, and all three
/// report "no candidate" the same way: `None`, which the engine turns into
/// its out-of-memory path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FitPolicy {
    /// First sufficiently large free block in address order.
    #[default]
    FirstFit,
    /// Smallest sufficiently large free block; first encountered wins ties.
    BestFit,
    /// Like first-fit, but each scan resumes after the previously chosen
    /// block and wraps around, spreading allocations across the arena
    /// instead of hammering its low end.
    NextFit,
}

/// The active policy plus the cursor state next-fit needs.
///
/// The cursor survives index rebuilds as a plain arena offset. If the block
/// it named was consumed or merged away in the meantime, the scan simply
/// resumes at the nearest free block past that address, which is exactly the
/// "cursor invalid" fallback the strategy calls for.
pub(crate) struct Selector {
    policy: FitPolicy,
    last_pos: Option<usize>,
}

impl Selector {
    pub fn new(policy: FitPolicy) -> Self {
        Self {
            policy,
            last_pos: None,
        }
    }

    /// Picks a free block of at least `needed` bytes (the engine computes
    /// that from the payload plus its header overhead) and returns the
    /// block's arena offset.
    pub fn select(&mut self, arena: &Arena, free_list: &FreeList, needed: usize) -> Option<usize> {
        match self.policy {
            FitPolicy::FirstFit => first_fit(arena, free_list, needed),
            FitPolicy::BestFit => best_fit(arena, free_list, needed),
            FitPolicy::NextFit => self.next_fit(arena, free_list, needed),
        }
    }

    fn next_fit(&mut self, arena: &Arena, free_list: &FreeList, needed: usize) -> Option<usize> {
        let Some(cursor) = self.last_pos else {
            let hit = first_fit(arena, free_list, needed)?;
            self.last_pos = Some(hit);
            return Some(hit);
        };

        // Scan the blocks strictly after the cursor first.
        for (offset, header) in free_list.iter(arena) {
            if offset > cursor && header.size as usize >= needed {
                self.last_pos = Some(offset);
                return Some(offset);
            }
        }

        // Wrap around: head of the arena up to and including the cursor.
        for (offset, header) in free_list.iter(arena) {
            if offset > cursor {
                break;
            }
            if header.size as usize >= needed {
                self.last_pos = Some(offset);
                return Some(offset);
            }
        }

        None
    }
}

fn first_fit(arena: &Arena, free_list: &FreeList, needed: usize) -> Option<usize> {
    free_list
        .iter(arena)
        .find(|(_, header)| header.size as usize >= needed)
        .map(|(offset, _)| offset)
}

fn best_fit(arena: &Arena, free_list: &FreeList, needed: usize) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;

    for (offset, header) in free_list.iter(arena) {
        if (header.size as usize) < needed {
            continue;
        }

        // Strict comparison keeps the first-encountered block on ties.
        if best.is_none_or(|(_, size)| header.size < size) {
            best = Some((offset, header.size));
        }
    }

    best.map(|(offset, _)| offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{FreeHeader, NO_NEXT, UsedHeader};

    /// free(32) | used(96) | free(48) | used(120) | free(200)
    fn fragmented_arena() -> (Arena, FreeList) {
        let mut arena = Arena::init(512);

        arena.write_free(0, FreeHeader { size: 32, is_free: 1, next: NO_NEXT });
        arena.write_used(32, UsedHeader { size: 96, is_free: 0 });
        arena.write_free(136, FreeHeader { size: 48, is_free: 1, next: NO_NEXT });
        arena.write_used(184, UsedHeader { size: 120, is_free: 0 });
        arena.write_free(312, FreeHeader { size: 200, is_free: 1, next: NO_NEXT });

        let mut list = FreeList::new();
        list.rebuild(&mut arena);

        (arena, list)
    }

    /// Same tiling but with two equally small free blocks: free(32) at both
    /// ends of the first used block.
    fn tied_arena() -> (Arena, FreeList) {
        let mut arena = Arena::init(512);

        arena.write_free(0, FreeHeader { size: 32, is_free: 1, next: NO_NEXT });
        arena.write_used(32, UsedHeader { size: 96, is_free: 0 });
        arena.write_free(136, FreeHeader { size: 32, is_free: 1, next: NO_NEXT });
        arena.write_used(168, UsedHeader { size: 136, is_free: 0 });
        arena.write_free(312, FreeHeader { size: 200, is_free: 1, next: NO_NEXT });

        let mut list = FreeList::new();
        list.rebuild(&mut arena);

        (arena, list)
    }

    #[test]
    fn first_fit_returns_lowest_sufficient_block() {
        let (arena, list) = fragmented_arena();
        let mut selector = Selector::new(FitPolicy::FirstFit);

        assert_eq!(Some(0), selector.select(&arena, &list, 24));
        assert_eq!(Some(136), selector.select(&arena, &list, 40));
        assert_eq!(Some(312), selector.select(&arena, &list, 104));
    }

    #[test]
    fn best_fit_picks_smallest_sufficient_block() {
        let (arena, list) = fragmented_arena();
        let mut selector = Selector::new(FitPolicy::BestFit);

        // 48 beats 200 even though 200 comes later in the scan.
        assert_eq!(Some(136), selector.select(&arena, &list, 40));
        assert_eq!(Some(0), selector.select(&arena, &list, 24));
    }

    #[test]
    fn best_fit_tie_break_is_first_encountered() {
        let (arena, list) = tied_arena();
        let mut selector = Selector::new(FitPolicy::BestFit);

        assert_eq!(Some(0), selector.select(&arena, &list, 24));
    }

    #[test]
    fn next_fit_advances_and_wraps() {
        let (arena, list) = fragmented_arena();
        let mut selector = Selector::new(FitPolicy::NextFit);

        // No cursor yet: behaves like first-fit.
        assert_eq!(Some(0), selector.select(&arena, &list, 24));
        // Resumes after the previous hit instead of returning it again.
        assert_eq!(Some(136), selector.select(&arena, &list, 24));
        assert_eq!(Some(312), selector.select(&arena, &list, 24));
        // End of the arena reached: wraps back to the start.
        assert_eq!(Some(0), selector.select(&arena, &list, 24));
    }

    #[test]
    fn no_candidate_is_reported_identically() {
        let (arena, list) = fragmented_arena();

        for policy in [FitPolicy::FirstFit, FitPolicy::BestFit, FitPolicy::NextFit] {
            let mut selector = Selector::new(policy);
            assert_eq!(None, selector.select(&arena, &list, 300));
        }
    }

    #[test]
    fn next_fit_keeps_cursor_on_miss() {
        let (arena, list) = fragmented_arena();
        let mut selector = Selector::new(FitPolicy::NextFit);

        assert_eq!(Some(0), selector.select(&arena, &list, 24));
        assert_eq!(None, selector.select(&arena, &list, 4096));
        // The failed scan did not clobber the cursor.
        assert_eq!(Some(136), selector.select(&arena, &list, 24));
    }
}
