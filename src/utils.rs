//! This file contains all the helper functions for the allocator.
//! This are functions that don't particularly belong to any concrete module of the program.

use std::mem;

/// Every block offset and every payload size is kept a multiple of this.
/// Header fields are at most `u64` wide, so word alignment is all the
/// arena ever needs.
pub(crate) const ALIGNMENT: usize = mem::size_of::<u64>();

/// It aligns `to_be_aligned` using `aligment`.
///
/// This method is used to round payload sizes up to [`ALIGNMENT`] so that
/// every block header inside the arena starts on a word boundary.
pub(crate) fn align(to_be_aligned: usize, aligment: usize) -> usize {
    (to_be_aligned + aligment - 1) & !(aligment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_word_size() {
        let aligments = vec![(1..8, 8), (9..16, 16), (17..24, 24), (25..32, 32)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(expected, align(size, ALIGNMENT));
            }
        }
    }

    #[test]
    fn align_is_identity_on_multiples() {
        for size in [8, 16, 64, 512] {
            assert_eq!(size, align(size, ALIGNMENT));
        }
    }
}
