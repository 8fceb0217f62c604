//! A user-space memory allocator over a single fixed-size arena.
//!
//! The arena is reserved from the kernel once, at init time, and never grows
//! or moves afterwards. Every byte of it belongs to exactly one block, and
//! every block starts with a header describing its size and state:
//!
//! ```text
//!  base                                                         base + size
//!   |                                                                |
//!   v                                                                v
//!   +--------+----------+--------+------------------+--------+------+
//!   | Header | Content  | Header |    (free ...)    | Header | ...  |
//!   +--------+----------+--------+------------------+--------+------+
//!   \------ used ------/ \------- free ------------/ \---- used ---/
//! ```
//!
//! Free blocks are additionally linked into an address-ordered free list
//! whose links are stored inside the free headers themselves; the list is
//! rebuilt from a full scan after every allocation and every free. One of
//! three fit policies (first-fit, best-fit, next-fit) picks the candidate
//! block for each request; the engine splits oversized candidates and
//! coalesces address-adjacent free blocks on release.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fitalloc::{FitAlloc, FitPolicy};
//!
//! let mut allocator = FitAlloc::init(FitPolicy::FirstFit);
//!
//! let ptr = allocator.allocate(64).unwrap();
//! println!("footprint: {}", allocator.query_size(ptr));
//! println!("{}", allocator.dump());
//!
//! unsafe { allocator.free(ptr) };
//! ```
//!
//! The allocator is single-threaded by design: nothing here locks, and all
//! mutating entry points take `&mut self`.

mod arena;
mod block;
mod fitalloc;
mod freelist;
mod kernel;
mod policy;
mod utils;

pub use fitalloc::{AllocError, DEFAULT_ARENA_SIZE, FitAlloc};
pub use policy::FitPolicy;
