//! # segalloc - a segregated free-list allocator over 4 KiB pages
//!
//! Memory comes from the kernel one page at a time (`mmap` on unix,
//! `VirtualAlloc` on windows). Every page is cut into five zones, one per
//! size class, and each zone keeps a chain of free nodes living inside the
//! free memory itself:
//!
//! ```text
//!   Page (4096 bytes)
//!   +-------+--------+----------+-------------+-------------------------+----+
//!   | 128 B | 256 B  |  512 B   |   1024 B    |         2048 B          |    |
//!   +-------+--------+----------+-------------+-------------------------+----+
//!
//!   Allocated block:
//!   +--------------------------+----------------------------+
//!   | Header                   | payload (requested bytes)  |
//!   | size|magic|page|class    |                            |
//!   +--------------------------+----------------------------+
//!                              ^
//!                              +-- pointer returned to the caller
//! ```
//!
//! Requests are served first-fit from the smallest class that can hold them,
//! splitting the free node when the rest is worth keeping. Released blocks go
//! back to the head of their chain and swallow the free nodes that follow
//! them in memory. Pages are never given back to the kernel while the
//! allocator is alive.
//!
//! ## Quick start
//!
//! ```rust
//! use segalloc::SegAlloc;
//!
//! let mut allocator = SegAlloc::new();
//! let before = allocator.available_memory();
//!
//! let ptr = allocator.allocate(100);
//! assert!(!ptr.is_null());
//!
//! unsafe { allocator.release(ptr) };
//! assert_eq!(allocator.available_memory(), before);
//! ```
//!
//! ## Limitations
//!
//! - Single threaded.
//! - Requests above [`MAX_ALLOCATION`] bytes are refused.
//! - Returned pointers are not aligned.
//! - Coalescing only looks forward, so releasing neighbours in ascending
//!   address order leaves them split.

mod allocator;
mod config;
mod error;
mod freelist;
mod kernel;
mod layout;
mod page;
mod size_class;
mod store;

pub use allocator::SegAlloc;
pub use config::Config;
pub use error::{AllocError, ReleaseError};
pub use layout::{HEADER_OVERHEAD, NODE_OVERHEAD};
pub use page::PAGE_SIZE;
pub use size_class::{SizeClass, MAX_ALLOCATION};
pub use store::FreeLists;
