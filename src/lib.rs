//! # tagheap - A First-Fit Heap with Boundary Tags
//!
//! This crate provides a user-space **first-fit heap**: `allocate`,
//! `zero_allocate`, `reallocate` and `release` on top of anonymous memory
//! mappings obtained with `mmap(2)`.
//!
//! ## Overview
//!
//! Every block the heap knows about sits in one address-ordered, doubly
//! linked directory. Allocation walks it for the first free block that is
//! large enough; on a miss, exactly one new mapping is requested.
//!
//! ```text
//!   Block Directory (address order):
//!
//!   ┌─────────────── mapping A ───────────────┐   ┌──── mapping B ────┐
//!   │ ┌────────┐   ┌────────┐   ┌───────────┐ │   │ ┌───────────────┐ │
//!   │ │ alloc  │ ⇄ │  free  │ ⇄ │  alloc    │ │ ⇄ │ │     free      │ │
//!   │ └────────┘   └────────┘   └───────────┘ │   │ └───────────────┘ │
//!   └─────────────────────────────────────────┘   └───────────────────┘
//!
//!   Splitting carves blocks out of a mapping; coalescing glues neighbours
//!   in the same mapping back together.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagheap
//!   ├── align      - Word alignment (align!, align_to_word)
//!   ├── block      - Block header and boundary tag layout
//!   ├── list       - The address-ordered block directory
//!   ├── provider   - HeapProvider trait, MmapProvider
//!   ├── error      - HeapError and the reporting channel
//!   └── heap       - Heap: allocation, release, reallocation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tagheap::Heap;
//!
//! fn main() {
//!     let mut heap = Heap::new();
//!
//!     unsafe {
//!         let ptr = heap.allocate(8) as *mut u64;
//!         *ptr = 42;
//!
//!         let ptr = heap.reallocate(ptr as *mut u8, 64) as *mut u64;
//!         assert_eq!(*ptr, 42);
//!
//!         heap.release(ptr as *mut u8);
//!     }
//! }
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┬─────────┐
//!   │    Block Header       │         User Data              │   Tag   │
//!   │  ┌─────────────────┐  │                                │         │
//!   │  │ prev, next      │  │  ┌──────────────────────────┐  │  ┌───┐  │
//!   │  │ size: N         │  │  │                          │  │  │ N │  │
//!   │  │ span            │  │  │     N bytes usable       │  │  └───┘  │
//!   │  │ status          │  │  │                          │  │         │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │         │
//!   └───────────────────────┴────────────────────────────────┴─────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! The trailing tag repeats `size`. A release whose tag no longer matches
//! means the block was overrun or the pointer never came from this heap;
//! the process is aborted.
//!
//! ## Errors
//!
//! The `try_*` methods return [`HeapError`]. The plain methods send the
//! error to the [`log`] facade and hand back a null pointer, so the
//! destination of diagnostics is whatever logger the host installs.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` is neither `Send` nor `Sync`
//! - **Word alignment only**: payloads are aligned to `usize`
//! - **One mapping per miss**: no pooling or batching of OS requests
//! - **Unix-only**: requires `libc` (`mmap`/`munmap`)
//!
//! ## Safety
//!
//! Releasing and reallocating trust the pointer they are given: the header
//! is found by subtracting its size from the payload address. Those
//! operations are `unsafe`.

pub mod align;
mod block;
mod error;
mod heap;
mod list;
mod provider;

pub use block::{BLOCK_OVERHEAD, BlockStatus, HEADER_SIZE, TAG_SIZE};
pub use error::{HeapError, HeapResult};
pub use heap::{BlockInfo, HEAP_CONTRACT_THRESHOLD, Heap, HeapConfig, HeapStats};
pub use provider::{HeapProvider, MmapProvider};
