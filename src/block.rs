//! Block header and boundary-tag layout.
//!
//! ```text
//!   ┌──────────────────────────┬──────────────────────┬─────────┐
//!   │ Block header             │ payload (size bytes) │ tag     │
//!   │ prev, next, size, span,  │                      │ = size  │
//!   │ status                   │                      │         │
//!   └──────────────────────────┴──────────────────────┴─────────┘
//!   ▲                          ▲
//!   block                      pointer handed to the client
//! ```

use std::{mem, ptr};

use crate::align::WORD_SIZE;

/// Bytes occupied by a [`Block`] header in front of every payload.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

/// Bytes occupied by the boundary tag behind every payload.
pub const TAG_SIZE: usize = WORD_SIZE;

/// Metadata cost of one block: its header plus its boundary tag.
///
/// This is what a split spends and what a coalesce gives back.
pub const BLOCK_OVERHEAD: usize = HEADER_SIZE + TAG_SIZE;

const _: () = assert!(HEADER_SIZE % WORD_SIZE == 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockStatus {
  Free,
  Allocated,
}

#[repr(C)]
pub struct Block {
  pub prev: *mut Block,
  pub next: *mut Block,
  /// Payload length in bytes, excluding header and tag.
  pub size: usize,
  /// Length of the OS mapping this block starts, or 0 if the block was
  /// split off its predecessor.
  pub span: usize,
  pub status: BlockStatus,
}

impl Block {
  pub fn new(
    size: usize,
    span: usize,
  ) -> Self {
    Self {
      prev: ptr::null_mut(),
      next: ptr::null_mut(),
      size,
      span,
      status: BlockStatus::Free,
    }
  }

  /// Recovers the header of the block whose payload starts at `payload`.
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by [`Block::payload`].
  pub unsafe fn from_payload(payload: *mut u8) -> *mut Block {
    unsafe { payload.sub(HEADER_SIZE) as *mut Block }
  }

  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn payload(block: *mut Block) -> *mut u8 {
    unsafe { (block as *mut u8).add(HEADER_SIZE) }
  }

  /// Address of the boundary tag for the current `size`.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header.
  unsafe fn tag(block: *mut Block) -> *mut usize {
    unsafe { Block::payload(block).add((*block).size) as *mut usize }
  }

  /// First byte past this block's tag.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn end(block: *mut Block) -> *mut u8 {
    unsafe { (Block::tag(block) as *mut u8).add(TAG_SIZE) }
  }

  /// Total bytes covered by the block, metadata included.
  pub fn total_len(&self) -> usize {
    self.size + BLOCK_OVERHEAD
  }

  /// Writes the boundary tag so it matches `size`.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header whose `size` lies inside its mapping.
  pub unsafe fn seal(block: *mut Block) {
    unsafe { Block::tag(block).write((*block).size) }
  }

  /// # Safety
  ///
  /// `block` must point to readable memory covering header, payload and tag.
  pub unsafe fn tag_matches(block: *mut Block) -> bool {
    unsafe { Block::tag(block).read() == (*block).size }
  }

  #[inline]
  pub fn is_free(&self) -> bool {
    self.status == BlockStatus::Free
  }

  /// Whether this block begins an OS mapping.
  #[inline]
  pub fn is_mapping_head(&self) -> bool {
    self.span != 0
  }
}
