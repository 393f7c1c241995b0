//! The block directory: an address-ordered, doubly linked list of every
//! block the heap manages.

use std::{marker::PhantomData, ptr, ptr::NonNull};

use crate::block::{BLOCK_OVERHEAD, Block};

pub struct BlockList {
  first: *mut Block,
  last: *mut Block,
}

impl BlockList {
  pub const fn new() -> Self {
    Self {
      first: ptr::null_mut(),
      last: ptr::null_mut(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.first.is_null()
  }

  pub fn first(&self) -> *mut Block {
    self.first
  }

  pub fn last(&self) -> *mut Block {
    self.last
  }

  /// First-fit search: the lowest-addressed free block with at least
  /// `size` payload bytes, or null.
  pub unsafe fn find_free_block(
    &self,
    size: usize,
  ) -> *mut Block {
    unsafe {
      let mut current: *mut Block = self.first;

      while !current.is_null() {
        if (*current).is_free() && (*current).size >= size {
          return current;
        }
        current = (*current).next;
      }

      ptr::null_mut()
    }
  }

  /// Links `block` right after `anchor`, or at the front when `anchor` is null.
  pub unsafe fn insert_after(
    &mut self,
    anchor: *mut Block,
    block: *mut Block,
  ) {
    unsafe {
      let next = if anchor.is_null() {
        self.first
      } else {
        (*anchor).next
      };

      (*block).prev = anchor;
      (*block).next = next;

      if anchor.is_null() {
        self.first = block;
      } else {
        (*anchor).next = block;
      }

      if next.is_null() {
        self.last = block;
      } else {
        (*next).prev = block;
      }
    }
  }

  /// Links `block` at its address-ordered position, walking back from the
  /// tail.
  pub unsafe fn insert_ordered(
    &mut self,
    block: *mut Block,
  ) {
    unsafe {
      let mut anchor = self.last();
      while !anchor.is_null() && anchor > block {
        anchor = (*anchor).prev;
      }
      self.insert_after(anchor, block);
    }
  }

  pub unsafe fn unlink(
    &mut self,
    block: *mut Block,
  ) {
    unsafe {
      let prev = (*block).prev;
      let next = (*block).next;

      if prev.is_null() {
        self.first = next;
      } else {
        (*prev).next = next;
      }

      if next.is_null() {
        self.last = prev;
      } else {
        (*next).prev = prev;
      }

      (*block).prev = ptr::null_mut();
      (*block).next = ptr::null_mut();
    }
  }

  /// Shrinks `block` to `size` bytes and links the leftover space behind it
  /// as a new free block, which is returned.
  ///
  /// The caller guarantees `(*block).size > size + BLOCK_OVERHEAD`.
  pub unsafe fn split(
    &mut self,
    block: *mut Block,
    size: usize,
  ) -> *mut Block {
    unsafe {
      debug_assert!((*block).size > size + BLOCK_OVERHEAD);

      let remainder_size = (*block).size - size - BLOCK_OVERHEAD;
      (*block).size = size;
      Block::seal(block);

      let remainder = Block::end(block) as *mut Block;
      remainder.write(Block::new(remainder_size, 0));
      Block::seal(remainder);

      self.insert_after(block, remainder);
      remainder
    }
  }

  /// Folds the block after `block` into it. The absorbed header becomes
  /// payload.
  ///
  /// The caller guarantees the successor exists and sits right behind
  /// `block` in memory.
  pub unsafe fn absorb_next(
    &mut self,
    block: *mut Block,
  ) {
    unsafe {
      let next = (*block).next;
      debug_assert!(!next.is_null() && !(*next).is_mapping_head());
      debug_assert_eq!(Block::end(block), next as *mut u8);

      (*block).size += BLOCK_OVERHEAD + (*next).size;
      self.unlink(next);
      Block::seal(block);
    }
  }

  pub fn iter(&self) -> Blocks<'_> {
    Blocks {
      current: self.first(),
      _list: PhantomData,
    }
  }
}

impl Default for BlockList {
  fn default() -> Self {
    Self::new()
  }
}

/// Address-ordered walk over a [`BlockList`].
pub struct Blocks<'a> {
  current: *mut Block,
  _list: PhantomData<&'a BlockList>,
}

impl Iterator for Blocks<'_> {
  type Item = NonNull<Block>;

  fn next(&mut self) -> Option<Self::Item> {
    let block = NonNull::new(self.current)?;
    self.current = unsafe { (*block.as_ptr()).next };
    Some(block)
  }
}
