use std::{ptr, ptr::NonNull};

use log::debug;

use crate::{
  align::{align_to_word, is_word_aligned},
  block::{BLOCK_OVERHEAD, Block, BlockStatus, TAG_SIZE},
  error::{HeapError, HeapResult, report},
  list::BlockList,
  provider::{HeapProvider, MmapProvider},
};

/// Free mappings with more payload than this go back to the provider.
pub const HEAP_CONTRACT_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Payload bytes a free block must exceed before its mapping is
  /// returned.
  pub contract_threshold: usize,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      contract_threshold: HEAP_CONTRACT_THRESHOLD,
    }
  }

  pub const fn with_contract_threshold(
    mut self,
    contract_threshold: usize,
  ) -> Self {
    self.contract_threshold = contract_threshold;
    self
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}

/// Snapshot of one block, as seen by [`Heap::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Address of the payload, i.e. the pointer a client holds.
  pub payload: usize,
  pub size: usize,
  pub status: BlockStatus,
  /// Whether the block starts its own OS mapping.
  pub mapping_head: bool,
}

impl BlockInfo {
  /// First byte past this block's boundary tag.
  pub fn end(&self) -> usize {
    self.payload + self.size + TAG_SIZE
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub blocks: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub allocated_bytes: usize,
  pub mapped_bytes: usize,
}

/// A first-fit heap over memory obtained from a [`HeapProvider`].
///
/// All state lives in this value: the block directory and the provider.
/// Raw pointers make it neither `Send` nor `Sync`.
pub struct Heap<P: HeapProvider = MmapProvider> {
  blocks: BlockList,
  provider: P,
  config: HeapConfig,
}

impl Heap<MmapProvider> {
  pub fn new() -> Self {
    Self::with_provider(MmapProvider)
  }
}

impl Default for Heap<MmapProvider> {
  fn default() -> Self {
    Self::new()
  }
}

impl<P: HeapProvider> Heap<P> {
  pub fn with_provider(provider: P) -> Self {
    Self::with_config(provider, HeapConfig::default())
  }

  pub fn with_config(
    provider: P,
    config: HeapConfig,
  ) -> Self {
    Self {
      blocks: BlockList::new(),
      provider,
      config,
    }
  }

  pub fn config(&self) -> HeapConfig {
    self.config
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }

  /// Allocates `size` bytes, rounded up to the machine word.
  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> HeapResult<NonNull<u8>> {
    let size = match align_to_word(size) {
      Some(0) => return Err(HeapError::ZeroSize),
      Some(size) => size,
      None => return Err(HeapError::SizeOverflow),
    };

    unsafe {
      let mut block = self.blocks.find_free_block(size);
      if block.is_null() {
        block = self.grow(size)?;
      }

      if size > (*block).size {
        return Err(HeapError::SizeExceedsBlock {
          requested: size,
          available: (*block).size,
        });
      }

      if (*block).size > size + BLOCK_OVERHEAD {
        self.blocks.split(block, size);
      }

      (*block).status = BlockStatus::Allocated;
      Block::seal(block);

      Ok(NonNull::new_unchecked(Block::payload(block)))
    }
  }

  /// Like [`Heap::try_allocate`], but reports failures and returns null.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    or_report(self.try_allocate(size))
  }

  /// Allocates `count * size` zeroed bytes.
  pub fn try_zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> HeapResult<NonNull<u8>> {
    let total = count.checked_mul(size).ok_or(HeapError::SizeOverflow)?;
    let payload = self.try_allocate(total)?;

    unsafe { ptr::write_bytes(payload.as_ptr(), 0, total) };

    Ok(payload)
  }

  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    or_report(self.try_zero_allocate(count, size))
  }

  /// Resizes the allocation at `address` to `size` bytes.
  ///
  /// A null `address` allocates. Shrinking and growing into a free
  /// successor keep the address; otherwise the payload moves and the old
  /// block is released. A zero `size` is rejected, the block stays intact.
  ///
  /// # Safety
  ///
  /// `address` must be null or a live pointer returned by this heap.
  pub unsafe fn try_reallocate(
    &mut self,
    address: *mut u8,
    size: usize,
  ) -> HeapResult<NonNull<u8>> {
    let Some(payload) = NonNull::new(address) else {
      return self.try_allocate(size);
    };

    let size = match align_to_word(size) {
      Some(0) => return Err(HeapError::InvalidReallocSize),
      Some(size) => size,
      None => return Err(HeapError::SizeOverflow),
    };

    unsafe {
      let block = Block::from_payload(payload.as_ptr());
      check_tag(block, payload)?;

      if (*block).is_free() {
        return Err(HeapError::NotAllocated {
          addr: payload.as_ptr() as usize,
        });
      }

      let current = (*block).size;

      if size == current {
        return Ok(payload);
      }

      if size < current {
        if current > size + BLOCK_OVERHEAD {
          self.blocks.split(block, size);
        }
        return Ok(payload);
      }

      let next = free_successor(block);
      if !next.is_null() && current + (*next).size + BLOCK_OVERHEAD >= size {
        self.blocks.absorb_next(block);
        if (*block).size > size + BLOCK_OVERHEAD {
          self.blocks.split(block, size);
        }
        return Ok(payload);
      }

      let fresh = self.try_allocate(size)?;
      ptr::copy_nonoverlapping(payload.as_ptr(), fresh.as_ptr(), current);
      self.try_release(payload.as_ptr())?;

      Ok(fresh)
    }
  }

  /// # Safety
  ///
  /// See [`Heap::try_reallocate`].
  pub unsafe fn reallocate(
    &mut self,
    address: *mut u8,
    size: usize,
  ) -> *mut u8 {
    or_report(unsafe { self.try_reallocate(address, size) })
  }

  /// Frees the allocation at `address`. Null is a no-op.
  ///
  /// The block merges with free neighbours inside its mapping; a free
  /// block that ends up covering a whole mapping larger than the
  /// contraction threshold is unmapped. On error the directory is
  /// unchanged.
  ///
  /// A second release is only recognised as [`HeapError::DoubleFree`]
  /// while the block still owns its header. Once it has been merged into
  /// a free block in front of it, its stale boundary tag holds the merged
  /// size and the release fails with [`HeapError::CorruptedBlock`], which
  /// [`Heap::release`] treats as fatal.
  ///
  /// # Safety
  ///
  /// `address` must be null or a pointer returned by this heap.
  pub unsafe fn try_release(
    &mut self,
    address: *mut u8,
  ) -> HeapResult {
    let Some(payload) = NonNull::new(address) else {
      return Ok(());
    };

    unsafe {
      let block = Block::from_payload(payload.as_ptr());
      check_tag(block, payload)?;

      if (*block).is_free() {
        return Err(HeapError::DoubleFree {
          addr: payload.as_ptr() as usize,
        });
      }

      (*block).status = BlockStatus::Free;
      let block = self.coalesce(block);
      self.contract(block);
    }

    Ok(())
  }

  /// Like [`Heap::try_release`], but reports failures. A corrupted block
  /// aborts the process.
  ///
  /// # Safety
  ///
  /// See [`Heap::try_release`].
  pub unsafe fn release(
    &mut self,
    address: *mut u8,
  ) {
    if let Err(err) = unsafe { self.try_release(address) } {
      report(&err);
    }
  }

  /// Every block in address order.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.blocks.iter().map(|block| unsafe {
      let header = block.as_ref();
      BlockInfo {
        payload: Block::payload(block.as_ptr()) as usize,
        size: header.size,
        status: header.status,
        mapping_head: header.is_mapping_head(),
      }
    })
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats::default();

    for block in self.blocks.iter() {
      let header = unsafe { block.as_ref() };
      stats.blocks += 1;
      stats.mapped_bytes += header.span;
      if header.is_free() {
        stats.free_blocks += 1;
        stats.free_bytes += header.size;
      } else {
        stats.allocated_bytes += header.size;
      }
    }

    stats
  }

  /// Maps a fresh block sized for exactly `size` payload bytes.
  fn grow(
    &mut self,
    size: usize,
  ) -> HeapResult<*mut Block> {
    let span = size
      .checked_add(BLOCK_OVERHEAD)
      .ok_or(HeapError::SizeOverflow)?;
    let address = self
      .provider
      .map(span)
      .ok_or(HeapError::OutOfMemory { requested: span })?;

    debug_assert!(is_word_aligned(address.as_ptr() as usize));
    debug!("mapped {span} bytes at {address:?}");

    let block = address.as_ptr() as *mut Block;
    unsafe {
      block.write(Block::new(size, span));
      Block::seal(block);
      self.blocks.insert_ordered(block);
    }

    Ok(block)
  }

  /// Merges a freshly freed `block` with its free neighbours and returns
  /// the surviving block.
  unsafe fn coalesce(
    &mut self,
    mut block: *mut Block,
  ) -> *mut Block {
    unsafe {
      while !(*block).is_mapping_head() && (*(*block).prev).is_free() {
        let prev = (*block).prev;
        self.blocks.absorb_next(prev);
        block = prev;
      }

      while !free_successor(block).is_null() {
        self.blocks.absorb_next(block);
      }

      block
    }
  }

  /// Unmaps `block` if it is free, above the contraction threshold, and
  /// covers its whole mapping.
  unsafe fn contract(
    &mut self,
    block: *mut Block,
  ) {
    unsafe {
      let span = (*block).span;
      if !(*block).is_free()
        || (*block).size <= self.config.contract_threshold
        || span != (*block).total_len()
      {
        return;
      }

      self.blocks.unlink(block);
      debug!("returning {span} bytes at {block:?}");
      self
        .provider
        .unmap(NonNull::new_unchecked(block as *mut u8), span);
    }
  }
}

impl<P: HeapProvider> Drop for Heap<P> {
  fn drop(&mut self) {
    if self.blocks.is_empty() {
      return;
    }

    let mappings: Vec<(NonNull<u8>, usize)> = self
      .blocks
      .iter()
      .filter_map(|block| {
        let span = unsafe { block.as_ref().span };
        (span != 0).then(|| (block.cast::<u8>(), span))
      })
      .collect();

    self.blocks = BlockList::new();
    for (address, span) in mappings {
      unsafe { self.provider.unmap(address, span) };
    }
  }
}

fn or_report(result: HeapResult<NonNull<u8>>) -> *mut u8 {
  match result {
    Ok(payload) => payload.as_ptr(),
    Err(err) => {
      report(&err);
      ptr::null_mut()
    }
  }
}

unsafe fn check_tag(
  block: *mut Block,
  payload: NonNull<u8>,
) -> HeapResult {
  if unsafe { Block::tag_matches(block) } {
    Ok(())
  } else {
    Err(HeapError::CorruptedBlock {
      addr: payload.as_ptr() as usize,
    })
  }
}

/// The next block if it is free and shares `block`'s mapping, else null.
unsafe fn free_successor(block: *mut Block) -> *mut Block {
  unsafe {
    let next = (*block).next;
    if next.is_null() || !(*next).is_free() || (*next).is_mapping_head() {
      ptr::null_mut()
    } else {
      next
    }
  }
}
