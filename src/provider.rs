//! Where heap memory comes from.

use std::{io, ptr, ptr::NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};
use log::debug;

/// Source of whole memory mappings, one per heap growth.
pub trait HeapProvider {
  /// Maps `len` fresh read/write bytes, or `None` if the request is denied.
  ///
  /// The returned address must be aligned to at least a machine word.
  fn map(
    &mut self,
    len: usize,
  ) -> Option<NonNull<u8>>;

  /// Returns a mapping obtained from [`HeapProvider::map`].
  ///
  /// # Safety
  ///
  /// `addr` and `len` must describe exactly one earlier mapping, and nothing
  /// may touch it afterwards.
  unsafe fn unmap(
    &mut self,
    addr: NonNull<u8>,
    len: usize,
  );
}

/// Anonymous private mappings straight from the kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapProvider;

impl HeapProvider for MmapProvider {
  fn map(
    &mut self,
    len: usize,
  ) -> Option<NonNull<u8>> {
    let address = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      debug!("mmap of {len} bytes failed: {}", io::Error::last_os_error());
      return None;
    }

    NonNull::new(address as *mut u8)
  }

  unsafe fn unmap(
    &mut self,
    addr: NonNull<u8>,
    len: usize,
  ) {
    if unsafe { munmap(addr.as_ptr() as *mut c_void, len) } != 0 {
      debug!(
        "munmap of {len} bytes at {:?} failed: {}",
        addr,
        io::Error::last_os_error()
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_map_is_writable_and_page_aligned() {
    let mut provider = MmapProvider;
    let len = 3 * 4096 + 17;

    let addr = provider.map(len).unwrap();
    assert_eq!(addr.as_ptr() as usize % 4096, 0);

    unsafe {
      ptr::write_bytes(addr.as_ptr(), 0xAB, len);
      assert_eq!(*addr.as_ptr().add(len - 1), 0xAB);

      provider.unmap(addr, len);
    }
  }

  #[test]
  fn test_map_denied() {
    assert!(MmapProvider.map(usize::MAX - 4095).is_none());
  }
}
