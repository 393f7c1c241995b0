use std::{error, fmt, process};

use log::{debug, error, warn};

/// Everything that can go wrong inside the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
  /// The provider refused to map `requested` more bytes.
  OutOfMemory { requested: usize },
  /// A size computation overflowed `usize`.
  SizeOverflow,
  /// The request rounds to zero bytes.
  ZeroSize,
  /// A chosen block turned out smaller than the request.
  SizeExceedsBlock { requested: usize, available: usize },
  /// The boundary tag behind the block at `addr` no longer matches its header.
  CorruptedBlock { addr: usize },
  /// The block at `addr` was already free when released.
  DoubleFree { addr: usize },
  /// The block at `addr` is free and cannot be resized.
  NotAllocated { addr: usize },
  /// Reallocation to zero bytes was requested.
  InvalidReallocSize,
}

/// A [`Result`] type with [`HeapError`] as the error type.
pub type HeapResult<T = ()> = Result<T, HeapError>;

impl HeapError {
  /// Fatal errors mean the pointer chain can no longer be trusted.
  pub fn is_fatal(&self) -> bool {
    matches!(self, HeapError::CorruptedBlock { .. })
  }
}

impl fmt::Display for HeapError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapError::OutOfMemory { requested } => {
        write!(f, "mapping of {requested} bytes was denied")
      }
      HeapError::SizeOverflow => f.write_str("requested size overflows usize"),
      HeapError::ZeroSize => f.write_str("requested size is zero"),
      HeapError::SizeExceedsBlock {
        requested,
        available,
      } => write!(
        f,
        "allocation of {requested} bytes exceeds block of {available} bytes"
      ),
      HeapError::CorruptedBlock { addr } => {
        write!(f, "invalid pointer or corrupted block at {addr:#x}")
      }
      HeapError::DoubleFree { addr } => {
        write!(f, "block at {addr:#x} is already free")
      }
      HeapError::NotAllocated { addr } => {
        write!(f, "block at {addr:#x} is not allocated")
      }
      HeapError::InvalidReallocSize => f.write_str("invalid size requested for reallocation"),
    }
  }
}

impl error::Error for HeapError {}

/// Sends `err` to the log. A fatal error then aborts the process.
pub fn report(err: &HeapError) {
  match err {
    HeapError::ZeroSize => debug!("{err}"),
    HeapError::DoubleFree { .. } | HeapError::NotAllocated { .. } => warn!("{err}"),
    _ if err.is_fatal() => {
      error!("{err}; terminating");
      process::abort();
    }
    _ => error!("{err}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_corruption_is_fatal() {
    assert!(HeapError::CorruptedBlock { addr: 0x1000 }.is_fatal());

    for err in [
      HeapError::OutOfMemory { requested: 64 },
      HeapError::SizeOverflow,
      HeapError::ZeroSize,
      HeapError::SizeExceedsBlock {
        requested: 64,
        available: 32,
      },
      HeapError::DoubleFree { addr: 0x1000 },
      HeapError::NotAllocated { addr: 0x1000 },
      HeapError::InvalidReallocSize,
    ] {
      assert!(!err.is_fatal(), "{err:?}");
      report(&err);
    }
  }

  #[test]
  fn test_display() {
    assert_eq!(
      HeapError::DoubleFree { addr: 0x20 }.to_string(),
      "block at 0x20 is already free"
    );
    assert_eq!(
      HeapError::OutOfMemory { requested: 4096 }.to_string(),
      "mapping of 4096 bytes was denied"
    );
  }
}
