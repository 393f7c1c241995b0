use std::mem;

/// Width of a machine word. Every block size is a multiple of it.
pub const WORD_SIZE: usize = mem::size_of::<usize>();

/// Rounds `$value` up to the next multiple of the machine word.
///
/// Wraps on overflow; use [`align_to_word`] for untrusted sizes.
///
/// # Examples
///
/// ```rust
/// use tagheap::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + ::core::mem::size_of::<usize>() - 1) & !(::core::mem::size_of::<usize>() - 1)
  };
}

/// Checked version of [`align!`]: `None` when rounding up would overflow.
pub const fn align_to_word(size: usize) -> Option<usize> {
  match size.checked_add(WORD_SIZE - 1) {
    Some(padded) => Some(padded & !(WORD_SIZE - 1)),
    None => None,
  }
}

#[inline]
pub const fn is_word_aligned(value: usize) -> bool {
  value & (WORD_SIZE - 1) == 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (WORD_SIZE * i + 1)..=(WORD_SIZE * (i + 1));

      let expected_alignment = WORD_SIZE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
        assert_eq!(Some(expected), align_to_word(size));
      }
    }
  }

  #[test]
  fn test_align_zero_stays_zero() {
    assert_eq!(align!(0usize), 0);
    assert_eq!(align_to_word(0), Some(0));
  }

  #[test]
  fn test_align_to_word_overflow() {
    assert_eq!(align_to_word(usize::MAX), None);
    assert_eq!(align_to_word(usize::MAX - WORD_SIZE + 2), None);
    assert_eq!(align_to_word(usize::MAX - WORD_SIZE + 1), Some(usize::MAX - WORD_SIZE + 1));
  }

  #[test]
  fn test_is_word_aligned() {
    assert!(is_word_aligned(0));
    assert!(is_word_aligned(WORD_SIZE * 3));
    assert!(!is_word_aligned(WORD_SIZE + 1));
  }
}
