use rarena_allocator::{unsync::Arena as Memory, Allocator as _, Buffer as _, Freelist, Options as ArenaOptions};

use super::Error;

pub use rarena_allocator::Error as ArenaError;

/// Alignment of every chunk carved out of an [`Arena`].
pub(crate) const CHUNK_ALIGN: usize = 8;

/// Zero-sized stand-in that makes the arena align a chunk to [`CHUNK_ALIGN`].
type Aligned = [u64; 0];

/// A bounded region that chunks are carved out of.
///
/// Chunks are never given back to the arena, it is only released as a whole
/// once the last handle is dropped. Cloning an `Arena` returns another handle
/// to the same memory, so several lists (and the index directory of one
/// list) can draw on one budget.
///
/// The arena is not synchronized, handles must stay on one thread.
#[derive(Clone)]
pub struct Arena {
  mem: Memory,
}

impl core::fmt::Debug for Arena {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Arena")
      .field("cap", &self.capacity())
      .field("allocated", &self.allocated())
      .finish()
  }
}

impl Arena {
  /// Creates an arena holding at most `capacity` bytes.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use indexed_skl::Arena;
  ///
  /// let arena = Arena::new(1 << 16).unwrap();
  /// assert_eq!(arena.capacity(), 1 << 16);
  /// assert_eq!(arena.remaining(), arena.capacity() - arena.allocated());
  /// ```
  pub fn new(capacity: u32) -> Result<Self, Error> {
    ArenaOptions::new()
      .with_capacity(capacity)
      .with_freelist(Freelist::None)
      .with_maximum_alignment(CHUNK_ALIGN)
      .alloc::<Memory>()
      .map(|mem| Self { mem })
      .map_err(Into::into)
  }

  /// Returns the number of bytes allocated by the arena.
  #[inline]
  pub fn allocated(&self) -> usize {
    self.mem.allocated()
  }

  /// Returns the capacity of the arena.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.mem.capacity()
  }

  /// Returns the number of remaining bytes can be allocated by the arena.
  #[inline]
  pub fn remaining(&self) -> usize {
    self.mem.remaining()
  }

  /// Returns the number of handles to the arena.
  #[inline]
  pub fn refs(&self) -> usize {
    self.mem.refs()
  }

  /// Carves `size` bytes aligned to [`CHUNK_ALIGN`] and returns their offset.
  pub(crate) fn carve(&self, size: usize) -> Result<usize, Error> {
    let requested = u32::try_from(size).map_err(|_| Error::Exhausted)?;
    match self.mem.alloc_aligned_bytes::<Aligned>(requested) {
      Ok(mut bytes) => {
        let offset = bytes.offset();
        // the chunk belongs to a pool from now on
        unsafe { bytes.detach() };
        Ok(offset)
      }
      Err(e) => {
        #[cfg(feature = "tracing")]
        tracing::warn!(
          size,
          allocated = self.allocated(),
          cap = self.capacity(),
          "arena is full"
        );
        Err(e.into())
      }
    }
  }

  /// Returns the `size` bytes starting at `offset`.
  ///
  /// `offset` must come from [`carve`](Arena::carve) on a handle to this
  /// arena with at least `size` bytes.
  #[inline]
  pub(crate) fn bytes(&self, offset: usize, size: usize) -> &[u8] {
    // Safety: the range was carved out of this arena and is never released.
    unsafe { self.mem.get_bytes(offset, size) }
  }

  /// Mutable counterpart of [`bytes`](Arena::bytes).
  #[inline]
  pub(crate) fn bytes_mut(&mut self, offset: usize, size: usize) -> &mut [u8] {
    // Safety: the range was carved out of this arena and is owned by exactly
    // one pool chunk, which is borrowed mutably through `self`.
    unsafe { self.mem.get_bytes_mut(offset, size) }
  }
}
