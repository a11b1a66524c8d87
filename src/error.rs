use std::collections::TryReserveError;

use crate::ArenaError;

/// Error type for the [`SkipList`](crate::SkipList).
#[derive(Debug)]
pub enum Error {
  /// Indicates that the arena has no room left for another chunk.
  Arena(ArenaError),

  /// Indicates that every chunk or element id is already handed out.
  Exhausted,

  /// Indicates that the heap refused to grow a chunk or the element table.
  Reserve(TryReserveError),

  /// Indicates that the list has no primary ordering yet, see
  /// [`SkipList::set_compare`](crate::SkipList::set_compare).
  NoComparator,
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::Arena(e) => write!(f, "{e}"),
      Self::Exhausted => write!(f, "no more ids can be handed out"),
      Self::Reserve(e) => write!(f, "{e}"),
      Self::NoComparator => write!(f, "no comparator has been set for the skiplist"),
    }
  }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<ArenaError> for Error {
  fn from(e: ArenaError) -> Self {
    Self::Arena(e)
  }
}

impl From<TryReserveError> for Error {
  fn from(e: TryReserveError) -> Self {
    Self::Reserve(e)
  }
}
