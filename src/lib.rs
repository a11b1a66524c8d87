//! An unsynchronized, probabilistic ordered container (a skiplist) that keeps
//! any number of secondary indexes over the same elements.
//!
//! The primary list orders elements with one [`Comparator`]. Every secondary
//! index, registered under a caller-chosen [`IndexId`], is another skiplist
//! over the very same payloads ordered by its own comparator. The towers that
//! represent one element in each index are chained together, so once an
//! element is located through any index it is unlinked from all of them
//! without searching again.
//!
//! Each payload is stored once. Node cells refer to it by id and live in
//! chunks obtained from an [`Allocator`]: [`Heap`] takes them from the
//! global allocator, [`Pool`] carves them out of a bounded, never-freeing
//! [`Arena`] and reuses released chunks of the same size. Payloads never need
//! to be [`Clone`].
//!
//! ```rust
//! use indexed_skl::{Ascend, IndexId, SkipList};
//!
//! const BY_NAME: IndexId = IndexId::new(0);
//! const BY_LEN: IndexId = IndexId::new(1);
//!
//! let mut list = SkipList::new();
//! list.set_compare(BY_NAME, Ascend, Ascend).unwrap();
//! list.add_index(BY_LEN, |a: &&str, b: &&str| a.len().cmp(&b.len()), |a: &&str, b: &&str| a.len().cmp(&b.len())).unwrap();
//!
//! list.insert("tiger").unwrap();
//! list.insert("ox").unwrap();
//! list.insert("rabbit").unwrap();
//!
//! assert_eq!(list.iter().copied().collect::<Vec<_>>(), ["ox", "rabbit", "tiger"]);
//! assert_eq!(list.find_by(BY_LEN, &"cat"), None);
//! assert_eq!(list.find_by(BY_LEN, &"dragon"), Some(&"rabbit"));
//!
//! // removing through one index removes the element from all of them
//! assert_eq!(list.remove_by(BY_LEN, &"zz"), Some("ox"));
//! assert_eq!(list.len_by(BY_LEN), Some(2));
//! assert_eq!(list.find(&"ox"), None);
//! ```
#![cfg_attr(not(all(feature = "std", test)), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]
#![deny(missing_docs)]
#![allow(clippy::type_complexity)]

#[cfg(not(feature = "std"))]
extern crate alloc as std;

#[cfg(feature = "std")]
extern crate std;

use core::cmp;

mod allocator;
pub use allocator::{Allocator, Chunk, Heap, Pool};

mod arena;
pub use arena::{Arena, ArenaError};

mod builder;
pub use builder::{Builder, Options};

mod coin;
mod directory;
pub use directory::IndexId;

mod error;
pub use error::Error;

mod list;
mod node;
mod stack;

mod skiplist;
pub use skiplist::{Cursor, Iter, SkipList};

/// Comparator orders the payloads of one index.
///
/// Any `Fn(&T, &T) -> Ordering` is a comparator, so closures and plain
/// functions can be registered directly.
pub trait Comparator<T: ?Sized> {
  /// Compares two payloads.
  fn compare(&self, a: &T, b: &T) -> cmp::Ordering;
}

impl<T, F> Comparator<T> for F
where
  T: ?Sized,
  F: Fn(&T, &T) -> cmp::Ordering,
{
  #[inline]
  fn compare(&self, a: &T, b: &T) -> cmp::Ordering {
    self(a, b)
  }
}

/// Ascend is a comparator that orders payloads by their [`Ord`] implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ascend;

impl<T: Ord + ?Sized> Comparator<T> for Ascend {
  #[inline]
  fn compare(&self, a: &T, b: &T) -> cmp::Ordering {
    a.cmp(b)
  }
}

/// Descend is a comparator that orders payloads in reverse [`Ord`] order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Descend;

impl<T: Ord + ?Sized> Comparator<T> for Descend {
  #[inline]
  fn compare(&self, a: &T, b: &T) -> cmp::Ordering {
    b.cmp(a)
  }
}
