use super::{Allocator, Arena, Heap, Pool, SkipList};

mod options;
pub use options::*;

/// The builder to build a [`SkipList`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Builder {
  opts: Options,
}

impl Builder {
  /// Create a new `Builder` with default values.
  #[inline]
  pub const fn new() -> Self {
    Self {
      opts: Options::new(),
    }
  }

  /// Returns a new builder with the new [`Options`].
  ///
  /// ## Example
  ///
  /// ```rust
  /// use indexed_skl::{Builder, Options};
  ///
  /// let builder = Builder::new().with_options(Options::new().with_preheight(4));
  /// ```
  #[inline]
  pub const fn with_options(mut self, opts: Options) -> Self {
    self.opts = opts;
    self
  }

  /// Set the fixed tower height bound, see [`Options::with_preheight`].
  #[inline]
  pub const fn with_preheight(mut self, preheight: usize) -> Self {
    self.opts = self.opts.with_preheight(preheight);
    self
  }

  /// Set the seed of the height coin, see [`Options::with_seed`].
  #[inline]
  pub const fn with_seed(mut self, seed: u64) -> Self {
    self.opts = self.opts.with_seed(seed);
    self
  }

  /// Returns the options of the builder.
  #[inline]
  pub const fn options(&self) -> &Options {
    &self.opts
  }

  /// Builds a list whose cells come from the global heap.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use indexed_skl::{Ascend, Builder, IndexId};
  ///
  /// let mut list = Builder::new().with_seed(1).build::<u32>();
  /// list.set_compare(IndexId::new(0), Ascend, Ascend).unwrap();
  /// list.insert(3).unwrap();
  /// assert!(list.height() >= 1);
  /// ```
  #[inline]
  pub fn build<T>(self) -> SkipList<T, Heap> {
    self.build_with(Heap::new())
  }

  /// Builds a list whose cells are carved out of `arena`.
  ///
  /// Released cells are reused by later insertions, the arena itself never
  /// shrinks.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use indexed_skl::{Arena, Ascend, Builder, IndexId};
  ///
  /// let arena = Arena::new(1 << 16).unwrap();
  /// let mut list = Builder::new().build_in::<u32>(arena.clone());
  /// list.set_compare(IndexId::new(0), Ascend, Ascend).unwrap();
  /// let before = arena.allocated();
  /// list.insert(3).unwrap();
  /// assert!(arena.allocated() > before);
  /// ```
  #[inline]
  pub fn build_in<T>(self, arena: Arena) -> SkipList<T, Pool> {
    self.build_with(Pool::new(arena))
  }

  /// Builds a list on top of the given allocator.
  #[inline]
  pub fn build_with<T, A: Allocator>(self, alloc: A) -> SkipList<T, A> {
    SkipList::with_options(alloc, self.opts)
  }
}
