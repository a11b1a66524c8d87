/// Options for a [`SkipList`](crate::SkipList).
#[viewit::viewit(vis_all = "pub(crate)", getters(skip), setters(skip))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Options {
  preheight: usize,
  seed: Option<u64>,
}

impl Options {
  /// Creates a new set of options with the default values.
  #[inline]
  pub const fn new() -> Self {
    Self {
      preheight: 0,
      seed: None,
    }
  }

  /// Set the fixed tower height bound of the primary list.
  ///
  /// With a preheight every new tower is drawn in `1..=preheight`. `0` lets
  /// a tower grow at most one level above the list it joins.
  ///
  /// The default preheight is `0`.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use indexed_skl::Options;
  ///
  /// let opts = Options::new().with_preheight(7);
  /// assert_eq!(opts.preheight(), 7);
  /// ```
  #[inline]
  pub const fn with_preheight(mut self, preheight: usize) -> Self {
    self.preheight = preheight;
    self
  }

  /// Set the seed of the coin that draws tower heights.
  ///
  /// Without a seed the coin is seeded from the operating system, with one
  /// every height draw is reproducible.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use indexed_skl::Options;
  ///
  /// let opts = Options::new().with_seed(42);
  /// assert_eq!(opts.seed(), Some(42));
  /// ```
  #[inline]
  pub const fn with_seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  /// Returns the fixed tower height bound.
  #[inline]
  pub const fn preheight(&self) -> usize {
    self.preheight
  }

  /// Returns the seed of the coin, if any.
  #[inline]
  pub const fn seed(&self) -> Option<u64> {
    self.seed
  }
}
