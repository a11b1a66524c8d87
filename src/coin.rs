use rand::{rngs::SmallRng, RngCore, SeedableRng};

/// A fair coin that draws 32 flips at a time from its generator.
#[derive(Debug, Clone)]
pub(crate) struct Coin {
  rng: SmallRng,
  bits: u32,
  left: u32,
}

impl Coin {
  /// Creates a coin seeded from `seed`, or from the OS when `None`.
  pub(crate) fn new(seed: Option<u64>) -> Self {
    let rng = match seed {
      Some(seed) => SmallRng::seed_from_u64(seed),
      None => SmallRng::from_os_rng(),
    };

    Self {
      rng,
      bits: 0,
      left: 0,
    }
  }

  #[inline]
  pub(crate) fn flip(&mut self) -> bool {
    if self.left == 0 {
      self.bits = self.rng.next_u32();
      self.left = u32::BITS;
    }

    let heads = self.bits & 1 == 1;
    self.bits >>= 1;
    self.left -= 1;
    heads
  }

  /// Draws the height of a new tower.
  ///
  /// With a `preheight` the draw is capped to `1..=preheight`, otherwise a
  /// tower is at most one level taller than the list it joins.
  pub(crate) fn height(&mut self, current: usize, preheight: usize) -> usize {
    let mut height = 1;
    if preheight > 0 {
      while height < preheight && self.flip() {
        height += 1;
      }
    } else {
      while height <= current && self.flip() {
        height += 1;
      }
    }
    height
  }
}
