use super::{
  allocator::sealed::Sealed as _,
  node::{NodeId, Nodes},
  Allocator, Chunk, Error,
};

const MIN_CAPACITY: usize = 32;

/// A stack of node ids stored in a chunk of an [`Allocator`].
///
/// Growth either succeeds as a whole or leaves the stack untouched.
#[derive(Debug, Default)]
pub(crate) struct Stack {
  chunk: Option<Chunk>,
  len: usize,
}

impl Stack {
  #[inline]
  pub(crate) const fn new() -> Self {
    Self {
      chunk: None,
      len: 0,
    }
  }

  #[inline]
  pub(crate) const fn len(&self) -> usize {
    self.len
  }

  #[inline]
  fn capacity(&self) -> usize {
    self.chunk.map_or(0, |c| c.size() / NodeId::SIZE)
  }

  pub(crate) fn push<A: Allocator>(&mut self, alloc: &mut A, id: NodeId) -> Result<(), Error> {
    if self.len == self.capacity() {
      self.grow(alloc)?;
    }
    let slot = self
      .chunk
      .and_then(|chunk| alloc.bytes_mut(chunk))
      .and_then(|bytes| bytes.get_mut(self.len * NodeId::SIZE..(self.len + 1) * NodeId::SIZE))
      .ok_or(Error::Exhausted)?;
    slot.copy_from_slice(&id.get().to_ne_bytes());
    self.len += 1;
    Ok(())
  }

  pub(crate) fn pop<A: Allocator>(&mut self, alloc: &A) -> Option<NodeId> {
    let idx = self.len.checked_sub(1)?;
    let id = read(alloc.bytes(self.chunk?)?, idx)?;
    self.len = idx;
    Some(id)
  }

  #[inline]
  pub(crate) fn clear(&mut self) {
    self.len = 0;
  }

  fn grow<A: Allocator>(&mut self, alloc: &mut A) -> Result<(), Error> {
    let cap = (self.len * 2).max(MIN_CAPACITY);
    let chunk = alloc.alloc(cap * NodeId::SIZE)?;

    if let Some(old) = self.chunk.replace(chunk) {
      for idx in 0..self.len {
        let Some(id) = alloc.bytes(old).and_then(|bytes| read(bytes, idx)) else {
          break;
        };
        if let Some(bytes) = alloc.bytes_mut(chunk) {
          bytes[idx * NodeId::SIZE..(idx + 1) * NodeId::SIZE].copy_from_slice(&id.get().to_ne_bytes());
        }
      }
      alloc.dealloc(old);
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(capacity = cap, "grew scratch stack");
    Ok(())
  }

  /// Gives the backing chunk back to `alloc`.
  pub(crate) fn release<A: Allocator>(&mut self, alloc: &mut A) {
    self.len = 0;
    if let Some(chunk) = self.chunk.take() {
      alloc.dealloc(chunk);
    }
  }
}

fn read(bytes: &[u8], idx: usize) -> Option<NodeId> {
  let raw = bytes.get(idx * NodeId::SIZE..(idx + 1) * NodeId::SIZE)?;
  NodeId::new(u32::from_ne_bytes(raw.try_into().ok()?))
}

/// Scratch space for one insertion: the predecessor of the new tower on
/// every level it joins, and the cells reserved for it before any link is
/// touched.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
  pub(crate) preds: Stack,
  pub(crate) fresh: Stack,
}

impl Scratch {
  #[inline]
  pub(crate) const fn new() -> Self {
    Self {
      preds: Stack::new(),
      fresh: Stack::new(),
    }
  }

  #[inline]
  pub(crate) fn clear(&mut self) {
    self.preds.clear();
    self.fresh.clear();
  }

  /// Frees every reserved cell that was not wired into a list.
  pub(crate) fn discard<P, A: Allocator>(&mut self, nodes: &mut Nodes<P, A>) {
    while let Some(id) = self.fresh.pop(nodes.allocator()) {
      nodes.free(id);
    }
  }

  /// Gives both stacks' storage back to the allocator behind `nodes`.
  pub(crate) fn release<P, A: Allocator>(&mut self, nodes: &mut Nodes<P, A>) {
    self.clear();
    self.preds.release(nodes.allocator_mut());
    self.fresh.release(nodes.allocator_mut());
  }
}
