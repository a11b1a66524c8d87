use core::{
  mem,
  num::NonZeroU32,
  ops::{Index, IndexMut},
};
use std::vec::Vec;

use super::{allocator::sealed::Sealed as _, Allocator, Chunk, Error};

/// Address of a cell in a [`Nodes`] table: the id of the chunk holding it,
/// plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub(crate) struct NodeId(NonZeroU32);

impl NodeId {
  pub(crate) const SIZE: usize = mem::size_of::<Self>();

  #[cfg(test)]
  pub(crate) const fn from_raw(raw: u32) -> Self {
    match NonZeroU32::new(raw + 1) {
      Some(n) => Self(n),
      None => panic!("node id overflow"),
    }
  }

  #[inline]
  pub(crate) fn new(raw: u32) -> Option<Self> {
    NonZeroU32::new(raw).map(Self)
  }

  #[inline]
  fn from_chunk(chunk: Chunk) -> Option<Self> {
    chunk.id().checked_add(1).and_then(Self::new)
  }

  #[inline]
  pub(crate) const fn get(self) -> u32 {
    self.0.get()
  }

  #[inline]
  fn chunk(self) -> Chunk {
    Chunk::new(self.0.get() - 1, Node::SIZE)
  }
}

/// Slot of a payload in the element table, plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub(crate) struct ElemId(NonZeroU32);

impl ElemId {
  #[inline]
  const fn index(self) -> usize {
    self.0.get() as usize - 1
  }
}

/// Which list of a node table a cell belongs to.
///
/// `0` is the primary list, secondary index `n` lives in list `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub(crate) struct ListId(u32);

impl ListId {
  pub(crate) const PRIMARY: Self = Self(0);

  #[inline]
  pub(crate) fn secondary(slot: usize) -> Self {
    Self(slot as u32 + 1)
  }

  /// Returns the slot of a secondary list, `None` for the primary.
  #[inline]
  pub(crate) const fn slot(self) -> Option<usize> {
    match self.0 {
      0 => None,
      n => Some(n as usize - 1),
    }
  }
}

/// One cell of a tower, stored in a chunk of the table's allocator.
///
/// Sentinels carry no element. Every other cell of a tower refers to the
/// same element of the table, the payload itself is stored once.
///
/// Every field is a `u32` or an `Option` of a non-zero `u32`, so any
/// initialized byte pattern is a valid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub(crate) struct Node {
  pub(crate) elem: Option<ElemId>,
  pub(crate) next: Option<NodeId>,
  pub(crate) prev: Option<NodeId>,
  pub(crate) up: Option<NodeId>,
  pub(crate) down: Option<NodeId>,
  /// Counterpart of this element in the next index of the chain.
  pub(crate) next_index: Option<NodeId>,
  /// Counterpart of this element in the previous index of the chain.
  pub(crate) prev_index: Option<NodeId>,
  pub(crate) list: ListId,
}

const _: () = assert!(mem::align_of::<Node>() <= crate::arena::CHUNK_ALIGN);
const _: () = assert!(mem::size_of::<Node>() == 8 * mem::size_of::<u32>());

impl Node {
  pub(crate) const SIZE: usize = mem::size_of::<Self>();

  #[inline]
  pub(crate) const fn sentinel(list: ListId) -> Self {
    Self {
      elem: None,
      next: None,
      prev: None,
      up: None,
      down: None,
      next_index: None,
      prev_index: None,
      list,
    }
  }

  #[inline]
  fn fits(bytes: &[u8]) -> bool {
    bytes.len() >= Self::SIZE && bytes.as_ptr().align_offset(mem::align_of::<Self>()) == 0
  }

  fn from_bytes(bytes: &[u8]) -> Option<&Self> {
    // Safety: the chunk is large enough and aligned, and every initialized
    // byte pattern is a valid `Node`.
    Self::fits(bytes).then(|| unsafe { &*bytes.as_ptr().cast::<Self>() })
  }

  fn from_bytes_mut(bytes: &mut [u8]) -> Option<&mut Self> {
    // Safety: same as `from_bytes`, the chunk is borrowed mutably.
    Self::fits(bytes).then(|| unsafe { &mut *bytes.as_mut_ptr().cast::<Self>() })
  }
}

/// The cells of every list sharing one allocator, addressed by [`NodeId`],
/// and the elements those cells refer to.
#[derive(Debug)]
pub(crate) struct Nodes<P, A> {
  alloc: A,
  elems: Vec<Option<P>>,
  vacant: Vec<ElemId>,
  live: usize,
}

impl<P, A: Allocator> Nodes<P, A> {
  #[inline]
  pub(crate) const fn new(alloc: A) -> Self {
    Self {
      alloc,
      elems: Vec::new(),
      vacant: Vec::new(),
      live: 0,
    }
  }

  #[inline]
  pub(crate) const fn allocator(&self) -> &A {
    &self.alloc
  }

  #[inline]
  pub(crate) fn allocator_mut(&mut self) -> &mut A {
    &mut self.alloc
  }

  /// Returns the number of cells currently stored, sentinels included.
  #[cfg(test)]
  #[inline]
  pub(crate) const fn live(&self) -> usize {
    self.live
  }

  /// Returns the number of elements currently stored.
  #[cfg(test)]
  #[inline]
  pub(crate) fn elements(&self) -> usize {
    self.elems.len() - self.vacant.len()
  }

  /// Writes a cell into a freshly allocated chunk.
  pub(crate) fn alloc(&mut self, node: Node) -> Result<NodeId, Error> {
    let chunk = self.alloc.alloc(Node::SIZE)?;
    let Some(id) = NodeId::from_chunk(chunk) else {
      self.alloc.dealloc(chunk);
      return Err(Error::Exhausted);
    };

    match self.alloc.bytes_mut(chunk).and_then(Node::from_bytes_mut) {
      Some(cell) => *cell = node,
      None => {
        self.alloc.dealloc(chunk);
        return Err(Error::Exhausted);
      }
    }
    self.live += 1;
    Ok(id)
  }

  /// Releases a cell and its chunk, returning the element it referred to.
  ///
  /// The element itself stays in the table.
  pub(crate) fn free(&mut self, id: NodeId) -> Option<ElemId> {
    let elem = self.get(id)?.elem;
    self.alloc.dealloc(id.chunk());
    debug_assert!(self.live > 0);
    self.live -= 1;
    elem
  }

  #[inline]
  pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
    self.alloc.bytes(id.chunk()).and_then(Node::from_bytes)
  }

  #[inline]
  fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
    self.alloc.bytes_mut(id.chunk()).and_then(Node::from_bytes_mut)
  }

  /// Returns the payload of a cell, `None` for sentinels and stale ids.
  #[inline]
  pub(crate) fn payload(&self, id: NodeId) -> Option<&P> {
    self.get(id)?.elem.and_then(|elem| self.element(elem))
  }

  /// Puts `id` into the index chain right after `at`.
  pub(crate) fn splice_after(&mut self, at: NodeId, id: NodeId) {
    let next = self[at].next_index;
    {
      let node = &mut self[id];
      node.prev_index = Some(at);
      node.next_index = next;
    }
    if let Some(next) = next {
      self[next].prev_index = Some(id);
    }
    self[at].next_index = Some(id);
  }

  /// Takes `id` out of its index chain.
  pub(crate) fn unsplice(&mut self, id: NodeId) {
    let (prev, next) = {
      let node = &mut self[id];
      (node.prev_index.take(), node.next_index.take())
    };
    if let Some(prev) = prev {
      self[prev].next_index = next;
    }
    if let Some(next) = next {
      self[next].prev_index = prev;
    }
  }
}

impl<P, A> Nodes<P, A> {
  /// Moves a payload into the element table. The payload is handed back if
  /// the table cannot grow.
  pub(crate) fn store(&mut self, data: P) -> Result<ElemId, (Error, P)> {
    if let Some(elem) = self.vacant.pop() {
      self.elems[elem.index()] = Some(data);
      return Ok(elem);
    }

    let Some(elem) = u32::try_from(self.elems.len() + 1)
      .ok()
      .and_then(NonZeroU32::new)
      .map(ElemId)
    else {
      return Err((Error::Exhausted, data));
    };
    // `take` pushes onto `vacant` and must not fail
    if let Err(e) = self
      .elems
      .try_reserve(1)
      .and_then(|_| self.vacant.try_reserve(self.elems.len() + 1 - self.vacant.len()))
    {
      return Err((e.into(), data));
    }
    self.elems.push(Some(data));
    Ok(elem)
  }

  #[inline]
  pub(crate) fn element(&self, elem: ElemId) -> Option<&P> {
    self.elems.get(elem.index()).and_then(Option::as_ref)
  }

  /// Moves a payload out of the table and frees its slot, which may have
  /// been emptied by [`detach`](Nodes::detach) already.
  ///
  /// Each element is taken once, when the last cell referring to it is
  /// unlinked.
  pub(crate) fn take(&mut self, elem: ElemId) -> Option<P> {
    let data = self.elems.get_mut(elem.index())?.take();
    self.vacant.push(elem);
    data
  }

  /// Moves a payload out of the table and keeps its slot reserved for
  /// [`attach`](Nodes::attach).
  pub(crate) fn detach(&mut self, elem: ElemId) -> Option<P> {
    self.elems.get_mut(elem.index())?.take()
  }

  /// Puts a payload back into a slot emptied by [`detach`](Nodes::detach).
  pub(crate) fn attach(&mut self, elem: ElemId, data: P) {
    if let Some(slot) = self.elems.get_mut(elem.index()) {
      debug_assert!(slot.is_none());
      *slot = Some(data);
    }
  }
}

impl<P, A: Allocator> Index<NodeId> for Nodes<P, A> {
  type Output = Node;

  #[inline]
  fn index(&self, id: NodeId) -> &Node {
    match self.get(id) {
      Some(node) => node,
      None => panic!("dangling node id {}", id.get()),
    }
  }
}

impl<P, A: Allocator> IndexMut<NodeId> for Nodes<P, A> {
  #[inline]
  fn index_mut(&mut self, id: NodeId) -> &mut Node {
    match self.get_mut(id) {
      Some(node) => node,
      None => panic!("dangling node id {}", id.get()),
    }
  }
}
