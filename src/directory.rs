use core::cmp::Ordering;

use super::{
  coin::Coin,
  list::{Comparators, List},
  node::{ListId, NodeId, Nodes},
  stack::Scratch,
  Allocator, Error,
};

/// Identifies one ordering of a [`SkipList`](crate::SkipList).
///
/// Two registrations are the same index only when they carry the same id,
/// the comparators themselves are never compared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(u64);

impl IndexId {
  /// Creates a new index id.
  #[inline]
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  /// Returns the raw id.
  #[inline]
  pub const fn get(&self) -> u64 {
    self.0
  }
}

impl From<u64> for IndexId {
  #[inline]
  fn from(id: u64) -> Self {
    Self(id)
  }
}

impl core::fmt::Display for IndexId {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "index#{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry {
  pub(crate) id: IndexId,
  pub(crate) list: ListId,
}

fn by_id(a: &Entry, b: &Entry) -> Ordering {
  a.id.cmp(&b.id)
}

/// Maps an [`IndexId`] to the secondary list registered under it.
///
/// The directory is itself a skiplist of entries ordered by id, living in its
/// own node table.
#[derive(Debug)]
pub(crate) struct Directory<A> {
  list: List<Entry>,
  nodes: Nodes<Entry, A>,
  scratch: Scratch,
}

impl<A: Allocator> Directory<A> {
  pub(crate) fn new(alloc: A) -> Self {
    Self {
      list: List::new(ListId::PRIMARY, Some(Comparators::new(by_id, by_id)), 0),
      nodes: Nodes::new(alloc),
      scratch: Scratch::new(),
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.list.len()
  }

  #[cfg(test)]
  pub(crate) fn allocator(&self) -> &A {
    self.nodes.allocator()
  }

  fn locate(&self, id: IndexId) -> Option<NodeId> {
    let key = Entry {
      id,
      list: ListId::PRIMARY,
    };
    self.list.search(&self.nodes, &key, None)
  }

  /// Returns the list registered under `id`.
  pub(crate) fn find(&self, id: IndexId) -> Option<ListId> {
    self
      .locate(id)
      .and_then(|node| self.nodes.payload(node))
      .map(|entry| entry.list)
  }

  /// Registers `entry` and returns its position in id order, `None` if the
  /// id is taken.
  pub(crate) fn register(&mut self, entry: Entry, coin: &mut Coin) -> Result<Option<usize>, Error> {
    let elem = self.nodes.store(entry).map_err(|(e, _)| e)?;
    match self
      .list
      .insert(&mut self.nodes, &mut self.scratch, coin, elem, None, false)
    {
      Ok(Some(node)) => Ok(Some(self.list.position(&self.nodes, node))),
      res => {
        self.nodes.take(elem);
        res.map(|_| None)
      }
    }
  }

  /// Forgets the list registered under `id`.
  pub(crate) fn unregister(&mut self, id: IndexId) -> Option<ListId> {
    let node = self.locate(id)?;
    let elem = self.list.unlink(&mut self.nodes, node)?;
    self.nodes.take(elem).map(|entry| entry.list)
  }

  /// Returns the registered entries in id order.
  pub(crate) fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
    let mut cur = self.list.first(&self.nodes);
    core::iter::from_fn(move || {
      let id = cur?;
      cur = self.nodes[id].next;
      self.nodes.payload(id).copied()
    })
  }

  /// Drops every entry and gives the scratch space back.
  pub(crate) fn clear(&mut self) {
    self.list.remove_all(&mut self.nodes, |nodes, elem| {
      nodes.take(elem);
    });
    self.scratch.release(&mut self.nodes);
  }
}
