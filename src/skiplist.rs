use core::mem;
use std::vec::Vec;

use super::{
  coin::Coin,
  directory::{Directory, Entry},
  list::{Comparators, List},
  node::{ListId, NodeId, Nodes},
  stack::Scratch,
  Allocator, Builder, Comparator, Error, Heap, IndexId, Options,
};

#[cfg(test)]
mod tests;

/// A position inside one index of a [`SkipList`].
///
/// A cursor stays valid until the element it points at is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
  node: NodeId,
}

impl Cursor {
  #[inline]
  const fn new(node: NodeId) -> Self {
    Self { node }
  }
}

/// An ordered multiset with any number of secondary indexes.
///
/// Elements are ordered by the primary comparator, set with
/// [`set_compare`](SkipList::set_compare). Each index added with
/// [`add_index`](SkipList::add_index) keeps the same elements in its own
/// order. Each payload is stored once, the cells of every index refer to it.
/// Payloads are never cloned.
///
/// The list is not synchronized.
pub struct SkipList<T, A = Heap> {
  nodes: Nodes<T, A>,
  primary: List<T>,
  primary_index: Option<IndexId>,
  secondaries: Vec<List<T>>,
  directory: Directory<A>,
  scratch: Scratch,
  coin: Coin,
}

impl<T: core::fmt::Debug, A: Allocator> core::fmt::Debug for SkipList<T, A> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_list().entries(self.iter()).finish()
  }
}

impl<T> SkipList<T> {
  /// Creates an empty heap-backed list with default [`Options`].
  #[inline]
  pub fn new() -> Self {
    Builder::new().build()
  }
}

impl<T> Default for SkipList<T> {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<T, A: Allocator> SkipList<T, A> {
  pub(crate) fn with_options(alloc: A, opts: Options) -> Self {
    Self {
      directory: Directory::new(alloc.fork()),
      nodes: Nodes::new(alloc),
      primary: List::new(ListId::PRIMARY, None, opts.preheight),
      primary_index: None,
      secondaries: Vec::new(),
      scratch: Scratch::new(),
      coin: Coin::new(opts.seed),
    }
  }

  /// Returns the allocator the elements' cells come from.
  #[inline]
  pub fn allocator(&self) -> &A {
    self.nodes.allocator()
  }

  /// Returns the number of elements.
  #[inline]
  pub fn len(&self) -> usize {
    self.primary.len()
  }

  /// Returns `true` if the list holds no element.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.primary.is_empty()
  }

  /// Returns the number of elements reachable through `index`, `None` if no
  /// such index is registered.
  #[inline]
  pub fn len_by(&self, index: IndexId) -> Option<usize> {
    self.resolve(index).map(List::len)
  }

  /// Returns the number of registered secondary indexes.
  #[inline]
  pub fn indexes(&self) -> usize {
    self.directory.len()
  }

  /// Returns the number of levels of the primary list, `0` before the first
  /// insertion and after [`remove_all`](SkipList::remove_all).
  #[inline]
  pub fn height(&self) -> usize {
    self.primary.height()
  }

  /// Returns the fixed tower height bound, `0` when towers grow freely.
  #[inline]
  pub fn preheight(&self) -> usize {
    self.primary.preheight()
  }

  /// Bounds every tower drawn from now on to `1..=preheight`.
  ///
  /// `0` restores the default, where a tower is at most one level taller
  /// than the list it joins.
  #[inline]
  pub fn set_preheight(&mut self, preheight: usize) {
    self.primary.set_preheight(preheight);
  }

  fn list(&self, id: ListId) -> Option<&List<T>> {
    match id.slot() {
      None => Some(&self.primary),
      Some(slot) => self.secondaries.get(slot),
    }
  }

  fn resolve(&self, index: IndexId) -> Option<&List<T>> {
    if self.primary_index == Some(index) || self.secondaries.is_empty() {
      return Some(&self.primary);
    }
    self.directory.find(index).and_then(|id| self.list(id))
  }

  /// Returns the element equal to `key` in the primary order.
  pub fn find(&self, key: &T) -> Option<&T> {
    self
      .find_cursor(key)
      .and_then(|cursor| self.nodes.payload(cursor.node))
  }

  /// Returns the element equal to `key` in the order of `index`.
  pub fn find_by(&self, index: IndexId, key: &T) -> Option<&T> {
    self
      .find_cursor_by(index, key)
      .and_then(|cursor| self.nodes.payload(cursor.node))
  }

  /// Returns a cursor at the element equal to `key` in the primary order.
  pub fn find_cursor(&self, key: &T) -> Option<Cursor> {
    self.primary.search(&self.nodes, key, None).map(Cursor::new)
  }

  /// Returns a cursor at the element equal to `key` in the order of `index`.
  ///
  /// Advancing the cursor walks that order.
  pub fn find_cursor_by(&self, index: IndexId, key: &T) -> Option<Cursor> {
    self
      .resolve(index)?
      .search(&self.nodes, key, None)
      .map(Cursor::new)
  }

  /// Returns a cursor at the first element of the primary order.
  #[inline]
  pub fn cursor(&self) -> Option<Cursor> {
    self.primary.first(&self.nodes).map(Cursor::new)
  }

  /// Returns a cursor at the first element in the order of `index`.
  #[inline]
  pub fn cursor_by(&self, index: IndexId) -> Option<Cursor> {
    self.resolve(index)?.first(&self.nodes).map(Cursor::new)
  }

  /// Returns the element under `cursor`.
  #[inline]
  pub fn get(&self, cursor: &Cursor) -> Option<&T> {
    self.nodes.payload(cursor.node)
  }

  /// Moves `cursor` to the following element and returns it.
  ///
  /// At the last element `None` is returned and the cursor does not move.
  pub fn next(&self, cursor: &mut Cursor) -> Option<&T> {
    let next = self.nodes.get(cursor.node)?.next?;
    let data = self.nodes.payload(next)?;
    cursor.node = next;
    Some(data)
  }

  /// Moves `cursor` to the preceding element and returns it.
  ///
  /// At the first element `None` is returned and the cursor does not move.
  pub fn previous(&self, cursor: &mut Cursor) -> Option<&T> {
    let prev = self.nodes.get(cursor.node)?.prev?;
    let data = self.nodes.payload(prev)?;
    cursor.node = prev;
    Some(data)
  }

  /// Returns the first element of the primary order.
  #[inline]
  pub fn peek(&self) -> Option<&T> {
    self
      .primary
      .first(&self.nodes)
      .and_then(|id| self.nodes.payload(id))
  }

  /// Returns the last element of the primary order.
  #[inline]
  pub fn peek_last(&self) -> Option<&T> {
    self
      .primary
      .last(&self.nodes)
      .and_then(|id| self.nodes.payload(id))
  }

  /// Returns an iterator over the elements in primary order.
  #[inline]
  pub fn iter(&self) -> Iter<'_, T, A> {
    Iter::new(&self.nodes, &self.primary)
  }

  /// Returns an iterator over the elements in the order of `index`, `None`
  /// if no such index is registered.
  #[inline]
  pub fn iter_by(&self, index: IndexId) -> Option<Iter<'_, T, A>> {
    self.resolve(index).map(|list| Iter::new(&self.nodes, list))
  }

  /// Removes the element equal to `key` in the primary order from every
  /// index and returns it.
  ///
  /// Among equal elements the first one is removed.
  pub fn remove(&mut self, key: &T) -> Option<T> {
    let found = self.primary.search(&self.nodes, key, None)?;
    self.remove_node(found)
  }

  /// Removes the element equal to `key` in the order of `index` from every
  /// index and returns it.
  pub fn remove_by(&mut self, index: IndexId, key: &T) -> Option<T> {
    let found = self.resolve(index)?.search(&self.nodes, key, None)?;
    self.remove_node(found)
  }

  /// Removes the element under `cursor` from every index and returns it.
  pub fn remove_at(&mut self, cursor: Cursor) -> Option<T> {
    self.nodes.payload(cursor.node)?;
    self.remove_node(cursor.node)
  }

  /// Removes the first element of the primary order and returns it.
  pub fn pop(&mut self) -> Option<T> {
    let first = self.primary.first(&self.nodes)?;
    self.remove_node(first)
  }

  /// Removes every element. Registered indexes stay registered.
  #[inline]
  pub fn remove_all(&mut self) {
    self.remove_all_with(drop)
  }

  /// Removes every element, handing each one to `f` exactly once.
  pub fn remove_all_with(&mut self, mut f: impl FnMut(T)) {
    for list in self.secondaries.iter_mut() {
      list.remove_all(&mut self.nodes, |_, _| {});
    }
    self.primary.remove_all(&mut self.nodes, |nodes, elem| {
      if let Some(data) = nodes.take(elem) {
        f(data);
      }
    });
  }

  /// Tears the list down, handing each element to `f` exactly once.
  pub fn destroy(mut self, f: impl FnMut(T)) {
    self.remove_all_with(f);
    self.scratch.release(&mut self.nodes);
    self.directory.clear();
  }

  /// Unlinks the element whose bottom cell in some index is `found` from
  /// every index, following its index chain.
  fn remove_node(&mut self, found: NodeId) -> Option<T> {
    let mut head = found;
    while let Some(prev) = self.nodes[head].prev_index {
      head = prev;
    }
    debug_assert_eq!(self.nodes[head].list, ListId::PRIMARY);

    let mut cur = self.nodes[head].next_index;
    while let Some(m) = cur {
      cur = self.nodes[m].next_index;
      let slot = self.nodes[m].list.slot();
      if let Some(list) = slot.and_then(|slot| self.secondaries.get_mut(slot)) {
        list.unlink(&mut self.nodes, m);
      }
    }
    let elem = self.primary.unlink(&mut self.nodes, head)?;
    self.nodes.take(elem)
  }

  /// Sets the primary ordering on the first call. Later calls register a
  /// secondary index, see [`add_index`](SkipList::add_index).
  ///
  /// `compare` places new elements, `compare_key` finds existing ones.
  /// Returns `Ok(false)` if `index` is already in use.
  pub fn set_compare<C, K>(&mut self, index: IndexId, compare: C, compare_key: K) -> Result<bool, Error>
  where
    C: Comparator<T> + 'static,
    K: Comparator<T> + 'static,
  {
    if self.primary.is_ordered() {
      return self.add_index(index, compare, compare_key);
    }
    if self.directory.find(index).is_some() {
      return Ok(false);
    }

    self
      .primary
      .set_comparators(Comparators::new(compare, compare_key));
    self.primary_index = Some(index);
    Ok(true)
  }

  /// Registers a secondary index and fills it with every element already in
  /// the list.
  ///
  /// Returns `Ok(false)` and changes nothing if `index` is already in use. If
  /// filling the index fails, the index is dropped again and the error is
  /// returned.
  pub fn add_index<C, K>(&mut self, index: IndexId, compare: C, compare_key: K) -> Result<bool, Error>
  where
    C: Comparator<T> + 'static,
    K: Comparator<T> + 'static,
  {
    if self.primary_index == Some(index) || self.directory.find(index).is_some() {
      return Ok(false);
    }

    self.secondaries.try_reserve(1)?;
    let slot = self.secondaries.len();
    let entry = Entry {
      id: index,
      list: ListId::secondary(slot),
    };
    let Some(position) = self.directory.register(entry, &mut self.coin)? else {
      return Ok(false);
    };
    self.secondaries.push(List::new(
      entry.list,
      Some(Comparators::new(compare, compare_key)),
      0,
    ));

    if let Err(e) = self.fill_index(slot, position) {
      #[cfg(feature = "tracing")]
      tracing::warn!(index = %index, err = %e, "failed to build secondary index");

      self.drop_index(index, slot);
      return Err(e);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(index = %index, len = self.len(), "built secondary index");
    Ok(true)
  }

  /// Adds every primary element to the secondary list in `slot` and splices
  /// the new cells into the index chains, `position` links after the
  /// primary cell.
  fn fill_index(&mut self, slot: usize, position: usize) -> Result<(), Error> {
    let Self {
      nodes,
      primary,
      secondaries,
      scratch,
      coin,
      ..
    } = self;
    let Some(list) = secondaries.get_mut(slot) else {
      return Ok(());
    };

    let mut cur = primary.first(nodes);
    while let Some(head) = cur {
      cur = nodes[head].next;
      let Some(elem) = nodes[head].elem else {
        continue;
      };
      let Some(node) = list.insert(nodes, scratch, coin, elem, None, true)? else {
        continue;
      };

      let mut at = head;
      for _ in 0..position {
        match nodes[at].next_index {
          Some(next) => at = next,
          None => break,
        }
      }
      nodes.splice_after(at, node);
    }
    Ok(())
  }

  fn drop_index(&mut self, index: IndexId, slot: usize) {
    if let Some(list) = self.secondaries.get(slot) {
      let mut cur = list.first(&self.nodes);
      while let Some(m) = cur {
        cur = self.nodes[m].next;
        self.nodes.unsplice(m);
      }
    }
    if let Some(mut list) = self.secondaries.pop() {
      list.remove_all(&mut self.nodes, |_, _| {});
    }
    self.directory.unregister(index);
  }

  /// Inserts `data` unless an equal element is present.
  ///
  /// Returns a cursor at the new element, `None` if it was rejected.
  #[inline]
  pub fn insert(&mut self, data: T) -> Result<Option<Cursor>, Error> {
    self.insert_in(data, None, false)
  }

  /// Inserts `data` after every equal element.
  #[inline]
  pub fn add(&mut self, data: T) -> Result<Cursor, Error> {
    self
      .insert_in(data, None, true)
      .and_then(|cursor| cursor.ok_or(Error::NoComparator))
  }

  /// Like [`insert`](SkipList::insert), placing `data` in the primary list
  /// with `compare`. `compare` must agree with the primary ordering.
  #[inline]
  pub fn insert_compare(&mut self, data: T, compare: &dyn Comparator<T>) -> Result<Option<Cursor>, Error> {
    self.insert_in(data, Some(compare), false)
  }

  /// Like [`add`](SkipList::add), placing `data` in the primary list with
  /// `compare`. `compare` must agree with the primary ordering.
  #[inline]
  pub fn add_compare(&mut self, data: T, compare: &dyn Comparator<T>) -> Result<Cursor, Error> {
    self
      .insert_in(data, Some(compare), true)
      .and_then(|cursor| cursor.ok_or(Error::NoComparator))
  }

  fn insert_in(
    &mut self,
    data: T,
    compare: Option<&dyn Comparator<T>>,
    add: bool,
  ) -> Result<Option<Cursor>, Error> {
    self.place(data, compare, add).map_err(|(e, _)| e)
  }

  /// Stores `data` and links it into every index. On failure nothing is
  /// linked and `data` is handed back with the error when it still exists.
  fn place(
    &mut self,
    data: T,
    compare: Option<&dyn Comparator<T>>,
    add: bool,
  ) -> Result<Option<Cursor>, (Error, Option<T>)> {
    if compare.is_none() && !self.primary.is_ordered() {
      return Err((Error::NoComparator, Some(data)));
    }

    let elem = self.nodes.store(data).map_err(|(e, data)| (e, Some(data)))?;
    let unrooted = self.primary.height() == 0;
    let head = match self.primary.insert(
      &mut self.nodes,
      &mut self.scratch,
      &mut self.coin,
      elem,
      compare,
      add,
    ) {
      Ok(Some(head)) => head,
      Ok(None) => {
        self.nodes.take(elem);
        return Ok(None);
      }
      Err(e) => return Err((e, self.nodes.take(elem))),
    };

    if let Err(e) = self.propagate(head) {
      #[cfg(feature = "tracing")]
      tracing::warn!(err = %e, "rolled back insertion");

      let data = self.remove_node(head);
      if unrooted {
        self.remove_all();
      }
      return Err((e, data));
    }
    Ok(Some(Cursor::new(head)))
  }

  /// Adds the payload of the primary cell `head` to every secondary index in
  /// id order, chaining the new cells behind `head`.
  fn propagate(&mut self, head: NodeId) -> Result<(), Error> {
    let Self {
      nodes,
      secondaries,
      directory,
      scratch,
      coin,
      ..
    } = self;

    let mut prev = head;
    for entry in directory.entries() {
      let Some(list) = entry.list.slot().and_then(|slot| secondaries.get_mut(slot)) else {
        continue;
      };
      let Some(elem) = nodes[head].elem else {
        break;
      };
      if let Some(node) = list.insert(nodes, scratch, coin, elem, None, true)? {
        nodes.splice_after(prev, node);
        prev = node;
      }
    }
    Ok(())
  }

  /// Moves every element of `other` into `self`, leaving `other` empty and
  /// reusable.
  ///
  /// When `self` is empty the two lists trade places wholesale, comparators
  /// and indexes included. Otherwise each element of `other` is added to
  /// `self`, moving the payload without cloning it. On error the elements
  /// moved so far stay in `self`, the element that failed and every one
  /// after it stay in `other`.
  pub fn merge(&mut self, other: &mut Self) -> Result<(), Error> {
    if other.is_empty() {
      other.remove_all();
      return Ok(());
    }

    if self.is_empty() {
      #[cfg(feature = "tracing")]
      tracing::debug!(len = other.len(), "merging into empty list by swap");

      self.remove_all();
      mem::swap(self, other);
      return Ok(());
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(into = self.len(), from = other.len(), "merging by insertion");

    while let Some(head) = other.primary.first(&other.nodes) {
      let Some(elem) = other.nodes[head].elem else {
        break;
      };
      let Some(data) = other.nodes.detach(elem) else {
        other.remove_node(head);
        continue;
      };

      match self.place(data, None, true) {
        Ok(_) => {
          other.remove_node(head);
        }
        Err((e, data)) => {
          match data {
            Some(data) => other.nodes.attach(elem, data),
            None => {
              other.remove_node(head);
            }
          }
          return Err(e);
        }
      }
    }
    other.remove_all();
    Ok(())
  }
}

impl<'a, T, A: Allocator> IntoIterator for &'a SkipList<T, A> {
  type Item = &'a T;
  type IntoIter = Iter<'a, T, A>;

  #[inline]
  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

/// An iterator over the elements of one index of a [`SkipList`].
pub struct Iter<'a, T, A = Heap> {
  nodes: &'a Nodes<T, A>,
  next: Option<NodeId>,
  remaining: usize,
}

impl<'a, T, A: Allocator> Iter<'a, T, A> {
  #[inline]
  fn new(nodes: &'a Nodes<T, A>, list: &List<T>) -> Self {
    Self {
      nodes,
      next: list.first(nodes),
      remaining: list.len(),
    }
  }
}

impl<'a, T, A: Allocator> Iterator for Iter<'a, T, A> {
  type Item = &'a T;

  fn next(&mut self) -> Option<Self::Item> {
    let nodes = self.nodes;
    let id = self.next?;
    self.next = nodes[id].next;
    self.remaining = self.remaining.saturating_sub(1);
    nodes.payload(id)
  }

  #[inline]
  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<T, A: Allocator> ExactSizeIterator for Iter<'_, T, A> {}

impl<T, A: Allocator> core::iter::FusedIterator for Iter<'_, T, A> {}
