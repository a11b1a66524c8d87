use core::cmp::Ordering;
use std::boxed::Box;

use super::{
  coin::Coin,
  node::{ElemId, ListId, Node, NodeId, Nodes},
  stack::Scratch,
  Allocator, Comparator, Error,
};

/// The orderings of one list: `compare` places new elements, `compare_key`
/// finds existing ones.
pub(crate) struct Comparators<P> {
  pub(crate) compare: Box<dyn Comparator<P>>,
  pub(crate) compare_key: Box<dyn Comparator<P>>,
}

impl<P> Comparators<P> {
  pub(crate) fn new<C, K>(compare: C, compare_key: K) -> Self
  where
    C: Comparator<P> + 'static,
    K: Comparator<P> + 'static,
  {
    Self {
      compare: Box::new(compare),
      compare_key: Box::new(compare_key),
    }
  }
}

/// One skiplist living in a [`Nodes`] table.
///
/// Every row starts with a sentinel, the sentinels of all rows form one
/// tower whose top is `top` and whose bottom is `bottom`. Rows end at the
/// last real cell, there is no right sentinel.
pub(crate) struct List<P> {
  id: ListId,
  comparators: Option<Comparators<P>>,
  height: usize,
  preheight: usize,
  len: usize,
  top: Option<NodeId>,
  bottom: Option<NodeId>,
}

impl<P> core::fmt::Debug for List<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("List")
      .field("id", &self.id)
      .field("ordered", &self.comparators.is_some())
      .field("height", &self.height)
      .field("preheight", &self.preheight)
      .field("len", &self.len)
      .finish()
  }
}

impl<P> List<P> {
  #[inline]
  pub(crate) const fn new(id: ListId, comparators: Option<Comparators<P>>, preheight: usize) -> Self {
    Self {
      id,
      comparators,
      height: 0,
      preheight,
      len: 0,
      top: None,
      bottom: None,
    }
  }

  #[inline]
  pub(crate) const fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub(crate) const fn is_empty(&self) -> bool {
    self.len == 0
  }

  #[inline]
  pub(crate) const fn height(&self) -> usize {
    self.height
  }

  #[inline]
  pub(crate) const fn preheight(&self) -> usize {
    self.preheight
  }

  #[inline]
  pub(crate) fn set_preheight(&mut self, preheight: usize) {
    self.preheight = preheight;
  }

  #[inline]
  pub(crate) const fn is_ordered(&self) -> bool {
    self.comparators.is_some()
  }

  #[inline]
  pub(crate) fn set_comparators(&mut self, comparators: Comparators<P>) {
    self.comparators = Some(comparators);
  }

  /// Returns the first real cell of the bottom row.
  #[inline]
  pub(crate) fn first<A: Allocator>(&self, nodes: &Nodes<P, A>) -> Option<NodeId> {
    self.bottom.and_then(|bottom| nodes[bottom].next)
  }

  /// Returns the last real cell of the bottom row.
  pub(crate) fn last<A: Allocator>(&self, nodes: &Nodes<P, A>) -> Option<NodeId> {
    let mut cur = self.top?;
    loop {
      let node = &nodes[cur];
      match (node.next, node.down) {
        (Some(next), _) => cur = next,
        (None, Some(down)) => cur = down,
        (None, None) => break,
      }
    }
    nodes[cur].elem.map(|_| cur)
  }

  /// Returns how many real cells precede `id` on the bottom row.
  pub(crate) fn position<A: Allocator>(&self, nodes: &Nodes<P, A>, id: NodeId) -> usize {
    let mut count = 0;
    let mut cur = nodes[id].prev;
    while let Some(prev) = cur {
      if nodes[prev].elem.is_none() {
        break;
      }
      count += 1;
      cur = nodes[prev].prev;
    }
    count
  }

  /// Finds the bottom cell of the first element equal to `key`.
  ///
  /// Uses the key comparator unless `compare` is given.
  pub(crate) fn search<A: Allocator>(
    &self,
    nodes: &Nodes<P, A>,
    key: &P,
    compare: Option<&dyn Comparator<P>>,
  ) -> Option<NodeId> {
    let compare: &dyn Comparator<P> = match compare {
      Some(compare) => compare,
      None => &*self.comparators.as_ref()?.compare_key,
    };

    let mut cur = self.top;
    while let Some(m) = cur {
      let next = nodes[m].next;
      let ord = match next.and_then(|n| nodes.payload(n)) {
        Some(data) => compare.compare(key, data),
        None => Ordering::Less,
      };

      // keep dropping on a match so the leftmost equal element is found
      match (ord, nodes[m].down) {
        (Ordering::Greater, _) => cur = next,
        (_, Some(down)) => cur = Some(down),
        (Ordering::Equal, None) => return next,
        (Ordering::Less, None) => return None,
      }
    }
    None
  }
}

impl<P> List<P> {
  /// Links a tower for the stored element `elem` and returns its bottom
  /// cell, or `None` when `add` is false and an equal element is already
  /// present.
  ///
  /// Either the element is fully linked or the list is left as it was.
  pub(crate) fn insert<A: Allocator>(
    &mut self,
    nodes: &mut Nodes<P, A>,
    scratch: &mut Scratch,
    coin: &mut Coin,
    elem: ElemId,
    compare: Option<&dyn Comparator<P>>,
    add: bool,
  ) -> Result<Option<NodeId>, Error> {
    if compare.is_none() && self.comparators.is_none() {
      return Err(Error::NoComparator);
    }

    let rooted = self.top.is_none();
    if rooted {
      let root = nodes.alloc(Node::sentinel(self.id))?;
      self.top = Some(root);
      self.bottom = Some(root);
      self.height = 1;
    }

    let res = self.insert_rooted(nodes, scratch, coin, elem, compare, add);
    if res.is_err() {
      scratch.discard(nodes);
    }
    scratch.clear();

    if rooted && self.is_empty() {
      self.remove_all(nodes, |_, _| {});
    }
    res
  }

  fn insert_rooted<A: Allocator>(
    &mut self,
    nodes: &mut Nodes<P, A>,
    scratch: &mut Scratch,
    coin: &mut Coin,
    elem: ElemId,
    compare: Option<&dyn Comparator<P>>,
    add: bool,
  ) -> Result<Option<NodeId>, Error> {
    let compare: &dyn Comparator<P> = match compare {
      Some(compare) => compare,
      None => match &self.comparators {
        Some(comparators) => &*comparators.compare,
        None => return Err(Error::NoComparator),
      },
    };

    let nh = coin.height(self.height, self.preheight);

    // Walk down from the top. Rows above `nh` are only passed through, from
    // row `nh` downwards every drop records the cell after which the new
    // tower is spliced on that row.
    let mut ch = self.height;
    let mut cur = self.top;
    while let Some(m) = cur {
      let (next, down) = {
        let node = &nodes[m];
        (node.next, node.down)
      };
      let ord = {
        let Some(data) = nodes.element(elem) else {
          return Ok(None);
        };
        match next.and_then(|n| nodes.payload(n)) {
          Some(other) => compare.compare(data, other),
          None => Ordering::Less,
        }
      };

      match ord {
        Ordering::Equal if !add => return Ok(None),
        Ordering::Less => {
          if ch <= nh {
            scratch.preds.push(nodes.allocator_mut(), m)?;
          }
          cur = down;
          ch -= 1;
        }
        // equal elements keep their order, new duplicates go to the right
        _ => cur = next,
      }
    }

    // reserve every cell up front, a new row needs a sentinel and a cell
    let wanted = scratch.preds.len() + 2 * nh.saturating_sub(self.height);
    for _ in 0..wanted {
      let id = nodes.alloc(Node::sentinel(self.id))?;
      if let Err(e) = scratch.fresh.push(nodes.allocator_mut(), id) {
        nodes.free(id);
        return Err(e);
      }
    }

    let mut below: Option<NodeId> = None;
    let mut bottom = None;
    while let Some(pred) = scratch.preds.pop(nodes.allocator()) {
      let Some(cell) = scratch.fresh.pop(nodes.allocator()) else {
        break;
      };
      let next = nodes[pred].next;
      {
        let node = &mut nodes[cell];
        node.elem = Some(elem);
        node.next = next;
        node.prev = Some(pred);
        node.down = below;
      }
      if let Some(next) = next {
        nodes[next].prev = Some(cell);
      }
      match below {
        Some(below) => nodes[below].up = Some(cell),
        None => bottom = Some(cell),
      }
      nodes[pred].next = Some(cell);
      below = Some(cell);
    }

    while self.height < nh {
      let (Some(sentinel), Some(cell)) = (
        scratch.fresh.pop(nodes.allocator()),
        scratch.fresh.pop(nodes.allocator()),
      ) else {
        break;
      };
      {
        let row = &mut nodes[sentinel];
        row.next = Some(cell);
        row.down = self.top;
      }
      if let Some(top) = self.top {
        nodes[top].up = Some(sentinel);
      }
      self.top = Some(sentinel);

      {
        let node = &mut nodes[cell];
        node.elem = Some(elem);
        node.prev = Some(sentinel);
        node.down = below;
      }
      if let Some(below) = below {
        nodes[below].up = Some(cell);
      }
      below = Some(cell);
      self.height += 1;

      #[cfg(feature = "tracing")]
      tracing::trace!(list = ?self.id, height = self.height, "grew skiplist");
    }

    if bottom.is_some() {
      self.len += 1;
    }
    Ok(bottom)
  }
}

impl<P> List<P> {
  /// Unlinks the tower standing on the bottom cell `id` and returns the
  /// element it referred to, which stays in the table.
  pub(crate) fn unlink<A: Allocator>(&mut self, nodes: &mut Nodes<P, A>, id: NodeId) -> Option<ElemId> {
    let mut cur = id;
    while let Some(up) = nodes[cur].up {
      cur = up;
    }

    let mut payload = None;
    let mut cur = Some(cur);
    while let Some(m) = cur {
      let (prev, next, down) = {
        let node = &nodes[m];
        (node.prev, node.next, node.down)
      };
      if let Some(prev) = prev {
        nodes[prev].next = next;
      }
      if let Some(next) = next {
        nodes[next].prev = prev;
      }

      let elem = nodes.free(m);
      if down.is_none() {
        payload = elem;
      }
      cur = down;
    }

    self.len -= 1;
    self.shrink(nodes);
    payload
  }

  /// Drops empty rows from the top, the bottom row always stays.
  fn shrink<A: Allocator>(&mut self, nodes: &mut Nodes<P, A>) {
    while self.height > 1 {
      let Some(top) = self.top else {
        break;
      };
      if nodes[top].next.is_some() {
        break;
      }

      let down = nodes[top].down;
      nodes.free(top);
      if let Some(down) = down {
        nodes[down].up = None;
      }
      self.top = down;
      self.height -= 1;

      #[cfg(feature = "tracing")]
      tracing::trace!(list = ?self.id, height = self.height, "shrank skiplist");
    }
  }

  /// Frees every cell, sentinels included, handing each element to `free`
  /// once. The list is empty with no rows afterwards.
  pub(crate) fn remove_all<A: Allocator>(
    &mut self,
    nodes: &mut Nodes<P, A>,
    mut free: impl FnMut(&mut Nodes<P, A>, ElemId),
  ) {
    let mut column = self.bottom;
    while let Some(base) = column {
      column = nodes[base].next;

      let mut cell = Some(base);
      while let Some(m) = cell {
        cell = nodes[m].up;
        let elem = nodes.free(m);
        if m == base {
          if let Some(elem) = elem {
            free(nodes, elem);
          }
        }
      }
    }

    self.top = None;
    self.bottom = None;
    self.height = 0;
    self.len = 0;
  }
}
