use super::*;
use crate::{allocator::sealed::Sealed, Arena, Ascend, Chunk, Descend, Pool};
use core::{cell::Cell, cmp::Ordering};
use std::{format, rc::Rc, string::String, vec};

const ARENA_SIZE: u32 = 1 << 20;

const PRIMARY: IndexId = IndexId::new(0);
const BY_REV: IndexId = IndexId::new(1);
const BY_PARITY: IndexId = IndexId::new(2);

fn by_parity(a: &u32, b: &u32) -> Ordering {
  (a % 2).cmp(&(b % 2))
}

fn heap() -> SkipList<u32> {
  Builder::new().with_seed(7).build()
}

fn pool() -> SkipList<u32, Pool> {
  Builder::new().with_seed(7).build_in(Arena::new(ARENA_SIZE).unwrap())
}

/// Walks every element's index chain and checks it visits one cell per
/// list, primary first, secondaries in id order, all holding equal payloads.
fn check_chains<T: PartialEq + core::fmt::Debug, A: Allocator>(l: &SkipList<T, A>) {
  let order: Vec<ListId> = core::iter::once(ListId::PRIMARY)
    .chain(l.directory.entries().map(|e| e.list))
    .collect();

  let mut cur = l.primary.first(&l.nodes);
  while let Some(head) = cur {
    cur = l.nodes[head].next;
    assert_eq!(l.nodes[head].prev_index, None);

    let mut lists = Vec::new();
    let mut at = Some(head);
    while let Some(id) = at {
      let node = &l.nodes[id];
      assert!(node.down.is_none());
      assert_eq!(l.nodes.payload(id), l.nodes.payload(head));
      lists.push(node.list);
      at = node.next_index;
    }
    assert_eq!(lists, order);
  }

  for list in &l.secondaries {
    assert_eq!(list.len(), l.primary.len());
  }
}

fn basic_in<A: Allocator>(mut l: SkipList<u32, A>) {
  assert_eq!(l.height(), 0);
  assert!(l.set_compare(PRIMARY, Ascend, Ascend).unwrap());

  for i in [5, 3, 9, 1, 7] {
    assert!(l.insert(i).unwrap().is_some());
  }
  assert!(l.insert(5).unwrap().is_none());
  assert_eq!(l.len(), 5);
  assert!(l.height() >= 1);
  assert_eq!(l.iter().copied().collect::<Vec<_>>(), [1, 3, 5, 7, 9]);
  assert_eq!(l.find(&7), Some(&7));
  assert_eq!(l.find(&4), None);
  assert_eq!(l.peek(), Some(&1));
  assert_eq!(l.peek_last(), Some(&9));

  assert_eq!(l.remove(&5), Some(5));
  assert_eq!(l.remove(&5), None);
  assert_eq!(l.pop(), Some(1));
  assert_eq!(l.iter().copied().collect::<Vec<_>>(), [3, 7, 9]);
}

#[test]
fn test_basic() {
  basic_in(heap());
}

#[test]
fn test_basic_pool() {
  basic_in(pool());
}

fn secondary_in<A: Allocator>(mut l: SkipList<u32, A>) {
  l.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  assert!(l.set_compare(BY_REV, Descend, Descend).unwrap());
  assert!(l.add_index(BY_PARITY, by_parity, by_parity).unwrap());
  assert!(!l.add_index(BY_REV, Ascend, Ascend).unwrap());
  assert!(!l.add_index(PRIMARY, Ascend, Ascend).unwrap());
  assert_eq!(l.indexes(), 2);

  for i in 0..50 {
    l.insert((i * 7) % 50).unwrap();
  }
  check_chains(&l);

  let rev: Vec<_> = l.iter_by(BY_REV).unwrap().copied().collect();
  assert_eq!(rev, (0..50).rev().collect::<Vec<_>>());

  // equal keys of a secondary keep primary insertion order
  let parity: Vec<_> = l.iter_by(BY_PARITY).unwrap().copied().collect();
  let mut expected: Vec<u32> = (0..50).map(|i| (i * 7) % 50).filter(|v| v % 2 == 0).collect();
  expected.extend((0..50).map(|i| (i * 7) % 50).filter(|v| v % 2 == 1));
  assert_eq!(parity, expected);

  assert_eq!(l.remove_by(BY_PARITY, &1), Some(expected[25]));
  assert_eq!(l.remove_by(BY_REV, &10), Some(10));
  assert_eq!(l.len_by(BY_REV), Some(48));
  assert_eq!(l.len_by(BY_PARITY), Some(48));
  assert_eq!(l.len_by(IndexId::new(99)), None);
  check_chains(&l);

  while l.pop().is_some() {}
  assert_eq!(l.len_by(BY_REV), Some(0));
  assert_eq!(l.iter_by(BY_PARITY).unwrap().len(), 0);
}

#[test]
fn test_secondary() {
  secondary_in(heap());
}

#[test]
fn test_secondary_pool() {
  secondary_in(pool());
}

#[test]
fn test_late_index_splices_in_id_order() {
  let mut l = heap();
  l.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  l.add_index(IndexId::new(30), Descend, Descend).unwrap();
  for i in 0..20 {
    l.add(i % 10).unwrap();
  }

  // lands between the primary and index 30
  l.add_index(IndexId::new(10), by_parity, by_parity).unwrap();
  check_chains(&l);
  // lands after index 30
  l.add_index(IndexId::new(40), Descend, Descend).unwrap();
  check_chains(&l);
  // lands between index 10 and index 30
  l.add_index(IndexId::new(20), Ascend, Ascend).unwrap();
  check_chains(&l);

  l.add(100).unwrap();
  check_chains(&l);
  for i in 0..10 {
    assert_eq!(l.remove_by(IndexId::new(40), &i), Some(i));
  }
  check_chains(&l);
  assert_eq!(l.len(), 11);
}

#[test]
fn test_cursor_walks_its_index() {
  let mut l = heap();
  l.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  l.add_index(BY_REV, Descend, Descend).unwrap();
  for i in 1..=5 {
    l.insert(i).unwrap();
  }

  let mut cur = l.find_cursor_by(BY_REV, &3).unwrap();
  assert_eq!(l.get(&cur), Some(&3));
  assert_eq!(l.next(&mut cur), Some(&2));
  assert_eq!(l.next(&mut cur), Some(&1));
  assert_eq!(l.next(&mut cur), None);
  assert_eq!(l.get(&cur), Some(&1));
  assert_eq!(l.previous(&mut cur), Some(&2));

  let mut first = l.cursor().unwrap();
  assert_eq!(l.previous(&mut first), None);
  assert_eq!(l.get(&first), Some(&1));

  let at = l.find_cursor_by(BY_REV, &4).unwrap();
  assert_eq!(l.remove_at(at), Some(4));
  assert_eq!(l.find(&4), None);
  check_chains(&l);
}

#[test]
fn test_no_comparator() {
  let mut l = heap();
  assert!(matches!(l.insert(1), Err(Error::NoComparator)));
  assert!(matches!(l.add(1), Err(Error::NoComparator)));
  assert_eq!(l.height(), 0);
  assert_eq!(l.nodes.live(), 0);

  // an explicit comparator works without a primary ordering
  let cmp = |a: &u32, b: &u32| a.cmp(b);
  l.insert_compare(2, &cmp).unwrap();
  l.add_compare(1, &cmp).unwrap();
  assert!(l.insert_compare(2, &cmp).unwrap().is_none());
  assert_eq!(l.iter().copied().collect::<Vec<_>>(), [1, 2]);
}

fn insert_compare_in<A: Allocator>(mut l: SkipList<u32, A>) {
  l.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  l.add_index(BY_REV, Descend, Descend).unwrap();
  l.add_index(BY_PARITY, by_parity, by_parity).unwrap();

  // agrees with the primary order but only looks at the tens
  let by_tens = |a: &u32, b: &u32| (a / 10).cmp(&(b / 10));
  for i in [30, 10, 20] {
    assert!(l.insert_compare(i, &by_tens).unwrap().is_some());
  }
  check_chains(&l);

  // a duplicate under the given comparator, not under the primary one
  assert!(l.insert_compare(15, &by_tens).unwrap().is_none());
  assert_eq!(l.len(), 3);
  assert_eq!(l.len_by(BY_REV), Some(3));
  assert_eq!(l.len_by(BY_PARITY), Some(3));
  assert_eq!(l.find(&15), None);
  assert_eq!(l.find_by(BY_REV, &15), None);

  let at = l.add_compare(15, &by_tens).unwrap();
  assert_eq!(l.get(&at), Some(&15));
  assert_eq!(l.len(), 4);
  assert_eq!(l.len_by(BY_REV), Some(4));
  assert_eq!(l.len_by(BY_PARITY), Some(4));
  assert_eq!(l.iter().copied().collect::<Vec<_>>(), [10, 15, 20, 30]);
  assert_eq!(
    l.iter_by(BY_REV).unwrap().copied().collect::<Vec<_>>(),
    [30, 20, 15, 10]
  );
  assert_eq!(l.iter_by(BY_PARITY).unwrap().last(), Some(&15));
  check_chains(&l);

  assert_eq!(l.remove_by(BY_PARITY, &1), Some(15));
  assert_eq!(l.len_by(BY_REV), Some(3));
  check_chains(&l);
}

#[test]
fn test_insert_compare() {
  insert_compare_in(heap());
}

#[test]
fn test_insert_compare_pool() {
  insert_compare_in(pool());
}

#[derive(Debug, Default, PartialEq)]
struct Stats {
  clones: Cell<usize>,
  drops: Cell<usize>,
}

/// Payload that counts its clones and drops.
#[derive(Debug, PartialEq)]
struct Tracked {
  key: u32,
  stats: Rc<Stats>,
}

impl Tracked {
  fn new(key: u32, stats: &Rc<Stats>) -> Self {
    Self {
      key,
      stats: stats.clone(),
    }
  }

  /// A lookup key that is not counted.
  fn key(key: u32) -> Self {
    Self {
      key,
      stats: Rc::default(),
    }
  }
}

impl Clone for Tracked {
  fn clone(&self) -> Self {
    self.stats.clones.set(self.stats.clones.get() + 1);
    Self::new(self.key, &self.stats)
  }
}

impl Drop for Tracked {
  fn drop(&mut self) {
    self.stats.drops.set(self.stats.drops.get() + 1);
  }
}

fn by_key(a: &Tracked, b: &Tracked) -> Ordering {
  a.key.cmp(&b.key)
}

fn by_key_rev(a: &Tracked, b: &Tracked) -> Ordering {
  b.key.cmp(&a.key)
}

fn by_key_parity(a: &Tracked, b: &Tracked) -> Ordering {
  (a.key % 2).cmp(&(b.key % 2))
}

fn payloads_stored_once_in<A: Allocator>(mut l: SkipList<Tracked, A>, mut other: SkipList<Tracked, A>) {
  let stats = Rc::new(Stats::default());
  l.set_compare(PRIMARY, by_key, by_key).unwrap();
  l.add_index(BY_REV, by_key_rev, by_key_rev).unwrap();
  l.add_index(BY_PARITY, by_key_parity, by_key_parity).unwrap();

  for i in 0..1000 {
    l.insert(Tracked::new(i, &stats)).unwrap();
  }
  assert!(l.height() > 1);
  assert_eq!(stats.clones.get(), 0);
  assert_eq!(stats.drops.get(), 0);

  // a rejected duplicate is dropped once
  assert!(l.insert(Tracked::new(5, &stats)).unwrap().is_none());
  assert_eq!(stats.drops.get(), 1);

  // filling a late index shares the stored payloads
  l.add_index(IndexId::new(3), by_key, by_key).unwrap();
  assert_eq!(stats.clones.get(), 0);
  check_chains(&l);

  for i in 0..50 {
    let removed = l.remove(&Tracked::key(i)).unwrap();
    assert_eq!(removed.key, i);
  }
  for i in 950..1000 {
    assert!(l.remove_by(BY_REV, &Tracked::key(i)).is_some());
  }
  assert_eq!(stats.drops.get(), 101);

  other.set_compare(PRIMARY, by_key, by_key).unwrap();
  for i in 2000..2100 {
    other.insert(Tracked::new(i, &stats)).unwrap();
  }
  l.merge(&mut other).unwrap();
  assert!(other.is_empty());
  assert_eq!(l.len(), 1000);
  assert_eq!(l.len_by(IndexId::new(3)), Some(1000));
  assert_eq!(stats.clones.get(), 0);
  assert_eq!(stats.drops.get(), 101);
  check_chains(&l);

  let mut freed = 0;
  l.remove_all_with(|t| {
    assert!(Rc::ptr_eq(&t.stats, &stats));
    freed += 1;
  });
  assert_eq!(freed, 1000);
  assert_eq!(stats.drops.get(), 1101);

  for i in 0..10 {
    l.add(Tracked::new(i, &stats)).unwrap();
  }
  drop(l);
  assert_eq!(stats.drops.get(), 1111);
  assert_eq!(stats.clones.get(), 0);
}

#[test]
fn test_payloads_stored_once() {
  payloads_stored_once_in(Builder::new().with_seed(11).build(), Builder::new().build());
}

#[test]
fn test_payloads_stored_once_pool() {
  let arena = Arena::new(ARENA_SIZE).unwrap();
  payloads_stored_once_in(
    Builder::new().with_seed(11).build_in(arena.clone()),
    Builder::new().build_in(arena),
  );
}

#[test]
fn test_set_compare_rejects_secondary_id() {
  let mut l = heap();
  assert!(l.add_index(BY_REV, Descend, Descend).unwrap());
  assert!(!l.set_compare(BY_REV, Ascend, Ascend).unwrap());
  assert!(matches!(l.insert(1), Err(Error::NoComparator)));
  assert_eq!(l.indexes(), 1);

  assert!(l.set_compare(PRIMARY, Ascend, Ascend).unwrap());
  for i in 0..5 {
    l.insert(i).unwrap();
  }
  assert_eq!(l.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
  assert_eq!(
    l.iter_by(BY_REV).unwrap().copied().collect::<Vec<_>>(),
    [4, 3, 2, 1, 0]
  );
  check_chains(&l);
}

#[test]
fn test_failed_propagation_rolls_back() {
  let arena = Arena::new(8 << 10).unwrap();
  let mut l: SkipList<u32, Pool> = Builder::new().with_seed(3).build_in(arena.clone());
  l.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  l.add_index(BY_REV, Descend, Descend).unwrap();

  let mut i = 0;
  loop {
    let len = l.len();
    let height = l.height();
    let live = l.nodes.live();
    match l.insert(i) {
      Ok(_) => i += 1,
      Err(e) => {
        assert!(matches!(e, Error::Arena(_)));
        assert_eq!(l.len(), len);
        assert_eq!(l.height(), height);
        assert_eq!(l.nodes.live(), live);
        break;
      }
    }
  }

  assert_eq!(l.find(&i), None);
  assert_eq!(l.find_by(BY_REV, &i), None);
  assert_eq!(l.len_by(BY_REV), Some(l.len()));
  check_chains(&l);
}

/// Heap allocator that refuses every allocation once its budget is spent.
/// Forks are unlimited.
#[derive(Debug)]
struct Limited {
  heap: Heap,
  left: usize,
}

impl Allocator for Limited {
  fn alloc(&mut self, size: usize) -> Result<Chunk, Error> {
    if self.left == 0 {
      return Err(Error::Exhausted);
    }
    self.left -= 1;
    self.heap.alloc(size)
  }

  fn dealloc(&mut self, chunk: Chunk) {
    self.heap.dealloc(chunk)
  }

  fn allocated(&self) -> usize {
    self.heap.allocated()
  }

  fn fork(&self) -> Self {
    Self {
      heap: Heap::new(),
      left: usize::MAX,
    }
  }
}

impl Sealed for Limited {
  fn bytes(&self, chunk: Chunk) -> Option<&[u8]> {
    self.heap.bytes(chunk)
  }

  fn bytes_mut(&mut self, chunk: Chunk) -> Option<&mut [u8]> {
    self.heap.bytes_mut(chunk)
  }
}

#[test]
fn test_failed_add_index_unregisters() {
  let mut l: SkipList<u32, Limited> = Builder::new().with_seed(5).build_with(Limited {
    heap: Heap::new(),
    left: usize::MAX,
  });
  l.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  l.add_index(BY_PARITY, by_parity, by_parity).unwrap();
  for i in 0..100 {
    l.insert(i).unwrap();
  }

  let live = l.nodes.live();
  let allocated = l.allocator().allocated();
  l.nodes.allocator_mut().left = 40;
  assert!(matches!(l.add_index(BY_REV, Descend, Descend), Err(Error::Exhausted)));
  assert_eq!(l.indexes(), 1);
  assert_eq!(l.secondaries.len(), 1);
  assert_eq!(l.nodes.live(), live);
  assert_eq!(l.allocator().allocated(), allocated);
  assert_eq!(l.find_by(BY_REV, &3), None);
  check_chains(&l);

  l.nodes.allocator_mut().left = usize::MAX;
  assert!(l.add_index(BY_REV, Descend, Descend).unwrap());
  assert_eq!(l.iter_by(BY_REV).unwrap().next(), Some(&99));
  check_chains(&l);
}

#[test]
fn test_merge() {
  let mut a = heap();
  let mut b = heap();
  a.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  b.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  a.add_index(BY_REV, Descend, Descend).unwrap();
  for i in [1, 3, 5] {
    a.insert(i).unwrap();
  }
  for i in [2, 4, 6] {
    b.insert(i).unwrap();
  }

  a.merge(&mut b).unwrap();
  assert_eq!(a.iter().copied().collect::<Vec<_>>(), [1, 2, 3, 4, 5, 6]);
  assert_eq!(a.iter_by(BY_REV).unwrap().copied().collect::<Vec<_>>(), [6, 5, 4, 3, 2, 1]);
  assert!(b.is_empty());
  assert_eq!(b.height(), 0);
  check_chains(&a);

  b.insert(9).unwrap();
  assert_eq!(b.iter().copied().collect::<Vec<_>>(), [9]);
}

#[test]
fn test_merge_into_empty_swaps() {
  let mut a = heap();
  let mut b = heap();
  b.set_compare(PRIMARY, Descend, Descend).unwrap();
  for i in 0..4 {
    b.insert(i).unwrap();
  }

  a.merge(&mut b).unwrap();
  assert_eq!(a.iter().copied().collect::<Vec<_>>(), [3, 2, 1, 0]);
  assert!(b.is_empty());
  assert!(matches!(b.insert(1), Err(Error::NoComparator)));
}

#[test]
fn test_failed_merge_keeps_the_rest() {
  let cmp = |a: &u32, b: &u32| a.cmp(b);
  let mut a = heap();
  a.insert_compare(1, &cmp).unwrap();
  let mut b = heap();
  b.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  for i in [2, 3] {
    b.insert(i).unwrap();
  }

  assert!(matches!(a.merge(&mut b), Err(Error::NoComparator)));
  assert_eq!(a.iter().copied().collect::<Vec<_>>(), [1]);
  assert_eq!(b.iter().copied().collect::<Vec<_>>(), [2, 3]);
  assert_eq!(b.find(&2), Some(&2));
  assert_eq!(b.pop(), Some(2));
}

#[test]
fn test_remove_all_with() {
  let mut l: SkipList<String> = Builder::new().with_seed(9).build();
  l.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  l.add_index(BY_REV, Descend, Descend).unwrap();
  for i in 0..10 {
    l.add(format!("{i}")).unwrap();
  }

  let mut freed = vec![];
  l.remove_all_with(|s| freed.push(s));
  assert_eq!(freed.len(), 10);
  assert_eq!(freed[0], "0");
  assert_eq!(l.height(), 0);
  assert_eq!(l.len_by(BY_REV), Some(0));
  assert_eq!(l.indexes(), 1);
  assert_eq!(l.nodes.live(), 0);

  l.insert(String::from("x")).unwrap();
  assert_eq!(l.find_by(BY_REV, &String::from("x")).map(String::as_str), Some("x"));
}

#[test]
fn test_debug() {
  let mut l = heap();
  l.set_compare(PRIMARY, Ascend, Ascend).unwrap();
  l.insert(2).unwrap();
  l.insert(1).unwrap();
  assert_eq!(format!("{l:?}"), "[1, 2]");
}
