use core::{mem, slice};
use std::{boxed::Box, vec::Vec};

use super::{Arena, Error};

pub(crate) mod sealed {
  use super::Chunk;

  /// Raw access to the memory of in-use chunks.
  ///
  /// Every chunk is aligned to at least 8 bytes.
  pub trait Sealed {
    /// Returns the memory of an in-use chunk, `None` once it is released.
    fn bytes(&self, chunk: Chunk) -> Option<&[u8]>;

    /// Mutable counterpart of [`bytes`](Sealed::bytes).
    fn bytes_mut(&mut self, chunk: Chunk) -> Option<&mut [u8]>;
  }
}

/// A block handed out by an [`Allocator`].
///
/// The id is dense and stable for as long as the chunk is in use, the node
/// table uses it as the address of the cell it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
  id: u32,
  size: usize,
}

impl Chunk {
  /// Creates a new chunk handle.
  #[inline]
  pub const fn new(id: u32, size: usize) -> Self {
    Self { id, size }
  }

  /// Returns the id of the chunk.
  #[inline]
  pub const fn id(&self) -> u32 {
    self.id
  }

  /// Returns the size of the chunk in bytes.
  #[inline]
  pub const fn size(&self) -> usize {
    self.size
  }
}

/// Where node cells and scratch buffers live.
///
/// The strategy is fixed when a [`SkipList`](crate::SkipList) is built and
/// applies to node and scratch allocations alike. The trait is sealed, the
/// crate provides [`Heap`] and [`Pool`].
pub trait Allocator: sealed::Sealed {
  /// Allocates a chunk of `size` bytes.
  fn alloc(&mut self, size: usize) -> Result<Chunk, Error>;

  /// Gives a chunk back. The id may be handed out again afterwards.
  fn dealloc(&mut self, chunk: Chunk);

  /// Returns the number of bytes currently handed out.
  fn allocated(&self) -> usize;

  /// Returns an empty allocator of the same kind, drawing from the same
  /// backing memory.
  fn fork(&self) -> Self
  where
    Self: Sized;
}

/// Allocates every chunk from the global heap and frees it on release.
#[derive(Debug, Default)]
pub struct Heap {
  chunks: Vec<Option<Box<[u64]>>>,
  released: Vec<u32>,
  allocated: usize,
}

impl Heap {
  /// Creates a new heap allocator.
  #[inline]
  pub const fn new() -> Self {
    Self {
      chunks: Vec::new(),
      released: Vec::new(),
      allocated: 0,
    }
  }
}

impl sealed::Sealed for Heap {
  fn bytes(&self, chunk: Chunk) -> Option<&[u8]> {
    let words = self.chunks.get(chunk.id as usize)?.as_deref()?;
    // Safety: the words are initialized and `u8` has no alignment requirement.
    Some(unsafe { slice::from_raw_parts(words.as_ptr().cast::<u8>(), mem::size_of_val(words)) })
  }

  fn bytes_mut(&mut self, chunk: Chunk) -> Option<&mut [u8]> {
    let words = self.chunks.get_mut(chunk.id as usize)?.as_deref_mut()?;
    let len = mem::size_of_val(words);
    // Safety: every byte pattern is a valid `u64`.
    Some(unsafe { slice::from_raw_parts_mut(words.as_mut_ptr().cast::<u8>(), len) })
  }
}

impl Allocator for Heap {
  fn alloc(&mut self, size: usize) -> Result<Chunk, Error> {
    let mut words = Vec::new();
    words.try_reserve_exact(size.div_ceil(mem::size_of::<u64>()))?;
    words.resize(words.capacity(), 0u64);

    let id = match self.released.pop() {
      Some(id) => id,
      None => {
        let id = u32::try_from(self.chunks.len()).map_err(|_| Error::Exhausted)?;
        self.chunks.try_reserve(1)?;
        self.chunks.push(None);
        id
      }
    };

    self.chunks[id as usize] = Some(words.into_boxed_slice());
    self.allocated += size;
    Ok(Chunk::new(id, size))
  }

  fn dealloc(&mut self, chunk: Chunk) {
    let Some(slot) = self.chunks.get_mut(chunk.id as usize) else {
      return;
    };
    if slot.take().is_some() {
      self.allocated -= chunk.size;
      self.released.push(chunk.id);
    }
  }

  #[inline]
  fn allocated(&self) -> usize {
    self.allocated
  }

  #[inline]
  fn fork(&self) -> Self {
    Self::new()
  }
}

#[derive(Debug)]
struct PoolChunk {
  id: u32,
  offset: usize,
  in_use: bool,
}

/// Every chunk of one exact size ever carved out of the arena.
#[derive(Debug)]
struct MemList {
  size: usize,
  chunks: Vec<PoolChunk>,
  /// Positions in `chunks` that are not in use.
  reclaimed: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Location {
  bucket: usize,
  pos: usize,
}

/// Carves chunks out of an [`Arena`], which can never free them, and keeps a
/// free list per chunk size so released chunks are reused by the next
/// allocation of the same size.
#[derive(Debug)]
pub struct Pool {
  arena: Arena,
  memlist: Vec<MemList>,
  /// Where each chunk lives, indexed by chunk id.
  locations: Vec<Location>,
  allocated: usize,
}

impl Pool {
  /// Creates a pool drawing from the given arena.
  #[inline]
  pub const fn new(arena: Arena) -> Self {
    Self {
      arena,
      memlist: Vec::new(),
      locations: Vec::new(),
      allocated: 0,
    }
  }

  /// Returns the arena backing this pool.
  #[inline]
  pub const fn arena(&self) -> &Arena {
    &self.arena
  }

  /// Returns the number of chunks ever carved out of the arena by this pool.
  #[inline]
  pub fn chunks(&self) -> usize {
    self.locations.len()
  }

  /// Returns the arena offset of an in-use chunk.
  pub fn offset(&self, chunk: Chunk) -> Option<usize> {
    self.chunk(chunk).map(|(c, _)| c.offset)
  }

  fn chunk(&self, chunk: Chunk) -> Option<(&PoolChunk, usize)> {
    let loc = self.locations.get(chunk.id as usize)?;
    let list = &self.memlist[loc.bucket];
    let c = &list.chunks[loc.pos];
    c.in_use.then_some((c, list.size))
  }
}

impl sealed::Sealed for Pool {
  fn bytes(&self, chunk: Chunk) -> Option<&[u8]> {
    let (c, size) = self.chunk(chunk)?;
    Some(self.arena.bytes(c.offset, size))
  }

  fn bytes_mut(&mut self, chunk: Chunk) -> Option<&mut [u8]> {
    let (offset, size) = self.chunk(chunk).map(|(c, size)| (c.offset, size))?;
    Some(self.arena.bytes_mut(offset, size))
  }
}

impl Allocator for Pool {
  fn alloc(&mut self, size: usize) -> Result<Chunk, Error> {
    let bucket = self.memlist.iter().position(|list| list.size == size);

    if let Some(bucket) = bucket {
      let list = &mut self.memlist[bucket];
      if let Some(pos) = list.reclaimed.pop() {
        let chunk = &mut list.chunks[pos];
        chunk.in_use = true;
        self.allocated += size;
        return Ok(Chunk::new(chunk.id, size));
      }
    }

    // nothing to reuse for this size, carve a new chunk
    let id = u32::try_from(self.locations.len()).map_err(|_| Error::Exhausted)?;
    let offset = self.arena.carve(size)?;
    let bucket = match bucket {
      Some(bucket) => bucket,
      None => {
        self.memlist.push(MemList {
          size,
          chunks: Vec::new(),
          reclaimed: Vec::new(),
        });
        self.memlist.len() - 1
      }
    };

    let list = &mut self.memlist[bucket];
    list.chunks.push(PoolChunk {
      id,
      offset,
      in_use: true,
    });
    self.locations.push(Location {
      bucket,
      pos: list.chunks.len() - 1,
    });
    self.allocated += size;
    Ok(Chunk::new(id, size))
  }

  fn dealloc(&mut self, chunk: Chunk) {
    let Some(loc) = self.locations.get(chunk.id as usize).copied() else {
      return;
    };

    let list = &mut self.memlist[loc.bucket];
    let c = &mut list.chunks[loc.pos];
    if c.in_use {
      c.in_use = false;
      list.reclaimed.push(loc.pos);
      self.allocated -= list.size;
    }
  }

  #[inline]
  fn allocated(&self) -> usize {
    self.allocated
  }

  #[inline]
  fn fork(&self) -> Self {
    Self::new(self.arena.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::{sealed::Sealed, *};

  fn arena(cap: u32) -> Arena {
    Arena::new(cap).unwrap()
  }

  #[test]
  fn test_heap_reuses_released_ids() {
    let mut heap = Heap::new();
    let a = heap.alloc(48).unwrap();
    let b = heap.alloc(48).unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(heap.allocated(), 96);

    heap.dealloc(a);
    assert_eq!(heap.allocated(), 48);
    assert!(heap.bytes(a).is_none());
    let c = heap.alloc(128).unwrap();
    assert_eq!(c.id(), a.id());
    assert_eq!(heap.allocated(), 176);
    assert!(heap.bytes(c).unwrap().len() >= 128);
  }

  #[test]
  fn test_heap_chunks_hold_bytes() {
    let mut heap = Heap::new();
    let a = heap.alloc(12).unwrap();
    let b = heap.alloc(12).unwrap();
    heap.bytes_mut(a).unwrap()[..12].copy_from_slice(&[7; 12]);
    heap.bytes_mut(b).unwrap()[..12].copy_from_slice(&[9; 12]);
    assert_eq!(&heap.bytes(a).unwrap()[..12], &[7; 12]);
    assert_eq!(&heap.bytes(b).unwrap()[..12], &[9; 12]);
    assert_eq!(heap.bytes(a).unwrap().as_ptr() as usize % 8, 0);
  }

  #[test]
  fn test_pool_reuses_same_size() {
    let arena = arena(1 << 10);
    let mut pool = Pool::new(arena.clone());

    let a = pool.alloc(48).unwrap();
    let used = arena.allocated();
    pool.dealloc(a);
    assert_eq!(pool.allocated(), 0);
    assert_eq!(pool.offset(a), None);
    assert!(pool.bytes(a).is_none());

    // same size, same chunk, no new arena memory
    let b = pool.alloc(48).unwrap();
    assert_eq!(b.id(), a.id());
    assert_eq!(arena.allocated(), used);
    assert_eq!(pool.chunks(), 1);

    // a different size class never reuses it
    pool.dealloc(b);
    let c = pool.alloc(128).unwrap();
    assert_ne!(c.id(), a.id());
    assert!(arena.allocated() > used);
    assert_eq!(pool.chunks(), 2);
  }

  #[test]
  fn test_pool_chunks_live_in_the_arena() {
    let arena = arena(1 << 10);
    let mut pool = Pool::new(arena.clone());
    let a = pool.alloc(16).unwrap();
    let b = pool.alloc(16).unwrap();
    pool.bytes_mut(a).unwrap().copy_from_slice(&[1; 16]);
    pool.bytes_mut(b).unwrap().copy_from_slice(&[2; 16]);

    let (oa, ob) = (pool.offset(a).unwrap(), pool.offset(b).unwrap());
    assert_ne!(oa, ob);
    assert_eq!(arena.bytes(oa, 16), &[1; 16]);
    assert_eq!(arena.bytes(ob, 16), &[2; 16]);
  }

  #[test]
  fn test_pool_double_free_is_ignored() {
    let mut pool = Pool::new(arena(1 << 10));
    let a = pool.alloc(16).unwrap();
    pool.dealloc(a);
    pool.dealloc(a);
    assert_eq!(pool.allocated(), 0);

    let b = pool.alloc(16).unwrap();
    let c = pool.alloc(16).unwrap();
    assert_eq!(b.id(), a.id());
    assert_ne!(c.id(), a.id());
  }

  #[test]
  fn test_pool_full() {
    let mut pool = Pool::new(arena(512));
    let err = loop {
      if let Err(e) = pool.alloc(64) {
        break e;
      }
    };
    assert!(matches!(err, Error::Arena(_)));

    // forks share the arena budget
    let mut fork = pool.fork();
    assert!(matches!(fork.alloc(64), Err(Error::Arena(_))));
  }
}
