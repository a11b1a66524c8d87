use core::cmp::Ordering;

use indexed_skl::{Arena, Ascend, Builder, IndexId, SkipList};

const BY_ID: IndexId = IndexId::new(0);
const BY_AGE: IndexId = IndexId::new(1);
const BY_NAME: IndexId = IndexId::new(2);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct User {
  id: u32,
  age: u8,
  name: String,
}

fn user(id: u32) -> User {
  User {
    id,
    age: 18 + (id * 7 % 50) as u8,
    name: format!("user-{:04}", (id * 31) % 1000),
  }
}

fn by_age(a: &User, b: &User) -> Ordering {
  a.age.cmp(&b.age)
}

fn by_name(a: &User, b: &User) -> Ordering {
  a.name.cmp(&b.name)
}

fn main() {
  const N: u32 = 1000;

  let arena = Arena::new(1 << 20).unwrap();
  let mut l: SkipList<User, _> = Builder::new().with_seed(42).build_in(arena.clone());
  l.set_compare(BY_ID, Ascend, Ascend).unwrap();
  l.add_index(BY_AGE, by_age, by_age).unwrap();
  l.add_index(BY_NAME, by_name, by_name).unwrap();

  for i in 0..N {
    l.insert(user(i)).unwrap();
  }
  assert_eq!(l.len_by(BY_AGE), Some(N as usize));

  let youngest = l.iter_by(BY_AGE).unwrap().next().unwrap();
  println!("youngest: {youngest:?}");

  let key = User {
    id: 0,
    age: 0,
    name: String::from("user-0031"),
  };
  let found = l.find_by(BY_NAME, &key).unwrap();
  assert_eq!(found.id, 1);

  // removing through one index removes the user from all of them
  let removed = l.remove_by(BY_NAME, &key).unwrap();
  assert_eq!(l.find(&removed), None);
  assert_eq!(l.len_by(BY_AGE), Some(N as usize - 1));
  assert_eq!(l.len_by(BY_NAME), Some(N as usize - 1));

  let adults: Vec<u32> = l
    .iter_by(BY_AGE)
    .unwrap()
    .filter(|u| u.age >= 60)
    .map(|u| u.id)
    .collect();
  println!("{} users aged 60 or more", adults.len());
  println!("arena: {} of {} bytes in use", arena.allocated(), arena.capacity());
}
