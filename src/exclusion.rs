//! Bounded set of recently served problem ids.
//!
//! When an insert finds the set full it is wiped, not trimmed: a short burst of
//! repeats after the wipe is accepted.

use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct ExclusionSet {
  ids: HashSet<String>,
  cap: usize,
}

impl ExclusionSet {
  pub fn new(cap: usize) -> Self {
    Self { ids: HashSet::new(), cap: cap.max(1) }
  }

  pub fn insert(&mut self, id: &str) {
    if self.ids.len() >= self.cap {
      self.ids.clear();
    }
    self.ids.insert(id.to_string());
  }

  pub fn contains(&self, id: &str) -> bool { self.ids.contains(id) }

  pub fn clear(&mut self) { self.ids.clear(); }

  pub fn len(&self) -> usize { self.ids.len() }

  pub fn is_empty(&self) -> bool { self.ids.is_empty() }

  pub fn ids(&self) -> &HashSet<String> { &self.ids }
}

/// Sorted, comma-joined id list as sent in the selector query string.
pub fn join_exclude(ids: &HashSet<String>) -> String {
  let mut ids: Vec<&str> = ids.iter().map(String::as_str).collect();
  ids.sort_unstable();
  ids.join(",")
}

/// Parse a comma-joined id list; empty segments are dropped.
pub fn parse_exclude(raw: &str) -> HashSet<String> {
  raw.split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_set_is_wiped_on_next_insert() {
    let mut set = ExclusionSet::new(200);
    for i in 0..200 {
      set.insert(&format!("p{i}"));
    }
    assert_eq!(set.len(), 200);
    set.insert("fresh");
    assert_eq!(set.len(), 1);
    assert!(set.contains("fresh"));
    assert!(!set.contains("p0"));
  }

  #[test]
  fn reinserting_a_known_id_below_cap_keeps_size() {
    let mut set = ExclusionSet::new(3);
    set.insert("a");
    set.insert("a");
    set.insert("b");
    assert_eq!(set.len(), 2);
  }

  #[test]
  fn query_round_trip() {
    let mut set = ExclusionSet::new(10);
    set.insert("G-2023-1");
    set.insert("A1-2022-1");
    assert_eq!(join_exclude(set.ids()), "A1-2022-1,G-2023-1");
    assert_eq!(&parse_exclude(&join_exclude(set.ids())), set.ids());
    assert!(parse_exclude("").is_empty());
    assert_eq!(parse_exclude("a,,b,").len(), 2);
  }
}
