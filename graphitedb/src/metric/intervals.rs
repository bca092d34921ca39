// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::cmp::{max, min};

use serde::Serialize;

use crate::utils::error::GraphiteDBError;

/// A closed range of epoch seconds.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Interval {
  start: u64,
  end: u64,
}

impl Interval {
  pub fn new(start: u64, end: u64) -> Result<Self, GraphiteDBError> {
    if start > end {
      return Err(GraphiteDBError::InvalidInterval(start, end));
    }
    Ok(Interval { start, end })
  }

  pub fn get_start(&self) -> u64 {
    self.start
  }

  pub fn get_end(&self) -> u64 {
    self.end
  }

  pub fn size(&self) -> u64 {
    self.end - self.start
  }

  pub fn overlaps(&self, other: &Interval) -> bool {
    self.start <= other.end && other.start <= self.end
  }

  /// The common part of both intervals, if any.
  pub fn intersect(&self, other: &Interval) -> Option<Interval> {
    if !self.overlaps(other) {
      return None;
    }
    Some(Interval {
      start: max(self.start, other.start),
      end: min(self.end, other.end),
    })
  }

  /// The smallest interval covering both, if they overlap or touch.
  pub fn union(&self, other: &Interval) -> Option<Interval> {
    if !self.overlaps(other) {
      return None;
    }
    Some(Interval {
      start: min(self.start, other.start),
      end: max(self.end, other.end),
    })
  }
}

/// A sorted set of disjoint intervals.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IntervalSet {
  intervals: Vec<Interval>,
}

impl IntervalSet {
  /// Create a set from arbitrary intervals. Overlapping and touching intervals are merged.
  pub fn new(mut intervals: Vec<Interval>) -> Self {
    intervals.sort();

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
      match merged.last_mut() {
        Some(last) if last.overlaps(&interval) => {
          last.end = max(last.end, interval.end);
        }
        _ => merged.push(interval),
      }
    }

    IntervalSet { intervals: merged }
  }

  pub fn get_intervals(&self) -> &[Interval] {
    &self.intervals
  }

  pub fn is_empty(&self) -> bool {
    self.intervals.is_empty()
  }

  /// Total number of seconds covered.
  pub fn size(&self) -> u64 {
    self.intervals.iter().map(Interval::size).sum()
  }

  pub fn union(&self, other: &IntervalSet) -> IntervalSet {
    let mut all = self.intervals.clone();
    all.extend_from_slice(&other.intervals);
    IntervalSet::new(all)
  }

  pub fn intersect(&self, other: &IntervalSet) -> IntervalSet {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < self.intervals.len() && j < other.intervals.len() {
      let a = &self.intervals[i];
      let b = &other.intervals[j];
      if let Some(common) = a.intersect(b) {
        result.push(common);
      }
      // Advance whichever ends first; it cannot overlap anything further in the other set.
      if a.end < b.end {
        i += 1;
      } else {
        j += 1;
      }
    }
    IntervalSet::new(result)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Interval> {
    self.intervals.iter()
  }
}

impl From<Interval> for IntervalSet {
  fn from(interval: Interval) -> Self {
    IntervalSet {
      intervals: vec![interval],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn interval(start: u64, end: u64) -> Interval {
    Interval::new(start, end).unwrap()
  }

  #[test]
  fn test_interval() {
    assert_eq!(
      Interval::new(10, 5),
      Err(GraphiteDBError::InvalidInterval(10, 5))
    );

    let a = interval(0, 10);
    let b = interval(5, 20);
    let c = interval(11, 12);
    assert_eq!(a.size(), 10);
    assert!(a.overlaps(&b));
    assert!(!a.overlaps(&c));
    assert_eq!(a.intersect(&b), Some(interval(5, 10)));
    assert_eq!(a.intersect(&c), None);
    assert_eq!(a.union(&b), Some(interval(0, 20)));
    assert_eq!(a.union(&c), None);

    // Touching intervals overlap in a single point.
    assert_eq!(a.intersect(&interval(10, 15)), Some(interval(10, 10)));
  }

  #[test]
  fn test_interval_set_merges() {
    let set = IntervalSet::new(vec![
      interval(50, 60),
      interval(0, 10),
      interval(5, 20),
      interval(20, 25),
    ]);
    assert_eq!(set.get_intervals(), &[interval(0, 25), interval(50, 60)]);
    assert_eq!(set.size(), 35);
    assert!(!set.is_empty());
    assert!(IntervalSet::default().is_empty());
  }

  #[test]
  fn test_interval_set_union_and_intersect() {
    let a = IntervalSet::new(vec![interval(0, 10), interval(20, 30)]);
    let b = IntervalSet::new(vec![interval(5, 25), interval(40, 50)]);

    let union = a.union(&b);
    assert_eq!(union.get_intervals(), &[interval(0, 30), interval(40, 50)]);

    let intersection = a.intersect(&b);
    assert_eq!(
      intersection.get_intervals(),
      &[interval(5, 10), interval(20, 25)]
    );
    assert_eq!(intersection.iter().count(), 2);

    assert!(a.intersect(&IntervalSet::default()).is_empty());
  }
}
