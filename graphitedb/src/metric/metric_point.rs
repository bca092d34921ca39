// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use approx::abs_diff_eq;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Represents a single datapoint of a metric.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MetricPoint {
  /// Timestamp from epoch, in seconds.
  time: u64,

  /// Value for this metric point.
  value: f64,
}

impl MetricPoint {
  /// Create a new MetricPoint from given time and value.
  pub fn new(time: u64, value: f64) -> Self {
    MetricPoint { time, value }
  }

  /// Get time.
  pub fn get_time(&self) -> u64 {
    self.time
  }

  /// Get value.
  pub fn get_value(&self) -> f64 {
    self.value
  }
}

impl PartialEq for MetricPoint {
  #[inline]
  fn eq(&self, other: &MetricPoint) -> bool {
    // Two metric points are equal if their times are equal, and their values are either equal or are NaN.
    if self.time == other.time {
      if self.value.is_nan() {
        return other.value.is_nan();
      } else {
        return abs_diff_eq!(self.value, other.value);
      }
    }
    false
  }
}

impl Eq for MetricPoint {}

impl Ord for MetricPoint {
  fn cmp(&self, other: &Self) -> Ordering {
    self.time.cmp(&other.time)
  }
}

impl PartialOrd for MetricPoint {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}
