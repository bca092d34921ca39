// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::cmp::{max, min};

use serde::Serialize;

/// Start, end and step (all in seconds) of a fetched series.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct TimeInfo {
  start: u64,
  end: u64,
  step: u64,
}

impl TimeInfo {
  pub fn new(start: u64, end: u64, step: u64) -> Self {
    TimeInfo { start, end, step }
  }

  pub fn get_start(&self) -> u64 {
    self.start
  }

  pub fn get_end(&self) -> u64 {
    self.end
  }

  pub fn get_step(&self) -> u64 {
    self.step
  }

  /// Number of slots between start and end.
  pub fn num_slots(&self) -> usize {
    if self.step == 0 || self.end <= self.start {
      return 0;
    }
    (self.end - self.start).div_ceil(self.step) as usize
  }
}

/// A fixed-step series: slot `i` holds the value at `start + i * step`, or None when missing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeriesData {
  time_info: TimeInfo,
  values: Vec<Option<f64>>,
}

impl TimeSeriesData {
  pub fn new(time_info: TimeInfo, values: Vec<Option<f64>>) -> Self {
    TimeSeriesData { time_info, values }
  }

  /// A series with every slot missing.
  pub fn empty(start: u64, end: u64, step: u64) -> Self {
    let time_info = TimeInfo::new(start, end, step);
    let values = vec![None; time_info.num_slots()];
    TimeSeriesData { time_info, values }
  }

  pub fn get_time_info(&self) -> &TimeInfo {
    &self.time_info
  }

  pub fn get_values(&self) -> &[Option<f64>] {
    &self.values
  }

  /// Value of the slot containing time `t`. Times outside the series are missing.
  pub fn get_value_at(&self, t: u64) -> Option<f64> {
    if t < self.time_info.start || self.time_info.step == 0 {
      return None;
    }
    let index = ((t - self.time_info.start) / self.time_info.step) as usize;
    self.values.get(index).copied().flatten()
  }

  /// `(value, timestamp)` pairs, the shape Graphite's json format uses.
  pub fn get_datapoints(&self) -> Vec<(Option<f64>, u64)> {
    self
      .values
      .iter()
      .enumerate()
      .map(|(i, value)| (*value, self.time_info.start + i as u64 * self.time_info.step))
      .collect()
  }

  /// Merge two series. The result has the finer step and spans both series; every slot takes
  /// the finer series' value when present and falls back to the coarser one.
  pub fn merge(self, other: TimeSeriesData) -> TimeSeriesData {
    let (fine, coarse) = if self.time_info.step <= other.time_info.step {
      (self, other)
    } else {
      (other, self)
    };

    let step = fine.time_info.step;
    let start = min(fine.time_info.start, coarse.time_info.start);
    let end = max(fine.time_info.end, coarse.time_info.end);
    let time_info = TimeInfo::new(start, end, step);

    let values = (0..time_info.num_slots())
      .map(|i| {
        let t = start + i as u64 * step;
        fine.get_value_at(t).or_else(|| coarse.get_value_at(t))
      })
      .collect();

    TimeSeriesData { time_info, values }
  }
}
