// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use futures::future::join_all;
use log::error;

use crate::finder::node::LeafNode;
use crate::metric::intervals::IntervalSet;
use crate::metric::time_series_data::TimeSeriesData;
use crate::utils::error::GraphiteDBError;

/// Reads several leaves that resolve to the same metric path, e.g. the same metric found in
/// more than one cluster, and merges their data.
#[derive(Clone, Debug)]
pub struct MultiReader {
  nodes: Vec<LeafNode>,
}

impl MultiReader {
  pub fn new(nodes: Vec<LeafNode>) -> Self {
    MultiReader { nodes }
  }

  /// Union of the intervals of every node.
  pub fn get_intervals(&self, now: u64) -> Result<IntervalSet, GraphiteDBError> {
    let mut intervals = IntervalSet::default();
    for node in &self.nodes {
      intervals = intervals.union(&node.get_intervals(now)?);
    }
    Ok(intervals)
  }

  /// Fetch from every node concurrently. Failed sub-fetches are logged and left out; the call
  /// only fails when none succeeds.
  pub async fn fetch(
    &self,
    start: u64,
    end: u64,
    now: u64,
  ) -> Result<TimeSeriesData, GraphiteDBError> {
    let results = join_all(self.nodes.iter().map(|node| node.fetch(start, end, now))).await;

    let mut first_error = None;
    let mut fetched = Vec::with_capacity(results.len());
    for (node, result) in self.nodes.iter().zip(results) {
      match result {
        Ok(series) => fetched.push(series),
        Err(e) => {
          error!("Failed to complete subfetch of {}: {}", node.get_path(), e);
          first_error.get_or_insert(e);
        }
      }
    }

    match fetched.into_iter().reduce(TimeSeriesData::merge) {
      Some(series) => Ok(series),
      // An invalid time range is the caller's error, not a storage failure.
      None => match first_error {
        Some(e @ GraphiteDBError::InvalidTimeRange(_)) => Err(e),
        _ => Err(GraphiteDBError::AllFetchesFailed(self.get_path())),
      },
    }
  }

  fn get_path(&self) -> String {
    self
      .nodes
      .first()
      .map(|node| node.get_path().to_owned())
      .unwrap_or_default()
  }
}
