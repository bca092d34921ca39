// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Table and row layout of the metric tree and the datapoints.
//!
//! The meta table has one row per node of the dotted metric tree, keyed by the node's full path
//! (the root is `ROOT`). Branch rows link to their children through `t::c_<child>` columns;
//! leaf rows carry `t::NODE`, their retentions in `t::AGG` and the aggregation method in
//! `t::AGG_METHOD`.
//!
//! Datapoints live in one table per retention tier, named `<step>.<step_points>.<step_points>...`.
//! Each row holds two hours of one metric, keyed `<metric>:<row start>`, with one column per
//! datapoint whose qualifier is the timestamp.

use std::collections::BTreeMap;

use log::debug;

use crate::metric::metric_point::MetricPoint;
use crate::metric::retention::{AggregationMethod, Retention};
use crate::store::{Row, Store};
use crate::utils::error::GraphiteDBError;

/// Row key of the root of the metric tree.
pub const ROOT_NODE: &str = "ROOT";

/// Meta columns live in family `t:` and their qualifiers carry a leading ':'.
pub const NODE_COLUMN: &str = "t::NODE";
pub const AGG_COLUMN: &str = "t::AGG";
pub const AGG_METHOD_COLUMN: &str = "t::AGG_METHOD";
pub const CHILD_COLUMN_PREFIX: &str = "t::c_";

/// Column family of the data tables.
pub const DATA_CF_NAME: &str = "d";

/// Seconds of data held by one row of a data table.
pub const ROW_SPAN_SECONDS: u64 = 7200;

/// Name of the data table for the tier with the given step, e.g. `60.60_1440.300_2016`.
pub fn get_data_table_name(seconds_per_point: u64, retentions: &[Retention]) -> String {
  let reten_str = retentions
    .iter()
    .map(|r| format!("{}_{}", r.get_seconds_per_point(), r.get_points()))
    .collect::<Vec<_>>()
    .join(".");
  format!("{}.{}", seconds_per_point, reten_str)
}

/// Start of the data row holding the given time.
pub fn get_row_floor(time: u64) -> u64 {
  time - time % ROW_SPAN_SECONDS
}

/// Key of the data row holding the given time for a metric.
pub fn get_data_row_key(metric: &str, time: u64) -> String {
  format!("{}:{}", metric, get_row_floor(time))
}

/// Key ranges `(start, stop)`, stop exclusive, covering the data rows of `metric` that start
/// within `[first_row, last_row]`. Row keys compare as strings, so row starts with different
/// digit counts do not sort by time; each digit count gets its own range.
pub fn get_data_row_ranges(metric: &str, first_row: u64, last_row: u64) -> Vec<(String, String)> {
  let mut ranges = Vec::new();
  let mut row = get_row_floor(first_row);
  while row <= last_row {
    let widest = 10u64
      .checked_pow(row.to_string().len() as u32)
      .map_or(u64::MAX, |limit| limit - 1);
    let end = widest.min(last_row);
    // A key followed by NUL is the smallest key after it.
    ranges.push((
      get_data_row_key(metric, row),
      format!("{}\0", get_data_row_key(metric, end)),
    ));

    row = match widest
      .checked_add(1)
      .and_then(|next| next.checked_next_multiple_of(ROW_SPAN_SECONDS))
    {
      Some(next) => next,
      None => break,
    };
  }
  ranges
}

/// Timestamp stored in a data column, ignoring the column family. None for foreign columns.
pub fn parse_data_column(column: &str) -> Option<u64> {
  column.rsplit(':').next()?.parse::<u64>().ok()
}

/// Is this meta row a leaf?
pub fn is_leaf_row(row: &Row) -> bool {
  row.get(NODE_COLUMN).is_some_and(|v| !v.is_empty())
}

/// Children of a meta row as (name, row key of the child).
pub fn get_child_links(row: &Row) -> Vec<(&str, &str)> {
  row
    .iter()
    .filter_map(|(column, child_key)| {
      column
        .strip_prefix(CHILD_COLUMN_PREFIX)
        .map(|name| (name, child_key.as_str()))
    })
    .collect()
}

/// Register a leaf at `path` in the meta table, linking every ancestor from `ROOT` down.
pub async fn write_metric_metadata(
  store: &Store,
  meta_table: &str,
  path: &str,
  retentions: &[Retention],
  method: AggregationMethod,
) -> Result<(), GraphiteDBError> {
  if path.is_empty() || path.split('.').any(str::is_empty) {
    return Err(GraphiteDBError::InvalidPattern(format!(
      "Invalid metric path {:?}",
      path
    )));
  }
  if retentions.is_empty() {
    return Err(GraphiteDBError::InvalidRetention(format!(
      "No retentions given for {}",
      path
    )));
  }

  let components: Vec<&str> = path.split('.').collect();
  let mut parent_key = ROOT_NODE.to_owned();
  for (i, component) in components.iter().enumerate() {
    let child_key = components[..=i].join(".");
    let mut link = Row::new();
    link.insert(
      format!("{}{}", CHILD_COLUMN_PREFIX, component),
      child_key.clone(),
    );
    store.put(meta_table, &parent_key, &link).await?;
    parent_key = child_key;
  }

  let mut leaf = Row::new();
  leaf.insert(NODE_COLUMN.to_owned(), "1".to_owned());
  leaf.insert(AGG_COLUMN.to_owned(), serde_json::to_string(retentions)?);
  leaf.insert(AGG_METHOD_COLUMN.to_owned(), method.get_name().to_owned());
  store.put(meta_table, path, &leaf).await?;

  debug!("Wrote metadata for metric {}", path);
  Ok(())
}

/// Write datapoints of `path` into the data table of the tier with step `seconds_per_point`.
pub async fn write_points(
  store: &Store,
  path: &str,
  retentions: &[Retention],
  seconds_per_point: u64,
  points: &[MetricPoint],
) -> Result<(), GraphiteDBError> {
  let table = get_data_table_name(seconds_per_point, retentions);

  let mut rows: BTreeMap<String, Row> = BTreeMap::new();
  for point in points {
    rows
      .entry(get_data_row_key(path, point.get_time()))
      .or_default()
      .insert(
        format!("{}:{}", DATA_CF_NAME, point.get_time()),
        point.get_value().to_string(),
      );
  }

  for (key, columns) in rows {
    store.put(&table, &key, &columns).await?;
  }
  Ok(())
}
