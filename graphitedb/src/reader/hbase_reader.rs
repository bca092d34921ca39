// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::cmp::{max, min};

use futures::future::{join_all, try_join_all};
use log::{debug, error};

use crate::metric::intervals::{Interval, IntervalSet};
use crate::metric::retention::{AggregationMethod, Retention};
use crate::metric::time_series_data::{TimeInfo, TimeSeriesData};
use crate::store::schema::{
  get_data_row_ranges, get_data_table_name, get_row_floor, parse_data_column,
};
use crate::store::Store;
use crate::utils::error::GraphiteDBError;

/// The part of one retention tier that a fetch needs to read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableConfig {
  name: String,
  retention: Retention,
  start: u64,
  end: u64,
  final_step: u64,
}

impl TableConfig {
  pub fn get_name(&self) -> &str {
    &self.name
  }

  pub fn get_retention(&self) -> &Retention {
    &self.retention
  }

  pub fn get_start(&self) -> u64 {
    self.start
  }

  pub fn get_end(&self) -> u64 {
    self.end
  }

  /// Finest step among all tiers selected for the same fetch.
  pub fn get_final_step(&self) -> u64 {
    self.final_step
  }
}

/// Reads the datapoints of one metric from its retention tier tables.
#[derive(Clone, Debug)]
pub struct HBaseReader {
  store: Store,
  metric: String,
  retentions: Vec<Retention>,
  method: AggregationMethod,
}

impl HBaseReader {
  /// Create a reader. Retentions are ordered finest first.
  pub fn new(
    store: Store,
    metric: &str,
    retentions: Vec<Retention>,
    method: AggregationMethod,
  ) -> Self {
    HBaseReader {
      store,
      metric: metric.to_owned(),
      retentions,
      method,
    }
  }

  pub fn get_metric(&self) -> &str {
    &self.metric
  }

  pub fn get_retentions(&self) -> &[Retention] {
    &self.retentions
  }

  pub fn get_method(&self) -> AggregationMethod {
    self.method
  }

  /// Time covered by the metric: back from `now` as far as the tiers reach together.
  pub fn get_intervals(&self, now: u64) -> Result<IntervalSet, GraphiteDBError> {
    let total = self
      .retentions
      .iter()
      .map(Retention::duration)
      .fold(0, u64::saturating_add);
    let interval = Interval::new(now.saturating_sub(total), now)?;
    Ok(IntervalSet::from(interval))
  }

  /// Select the tiers overlapping `[start, end]`. Tiers are laid back to back from `now`:
  /// the finest covers the most recent window, each coarser one the window before it.
  pub fn get_table_config(&self, start: u64, end: u64, now: u64) -> Vec<TableConfig> {
    let mut configs = Vec::new();
    let mut offset = 0;
    let mut final_step = match self.retentions.last() {
      Some(retention) => retention.get_seconds_per_point(),
      None => return configs,
    };

    for retention in &self.retentions {
      let tier_end = now.saturating_sub(offset);
      offset = offset.saturating_add(retention.duration());
      let tier_start = now.saturating_sub(offset);

      // Everything older is before the requested range.
      if tier_end < start {
        break;
      }
      if tier_start > end {
        continue;
      }

      final_step = min(final_step, retention.get_seconds_per_point());
      configs.push(TableConfig {
        name: get_data_table_name(retention.get_seconds_per_point(), &self.retentions),
        retention: *retention,
        start: max(tier_start, start),
        end: min(tier_end, end),
        final_step: 0,
      });
    }

    for config in configs.iter_mut() {
      config.final_step = final_step;
    }
    configs
  }

  /// Fetch the series for `[start, end]`. `end` beyond `now` is clamped to `now`.
  pub async fn fetch(
    &self,
    start: u64,
    end: u64,
    now: u64,
  ) -> Result<TimeSeriesData, GraphiteDBError> {
    if start > end {
      error!(
        "Invalid time interval: from time {} is after until time {}",
        start, end
      );
      return Err(GraphiteDBError::InvalidTimeRange(format!(
        "from time {} is after until time {}",
        start, end
      )));
    }
    if start > now {
      error!("Invalid time interval: from time {} is in the future", start);
      return Err(GraphiteDBError::InvalidTimeRange(format!(
        "from time {} is in the future",
        start
      )));
    }
    let end = min(end, now);

    let configs = self.get_table_config(start, end, now);
    if configs.is_empty() {
      debug!(
        "No retention of {} covers {} to {}, returning an empty series",
        self.metric, start, end
      );
      let step = self
        .retentions
        .first()
        .map(Retention::get_seconds_per_point)
        .unwrap_or(1);
      let aligned_start = start - start % step;
      return Ok(TimeSeriesData::empty(aligned_start, align_up(end, step), step));
    }

    // Scan each tier in its own task.
    let handles: Vec<_> = configs
      .into_iter()
      .map(|config| {
        let store = self.store.clone();
        let metric = self.metric.clone();
        let method = self.method;
        tokio::spawn(async move { scan_table(&store, &metric, method, &config).await })
      })
      .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in join_all(handles).await {
      results.push(handle??);
    }

    results
      .into_iter()
      .reduce(TimeSeriesData::merge)
      .ok_or_else(|| GraphiteDBError::AllFetchesFailed(self.metric.clone()))
  }
}

/// Round `time` up to a multiple of `step`.
fn align_up(time: u64, step: u64) -> u64 {
  if time % step == 0 {
    time
  } else {
    (time - time % step).saturating_add(step)
  }
}

/// Read one tier of a metric and place its datapoints into fixed-step slots. Datapoints that
/// share a slot are combined with the metric's aggregation method.
async fn scan_table(
  store: &Store,
  metric: &str,
  method: AggregationMethod,
  config: &TableConfig,
) -> Result<TimeSeriesData, GraphiteDBError> {
  let step = config.retention.get_seconds_per_point();
  let aligned_start = config.start - config.start % step;
  let aligned_end = align_up(config.end, step);
  let time_info = TimeInfo::new(aligned_start, aligned_end, step);

  let ranges = get_data_row_ranges(metric, aligned_start, get_row_floor(aligned_end));
  let row_prefix = format!("{}:", metric);

  let rows: Vec<_> = try_join_all(
    ranges
      .iter()
      .map(|(start_key, stop_key)| store.scan(&config.name, start_key, stop_key)),
  )
  .await?
  .into_iter()
  .flatten()
  .collect();
  debug!(
    "Scanned {} rows of {} from table {}",
    rows.len(),
    metric,
    config.name
  );

  let mut slots: Vec<Vec<f64>> = vec![Vec::new(); time_info.num_slots()];
  for (key, row) in rows {
    if !key.starts_with(&row_prefix) {
      continue;
    }
    for (column, value) in row {
      let time = match parse_data_column(&column) {
        Some(time) if time >= aligned_start && time < aligned_end => time,
        _ => continue,
      };
      match value.parse::<f64>() {
        Ok(value) => slots[((time - aligned_start) / step) as usize].push(value),
        Err(_) => debug!("Skipping unparsable value {:?} in {} of {}", value, column, key),
      }
    }
  }

  let values = slots.iter().map(|slot| method.aggregate(slot)).collect();
  Ok(TimeSeriesData::new(time_info, values))
}
