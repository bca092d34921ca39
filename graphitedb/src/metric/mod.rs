// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Metric value types shared by the finder and the readers.
//!
//! A metric is stored in several retention tiers, each with its own resolution. Fetching a
//! metric yields a fixed-step [time series](time_series_data::TimeSeriesData); series from
//! different tiers are merged so that finer data always wins over coarser data.

pub mod intervals;
pub mod metric_point;
pub mod retention;
pub mod time_series_data;
