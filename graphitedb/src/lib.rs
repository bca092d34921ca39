// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

pub mod finder;
pub mod metric;
pub mod reader;
pub mod store;
pub mod utils;

use std::collections::BTreeMap;

use ::log::{debug, info};
use chrono::Utc;
use futures::future::join_all;

use crate::finder::hbase_finder::HBaseFinder;
use crate::finder::node::{LeafNode, Node};
use crate::finder::FindQuery;
use crate::metric::time_series_data::TimeSeriesData;
use crate::reader::multi_reader::MultiReader;
use crate::store::Store;
use crate::utils::config::Settings;
use crate::utils::error::GraphiteDBError;

/// Graphite storage backed by HBase: finds metrics in the metric tree and reads their
/// datapoints.
#[derive(Debug)]
pub struct GraphiteDB {
  settings: Settings,
  store: Store,
  finder: HBaseFinder,
}

impl GraphiteDB {
  /// Create a new GraphiteDB from the configuration in the given directory.
  pub fn new(config_dir_path: &str) -> Result<Self, GraphiteDBError> {
    let settings = Settings::new(config_dir_path)
      .map_err(|e| GraphiteDBError::InvalidConfiguration(e.to_string()))?;

    let hbase_settings = settings.get_hbase_settings();
    let store = Store::from_settings(hbase_settings)?;
    let finder = HBaseFinder::new(store.clone(), hbase_settings.get_meta_table());
    info!(
      "Created GraphiteDB with meta table {}",
      store.get_table_name(hbase_settings.get_meta_table())
    );

    Ok(GraphiteDB {
      settings,
      store,
      finder,
    })
  }

  /// Get the settings for this GraphiteDB.
  pub fn get_settings(&self) -> &Settings {
    &self.settings
  }

  /// Get the store holding the metric tree and the datapoints.
  pub fn get_store(&self) -> &Store {
    &self.store
  }

  /// Find the nodes matching the query.
  pub async fn find_nodes(&self, query: &FindQuery) -> Result<Vec<Node>, GraphiteDBError> {
    debug!("Finding nodes for {:?}", query);
    self.finder.find_nodes(query).await
  }

  /// Expand a pattern to the sorted paths of all matching nodes.
  pub async fn expand(&self, pattern: &str) -> Result<Vec<String>, GraphiteDBError> {
    let nodes = self.find_nodes(&FindQuery::new(pattern, None, None)).await?;
    Ok(
      nodes
        .iter()
        .map(|node| node.get_path().to_owned())
        .collect(),
    )
  }

  /// Fetch every metric matching the pattern over [start, end]. Leaves found under the same
  /// path are read together and merged. Results are sorted by path.
  pub async fn fetch(
    &self,
    pattern: &str,
    start: u64,
    end: u64,
  ) -> Result<Vec<(String, TimeSeriesData)>, GraphiteDBError> {
    let now = Utc::now().timestamp() as u64;
    self.fetch_at(pattern, start, end, now).await
  }

  /// Like `fetch`, with retention tiers laid out back from `now`.
  pub async fn fetch_at(
    &self,
    pattern: &str,
    start: u64,
    end: u64,
    now: u64,
  ) -> Result<Vec<(String, TimeSeriesData)>, GraphiteDBError> {
    let query = FindQuery::new(pattern, Some(start), Some(end));
    let nodes = self.finder.find_nodes_at(&query, now).await?;

    let mut leaves: BTreeMap<String, Vec<LeafNode>> = BTreeMap::new();
    for node in nodes {
      if let Node::Leaf(leaf) = node {
        leaves
          .entry(leaf.get_path().to_owned())
          .or_default()
          .push(leaf);
      }
    }

    let readers: Vec<(String, MultiReader)> = leaves
      .into_iter()
      .map(|(path, nodes)| (path, MultiReader::new(nodes)))
      .collect();
    let results = join_all(
      readers
        .iter()
        .map(|(_, reader)| reader.fetch(start, end, now)),
    )
    .await;

    let mut series = Vec::with_capacity(readers.len());
    for ((path, _), result) in readers.into_iter().zip(results) {
      series.push((path, result?));
    }
    debug!("Fetched {} series for pattern {}", series.len(), pattern);
    Ok(series)
  }
}

#[cfg(test)]
mod tests {
  use std::fs::File;
  use std::io::Write;

  use tempdir::TempDir;

  use super::*;
  use crate::metric::metric_point::MetricPoint;
  use crate::metric::retention::{AggregationMethod, Retention};
  use crate::store::schema::{write_metric_metadata, write_points};
  use crate::utils::config::{config_test_logger, HBaseSettings};
  use crate::utils::io::get_joined_path;

  const NOW: u64 = 1_699_999_200;

  /// Helper function to create a test configuration.
  fn create_test_config(config_dir_path: &str) {
    let config_file_path = get_joined_path(
      config_dir_path,
      HBaseSettings::get_default_config_file_name(),
    );

    let mut file = File::create(config_file_path).unwrap();
    file.write_all(b"[hbase]\n").unwrap();
    file.write_all(b"storage_type = \"memory\"\n").unwrap();
    file.write_all(b"host = \"localhost\"\n").unwrap();
    file.write_all(b"port = 8080\n").unwrap();
    file.write_all(b"table_prefix = \"test\"\n").unwrap();
    file.write_all(b"meta_table = \"meta\"\n").unwrap();
    file.write_all(b"timeout_seconds = 5\n").unwrap();
  }

  async fn create_test_db(config_dir: &TempDir) -> GraphiteDB {
    config_test_logger();
    let config_dir_path = config_dir.path().to_str().unwrap();
    create_test_config(config_dir_path);
    let db = GraphiteDB::new(config_dir_path).expect("Could not create GraphiteDB");

    let retentions = vec![Retention::new(60, 60).unwrap()];
    for (metric, value) in [("servers.web01.cpu", 1.0), ("servers.web02.cpu", 2.0)] {
      write_metric_metadata(
        db.get_store(),
        "meta",
        metric,
        &retentions,
        AggregationMethod::Average,
      )
      .await
      .unwrap();
      let points = vec![
        MetricPoint::new(NOW - 120, value),
        MetricPoint::new(NOW - 60, value * 10.0),
      ];
      write_points(db.get_store(), metric, &retentions, 60, &points)
        .await
        .unwrap();
    }
    db
  }

  #[tokio::test]
  async fn test_basic() {
    let config_dir = TempDir::new("config_test").unwrap();
    let db = create_test_db(&config_dir).await;
    assert_eq!(db.get_store().get_table_name("meta"), "test_meta");
    assert_eq!(db.get_settings().get_hbase_settings().get_meta_table(), "meta");

    assert_eq!(db.expand("*").await.unwrap(), vec!["servers"]);
    assert_eq!(
      db.expand("servers.*.cpu").await.unwrap(),
      vec!["servers.web01.cpu", "servers.web02.cpu"]
    );

    let series = db
      .fetch_at("servers.*.cpu", NOW - 180, NOW, NOW)
      .await
      .unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].0, "servers.web01.cpu");
    assert_eq!(series[0].1.get_values(), &[None, Some(1.0), Some(10.0)]);
    assert_eq!(series[1].0, "servers.web02.cpu");
    assert_eq!(series[1].1.get_values(), &[None, Some(2.0), Some(20.0)]);
  }

  #[tokio::test]
  async fn test_fetch_edge_cases() {
    let config_dir = TempDir::new("config_test").unwrap();
    let db = create_test_db(&config_dir).await;

    // Branches have no data.
    assert!(db
      .fetch_at("servers.*", NOW - 180, NOW, NOW)
      .await
      .unwrap()
      .is_empty());

    // Outside the retention window nothing is found.
    assert!(db.fetch_at("servers.*.cpu", 0, 600, NOW).await.unwrap().is_empty());

    assert!(matches!(
      db.fetch_at("servers.*.cpu", NOW, NOW - 180, NOW).await,
      Err(GraphiteDBError::InvalidTimeRange(_))
    ));
  }

  #[test]
  fn test_missing_config() {
    let config_dir = TempDir::new("config_test").unwrap();
    let config_dir_path = config_dir.path().to_str().unwrap();
    assert!(matches!(
      GraphiteDB::new(config_dir_path),
      Err(GraphiteDBError::InvalidConfiguration(_))
    ));
  }
}
