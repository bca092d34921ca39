// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, error, warn};

use crate::finder::node::{BranchNode, LeafNode, Node};
use crate::finder::pattern::{cheaper_patterns, is_pattern, match_entries};
use crate::finder::FindQuery;
use crate::metric::intervals::{Interval, IntervalSet};
use crate::metric::retention::{parse_retentions, AggregationMethod};
use crate::reader::hbase_reader::HBaseReader;
use crate::store::schema::{
  get_child_links, is_leaf_row, AGG_COLUMN, AGG_METHOD_COLUMN, ROOT_NODE,
};
use crate::store::{Row, Store};
use crate::utils::error::GraphiteDBError;

/// Finds nodes of the metric tree stored in the meta table.
#[derive(Clone, Debug)]
pub struct HBaseFinder {
  store: Store,
  meta_table: String,
}

impl HBaseFinder {
  pub fn new(store: Store, meta_table: &str) -> Self {
    HBaseFinder {
      store,
      meta_table: meta_table.to_owned(),
    }
  }

  /// Find the nodes matching the query, sorted by path.
  pub async fn find_nodes(&self, query: &FindQuery) -> Result<Vec<Node>, GraphiteDBError> {
    let now = Utc::now().timestamp() as u64;
    self.find_nodes_at(query, now).await
  }

  /// Like `find_nodes`, with leaf intervals computed relative to `now`.
  pub async fn find_nodes_at(
    &self,
    query: &FindQuery,
    now: u64,
  ) -> Result<Vec<Node>, GraphiteDBError> {
    let mut parts: Vec<String> = query
      .get_pattern()
      .split('.')
      .map(str::to_owned)
      .collect();
    if parts.first().map(String::as_str) == Some(ROOT_NODE) {
      parts.remove(0);
    }

    let mut nodes = BTreeMap::new();
    if parts.is_empty() {
      // A bare "ROOT" lists the top of the tree.
      self
        .find_paths(ROOT_NODE, &["*".to_owned()], &mut nodes)
        .await?;
    } else {
      let parts = cheaper_patterns(parts);
      if is_pattern(&parts[0]) {
        self.find_paths(ROOT_NODE, &parts, &mut nodes).await?;
      } else if parts.len() == 1 {
        // Fully literal path: at most the node itself.
        if let Some(row) = self.get_row(&parts[0]).await {
          if let Some(node) = self.build_node(&parts[0], &row) {
            nodes.insert(parts[0].clone(), node);
          }
        }
      } else {
        self.find_paths(&parts[0], &parts[1..], &mut nodes).await?;
      }
    }

    let mut nodes: Vec<Node> = nodes.into_values().collect();
    if let (Some(start), Some(end)) = (query.get_start_time(), query.get_end_time()) {
      let range = IntervalSet::from(
        Interval::new(start, end)
          .map_err(|_| GraphiteDBError::InvalidTimeRange(format!("{} is after {}", start, end)))?,
      );
      nodes.retain(|node| match node {
        Node::Branch(_) => true,
        Node::Leaf(leaf) => leaf
          .get_intervals(now)
          .map(|intervals| !intervals.intersect(&range).is_empty())
          .unwrap_or(false),
      });
    }

    debug!(
      "Found {} nodes for pattern {}",
      nodes.len(),
      query.get_pattern()
    );
    Ok(nodes)
  }

  /// Walk down from `start_key`, matching one pattern per level. Nodes matched by the last
  /// pattern are collected; earlier patterns only descend into branches.
  async fn find_paths(
    &self,
    start_key: &str,
    patterns: &[String],
    nodes: &mut BTreeMap<String, Node>,
  ) -> Result<(), GraphiteDBError> {
    let start_row = match self.get_row(start_key).await {
      Some(row) => row,
      None => return Ok(()),
    };

    let mut pending: Vec<(Row, usize)> = vec![(start_row, 0)];
    while let Some((row, depth)) = pending.pop() {
      let children: BTreeMap<&str, &str> = get_child_links(&row).into_iter().collect();
      let names: Vec<&str> = children.keys().copied().collect();
      let is_last = depth + 1 == patterns.len();

      for name in match_entries(&names, &patterns[depth])? {
        let child_key = children[name.as_str()];
        let child_row = match self.get_row(child_key).await {
          Some(child_row) => child_row,
          None => continue,
        };

        if is_last {
          if let Some(node) = self.build_node(child_key, &child_row) {
            nodes.insert(child_key.to_owned(), node);
          }
        } else if !is_leaf_row(&child_row) {
          // Leaves can't match when there are more components to go.
          pending.push((child_row, depth + 1));
        }
      }
    }
    Ok(())
  }

  /// Read a meta row. Missing, empty and unreadable rows are all None.
  async fn get_row(&self, key: &str) -> Option<Row> {
    match self.store.row(&self.meta_table, key).await {
      Ok(Some(row)) if !row.is_empty() => Some(row),
      Ok(_) => None,
      Err(e) => {
        warn!("Could not read meta row {}: {}", key, e);
        None
      }
    }
  }

  fn build_node(&self, path: &str, row: &Row) -> Option<Node> {
    if !is_leaf_row(row) {
      return Some(Node::Branch(BranchNode::new(path)));
    }

    let retentions = match row.get(AGG_COLUMN).map(|json| parse_retentions(json)) {
      Some(Ok(retentions)) => retentions,
      Some(Err(e)) => {
        error!("Skipping leaf {} with malformed retentions: {}", path, e);
        return None;
      }
      None => {
        error!("Skipping leaf {} without retentions", path);
        return None;
      }
    };
    let method = AggregationMethod::from_method_name(
      row.get(AGG_METHOD_COLUMN).map(String::as_str).unwrap_or(""),
    );

    let reader = HBaseReader::new(self.store.clone(), path, retentions, method);
    Some(Node::Leaf(LeafNode::new(path, reader)))
  }
}

#[cfg(test)]
mod tests {
  use test_case::test_case;

  use super::*;
  use crate::metric::retention::Retention;
  use crate::store::schema::{write_metric_metadata, NODE_COLUMN};

  const META: &str = "meta";
  const NOW: u64 = 1_699_999_200;

  const METRICS: [&str; 6] = [
    "servers.web01.cpu",
    "servers.web01.mem",
    "servers.web02.cpu",
    "servers.db01.cpu",
    "servers.db01.disk.sda",
    "apps.api.qps",
  ];

  async fn create_finder() -> HBaseFinder {
    let store = Store::new_in_memory();
    let retentions = vec![
      Retention::new(60, 1440).unwrap(),
      Retention::new(300, 2016).unwrap(),
    ];
    for metric in METRICS {
      write_metric_metadata(&store, META, metric, &retentions, AggregationMethod::Max)
        .await
        .unwrap();
    }
    HBaseFinder::new(store, META)
  }

  async fn find_paths(finder: &HBaseFinder, pattern: &str) -> Vec<(String, bool)> {
    finder
      .find_nodes_at(&FindQuery::new(pattern, None, None), NOW)
      .await
      .unwrap()
      .iter()
      .map(|node| (node.get_path().to_owned(), node.is_leaf()))
      .collect()
  }

  fn expected(paths: &[(&str, bool)]) -> Vec<(String, bool)> {
    paths.iter().map(|(p, l)| (p.to_string(), *l)).collect()
  }

  #[test_case("*", &[("apps", false), ("servers", false)]; "top level")]
  #[test_case("ROOT", &[("apps", false), ("servers", false)]; "root")]
  #[test_case("servers.*", &[("servers.db01", false), ("servers.web01", false), ("servers.web02", false)]; "children")]
  #[test_case("servers.web*.cpu", &[("servers.web01.cpu", true), ("servers.web02.cpu", true)]; "glob in the middle")]
  #[test_case("*.*.cpu", &[("servers.db01.cpu", true), ("servers.web01.cpu", true), ("servers.web02.cpu", true)]; "leading glob")]
  #[test_case("ROOT.servers.web01.*", &[("servers.web01.cpu", true), ("servers.web01.mem", true)]; "explicit root")]
  #[test_case("servers.{web01,db01}.cpu", &[("servers.db01.cpu", true), ("servers.web01.cpu", true)]; "alternatives")]
  #[test_case("servers.web0[2].*", &[("servers.web02.cpu", true)]; "class")]
  #[test_case("servers.db01.*", &[("servers.db01.cpu", true), ("servers.db01.disk", false)]; "mixed leaves and branches")]
  #[test_case("servers.*.disk.*", &[("servers.db01.disk.sda", true)]; "deep")]
  #[test_case("servers.web01.cpu", &[("servers.web01.cpu", true)]; "exact leaf")]
  #[test_case("servers.web01", &[("servers.web01", false)]; "exact branch")]
  #[test_case("servers.web01.cpu.*", &[]; "below a leaf")]
  #[test_case("servers.web01.cpu.x", &[]; "missing exact path")]
  #[test_case("nothing.*", &[]; "missing branch")]
  #[test_case("", &[]; "empty pattern")]
  fn test_find_nodes(pattern: &str, expected_paths: &[(&str, bool)]) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
      let finder = create_finder().await;
      assert_eq!(find_paths(&finder, pattern).await, expected(expected_paths));
    });
  }

  #[tokio::test]
  async fn test_leaf_reader() {
    let finder = create_finder().await;
    let nodes = finder
      .find_nodes_at(&FindQuery::new("apps.api.qps", None, None), NOW)
      .await
      .unwrap();
    assert_eq!(nodes.len(), 1);

    match &nodes[0] {
      Node::Leaf(leaf) => {
        assert_eq!(leaf.get_name(), "qps");
        let reader = leaf.get_reader();
        assert_eq!(reader.get_metric(), "apps.api.qps");
        assert_eq!(reader.get_retentions().len(), 2);
        assert_eq!(reader.get_method(), AggregationMethod::Max);
      }
      Node::Branch(_) => panic!("Expected a leaf"),
    }
  }

  #[tokio::test]
  async fn test_time_range_filters_leaves() {
    let finder = create_finder().await;

    // Leaves retain 60*1440 + 300*2016 seconds back from now.
    let recent = FindQuery::new("servers.web01.*", Some(NOW - 3600), Some(NOW));
    assert_eq!(finder.find_nodes_at(&recent, NOW).await.unwrap().len(), 2);

    let ancient = FindQuery::new("servers.web01.*", Some(0), Some(1000));
    assert!(finder.find_nodes_at(&ancient, NOW).await.unwrap().is_empty());

    // Branches are not filtered.
    let branches = FindQuery::new("servers.*", Some(0), Some(1000));
    assert_eq!(finder.find_nodes_at(&branches, NOW).await.unwrap().len(), 3);

    let inverted = FindQuery::new("servers.*", Some(1000), Some(0));
    assert!(matches!(
      finder.find_nodes_at(&inverted, NOW).await,
      Err(GraphiteDBError::InvalidTimeRange(_))
    ));
  }

  #[tokio::test]
  async fn test_malformed_leaf_is_skipped() {
    let finder = create_finder().await;

    let mut broken = Row::new();
    broken.insert(NODE_COLUMN.to_owned(), "1".to_owned());
    broken.insert(AGG_COLUMN.to_owned(), "not json".to_owned());
    finder
      .store
      .put(META, "servers.web01.mem", &broken)
      .await
      .unwrap();

    assert_eq!(
      find_paths(&finder, "servers.web01.*").await,
      expected(&[("servers.web01.cpu", true)])
    );
  }

  #[tokio::test]
  async fn test_overflowing_retention_is_skipped() {
    let finder = create_finder().await;

    let mut broken = Row::new();
    broken.insert(NODE_COLUMN.to_owned(), "1".to_owned());
    broken.insert(
      AGG_COLUMN.to_owned(),
      "[[18446744073709551615, 2]]".to_owned(),
    );
    finder
      .store
      .put(META, "servers.web02.cpu", &broken)
      .await
      .unwrap();

    let query = FindQuery::new("servers.*.cpu", Some(NOW - 3600), Some(NOW));
    let paths: Vec<String> = finder
      .find_nodes_at(&query, NOW)
      .await
      .unwrap()
      .iter()
      .map(|node| node.get_path().to_owned())
      .collect();
    assert_eq!(paths, vec!["servers.db01.cpu", "servers.web01.cpu"]);
  }

  #[tokio::test]
  async fn test_dangling_child_link_is_skipped() {
    let finder = create_finder().await;

    let mut link = Row::new();
    link.insert("t::c_ghost".to_owned(), "servers.ghost".to_owned());
    finder.store.put(META, "servers", &link).await.unwrap();

    assert_eq!(
      find_paths(&finder, "servers.*").await,
      expected(&[
        ("servers.db01", false),
        ("servers.web01", false),
        ("servers.web02", false)
      ])
    );
  }
}
