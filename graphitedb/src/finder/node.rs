// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use crate::metric::intervals::IntervalSet;
use crate::metric::time_series_data::TimeSeriesData;
use crate::reader::hbase_reader::HBaseReader;
use crate::utils::error::GraphiteDBError;

/// Last component of a dotted path.
fn get_name_from_path(path: &str) -> String {
  path.rsplit('.').next().unwrap_or(path).to_owned()
}

/// A node of the metric tree that has children rather than data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BranchNode {
  path: String,
  name: String,
}

impl BranchNode {
  pub fn new(path: &str) -> Self {
    BranchNode {
      path: path.to_owned(),
      name: get_name_from_path(path),
    }
  }
}

/// A metric: a node with datapoints and a reader for them.
#[derive(Clone, Debug)]
pub struct LeafNode {
  path: String,
  name: String,
  reader: HBaseReader,
}

impl LeafNode {
  pub fn new(path: &str, reader: HBaseReader) -> Self {
    LeafNode {
      path: path.to_owned(),
      name: get_name_from_path(path),
      reader,
    }
  }

  pub fn get_path(&self) -> &str {
    &self.path
  }

  pub fn get_name(&self) -> &str {
    &self.name
  }

  pub fn get_reader(&self) -> &HBaseReader {
    &self.reader
  }

  pub fn get_intervals(&self, now: u64) -> Result<IntervalSet, GraphiteDBError> {
    self.reader.get_intervals(now)
  }

  pub async fn fetch(
    &self,
    start: u64,
    end: u64,
    now: u64,
  ) -> Result<TimeSeriesData, GraphiteDBError> {
    self.reader.fetch(start, end, now).await
  }
}

#[derive(Clone, Debug)]
pub enum Node {
  Branch(BranchNode),
  Leaf(LeafNode),
}

impl Node {
  /// Full dotted path of the node.
  pub fn get_path(&self) -> &str {
    match self {
      Node::Branch(branch) => &branch.path,
      Node::Leaf(leaf) => &leaf.path,
    }
  }

  /// Last component of the path.
  pub fn get_name(&self) -> &str {
    match self {
      Node::Branch(branch) => &branch.name,
      Node::Leaf(leaf) => &leaf.name,
    }
  }

  pub fn is_leaf(&self) -> bool {
    matches!(self, Node::Leaf(_))
  }
}
