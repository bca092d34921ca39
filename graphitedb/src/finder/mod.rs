// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! The search path: from a Graphite pattern such as `servers.web*.cpu` to the matching nodes
//! of the metric tree stored in the meta table.

pub mod hbase_finder;
pub mod node;
pub mod pattern;

/// A search for nodes. When both times are set, leaves without data in that range are left out.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FindQuery {
  pattern: String,
  start_time: Option<u64>,
  end_time: Option<u64>,
}

impl FindQuery {
  pub fn new(pattern: &str, start_time: Option<u64>, end_time: Option<u64>) -> Self {
    FindQuery {
      pattern: pattern.to_owned(),
      start_time,
      end_time,
    }
  }

  pub fn get_pattern(&self) -> &str {
    &self.pattern
  }

  pub fn get_start_time(&self) -> Option<u64> {
    self.start_time
  }

  pub fn get_end_time(&self) -> Option<u64> {
    self.end_time
  }
}
