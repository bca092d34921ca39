// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;

use crate::store::{Row, WideColumnStore};
use crate::utils::error::GraphiteDBError;
use crate::utils::sync::{Arc, RwLock};

type Table = BTreeMap<String, Row>;

/// In-process wide-column store. Tables are created on first write; reading a table that was
/// never written behaves like reading an empty table.
#[derive(Debug, Default)]
pub struct MemoryStore {
  tables: DashMap<String, Arc<RwLock<Table>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    MemoryStore {
      tables: DashMap::new(),
    }
  }

  fn get_table(&self, table: &str) -> Option<Arc<RwLock<Table>>> {
    self.tables.get(table).map(|entry| entry.value().clone())
  }
}

#[async_trait]
impl WideColumnStore for MemoryStore {
  async fn row(&self, table: &str, key: &str) -> Result<Option<Row>, GraphiteDBError> {
    Ok(
      self
        .get_table(table)
        .and_then(|rows| rows.read().get(key).cloned()),
    )
  }

  async fn scan(
    &self,
    table: &str,
    start_key: &str,
    stop_key: &str,
  ) -> Result<Vec<(String, Row)>, GraphiteDBError> {
    // BTreeMap::range panics on an inverted range.
    if start_key >= stop_key {
      return Ok(Vec::new());
    }

    let rows = match self.get_table(table) {
      Some(rows) => rows,
      None => {
        debug!("Scanning table {} that was never written", table);
        return Ok(Vec::new());
      }
    };

    let rows = rows.read();
    Ok(
      rows
        .range::<str, _>((Bound::Included(start_key), Bound::Excluded(stop_key)))
        .map(|(key, row)| (key.clone(), row.clone()))
        .collect(),
    )
  }

  async fn put(&self, table: &str, key: &str, columns: &Row) -> Result<(), GraphiteDBError> {
    let rows = self
      .tables
      .entry(table.to_owned())
      .or_default()
      .value()
      .clone();

    let mut rows = rows.write();
    rows
      .entry(key.to_owned())
      .or_default()
      .extend(columns.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(())
  }
}
