// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Access to the wide-column store that holds the metric tree and the datapoints.
//!
//! The store is modelled after HBase: named tables of rows, each row an ordered map of
//! `family:qualifier` columns to values, with rows sorted lexicographically by key.

pub mod memory;
pub mod rest;
pub mod schema;

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use log::info;

use crate::store::memory::MemoryStore;
use crate::store::rest::RestStore;
use crate::utils::config::{HBaseSettings, StorageType};
use crate::utils::error::GraphiteDBError;
use crate::utils::sync::Arc;

/// Columns of a single row, keyed by `family:qualifier`.
pub type Row = BTreeMap<String, String>;

#[async_trait]
pub trait WideColumnStore: Debug + Send + Sync {
  /// Read a row. Returns None when the row does not exist.
  async fn row(&self, table: &str, key: &str) -> Result<Option<Row>, GraphiteDBError>;

  /// Read all rows with `start_key <= key < stop_key`, in key order.
  async fn scan(
    &self,
    table: &str,
    start_key: &str,
    stop_key: &str,
  ) -> Result<Vec<(String, Row)>, GraphiteDBError>;

  /// Write the given columns into a row, creating it if needed.
  async fn put(&self, table: &str, key: &str, columns: &Row) -> Result<(), GraphiteDBError>;
}

/// Handle to a store backend that applies the configured table prefix.
#[derive(Clone, Debug)]
pub struct Store {
  backend: Arc<dyn WideColumnStore>,
  table_prefix: String,
}

impl Store {
  pub fn new(backend: Arc<dyn WideColumnStore>, table_prefix: &str) -> Self {
    Store {
      backend,
      table_prefix: table_prefix.to_owned(),
    }
  }

  /// Create a store with a fresh in-memory backend and no table prefix.
  pub fn new_in_memory() -> Self {
    Store::new(Arc::new(MemoryStore::new()), "")
  }

  /// Create the backend selected by `storage_type`.
  pub fn from_settings(settings: &HBaseSettings) -> Result<Self, GraphiteDBError> {
    let backend: Arc<dyn WideColumnStore> = match settings.get_storage_type() {
      StorageType::Memory => {
        info!("Using in-memory store");
        Arc::new(MemoryStore::new())
      }
      StorageType::Rest => {
        info!(
          "Using HBase REST gateway at {}:{}",
          settings.get_host(),
          settings.get_port()
        );
        Arc::new(RestStore::new(
          settings.get_host(),
          settings.get_port(),
          settings.get_timeout_seconds(),
        )?)
      }
    };

    Ok(Store::new(backend, settings.get_table_prefix()))
  }

  /// Name of the table as stored in HBase, i.e. with the prefix applied.
  pub fn get_table_name(&self, table: &str) -> String {
    if self.table_prefix.is_empty() {
      table.to_owned()
    } else {
      format!("{}_{}", self.table_prefix, table)
    }
  }

  pub async fn row(&self, table: &str, key: &str) -> Result<Option<Row>, GraphiteDBError> {
    self.backend.row(&self.get_table_name(table), key).await
  }

  pub async fn scan(
    &self,
    table: &str,
    start_key: &str,
    stop_key: &str,
  ) -> Result<Vec<(String, Row)>, GraphiteDBError> {
    self
      .backend
      .scan(&self.get_table_name(table), start_key, stop_key)
      .await
  }

  pub async fn put(&self, table: &str, key: &str, columns: &Row) -> Result<(), GraphiteDBError> {
    self
      .backend
      .put(&self.get_table_name(table), key, columns)
      .await
  }
}
