// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Client for the HBase REST gateway ("Stargate").
//!
//! Rows, columns and values travel base64-encoded inside `CellSet` JSON documents. Scans go
//! through a scanner resource: it is created with a POST, drained with GETs until the gateway
//! answers `204 No Content`, and deleted afterwards.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, warn};
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::store::{Row, WideColumnStore};
use crate::utils::error::GraphiteDBError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Maximum number of cells returned per scanner GET.
const SCANNER_BATCH: u32 = 1000;

#[derive(Debug, Default, Deserialize, Serialize)]
struct CellSet {
  #[serde(rename = "Row", default)]
  rows: Vec<CellSetRow>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CellSetRow {
  key: String,
  #[serde(rename = "Cell", default)]
  cells: Vec<Cell>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Cell {
  column: String,
  #[serde(rename = "$")]
  value: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  timestamp: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ScannerSpec {
  #[serde(rename = "startRow")]
  start_row: String,
  #[serde(rename = "endRow")]
  end_row: String,
  batch: u32,
}

fn decode_base64(encoded: &str) -> Result<String, GraphiteDBError> {
  let bytes = STANDARD.decode(encoded)?;
  String::from_utf8(bytes)
    .map_err(|e| GraphiteDBError::StoreError(format!("Non utf-8 payload from HBase: {}", e)))
}

/// Decode a CellSet into (row key, columns) pairs, in the order received.
fn decode_cell_set(cell_set: CellSet) -> Result<Vec<(String, Row)>, GraphiteDBError> {
  cell_set
    .rows
    .into_iter()
    .map(|row| {
      let key = decode_base64(&row.key)?;
      let columns = row
        .cells
        .into_iter()
        .map(|cell| Ok((decode_base64(&cell.column)?, decode_base64(&cell.value)?)))
        .collect::<Result<Row, GraphiteDBError>>()?;
      Ok((key, columns))
    })
    .collect()
}

fn encode_row(key: &str, columns: &Row) -> CellSet {
  let cells = columns
    .iter()
    .map(|(column, value)| Cell {
      column: STANDARD.encode(column),
      value: STANDARD.encode(value),
      timestamp: None,
    })
    .collect();

  CellSet {
    rows: vec![CellSetRow {
      key: STANDARD.encode(key),
      cells,
    }],
  }
}

/// Wide-column store backed by an HBase REST gateway.
#[derive(Debug, Clone)]
pub struct RestStore {
  client: Client,
  base_url: Url,
}

impl RestStore {
  pub fn new(host: &str, port: u16, timeout_seconds: u64) -> Result<Self, GraphiteDBError> {
    let base_url = Url::parse(&format!("http://{}:{}/", host, port))
      .map_err(|e| GraphiteDBError::InvalidConfiguration(format!("Invalid HBase host: {}", e)))?;
    let client = Client::builder()
      .timeout(Duration::from_secs(timeout_seconds))
      .build()?;

    Ok(RestStore { client, base_url })
  }

  /// Build a URL from path segments; each segment is percent-encoded.
  fn get_url(&self, segments: &[&str]) -> Result<Url, GraphiteDBError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| GraphiteDBError::InvalidConfiguration("Invalid HBase base url".to_owned()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  /// Drain a scanner into `rows`. Cells of one row may span several batches.
  async fn drain_scanner(
    &self,
    location: &str,
    rows: &mut BTreeMap<String, Row>,
  ) -> Result<(), GraphiteDBError> {
    loop {
      let response = self
        .client
        .get(location)
        .header(ACCEPT, JSON_CONTENT_TYPE)
        .send()
        .await?;

      match response.status() {
        StatusCode::NO_CONTENT => return Ok(()),
        status if status.is_success() => {
          let cell_set: CellSet = response.json().await?;
          for (key, columns) in decode_cell_set(cell_set)? {
            rows.entry(key).or_default().extend(columns);
          }
        }
        status => {
          return Err(GraphiteDBError::StoreError(format!(
            "Scanner {} returned {}",
            location, status
          )))
        }
      }
    }
  }
}

#[async_trait]
impl WideColumnStore for RestStore {
  async fn row(&self, table: &str, key: &str) -> Result<Option<Row>, GraphiteDBError> {
    let url = self.get_url(&[table, key])?;
    let response = self
      .client
      .get(url)
      .header(ACCEPT, JSON_CONTENT_TYPE)
      .send()
      .await?;

    match response.status() {
      StatusCode::NOT_FOUND => Ok(None),
      status if status.is_success() => {
        let cell_set: CellSet = response.json().await?;
        Ok(decode_cell_set(cell_set)?.pop().map(|(_, columns)| columns))
      }
      status => Err(GraphiteDBError::StoreError(format!(
        "Reading row {} from table {} returned {}",
        key, table, status
      ))),
    }
  }

  async fn scan(
    &self,
    table: &str,
    start_key: &str,
    stop_key: &str,
  ) -> Result<Vec<(String, Row)>, GraphiteDBError> {
    let spec = ScannerSpec {
      start_row: STANDARD.encode(start_key),
      end_row: STANDARD.encode(stop_key),
      batch: SCANNER_BATCH,
    };

    let response = self
      .client
      .post(self.get_url(&[table, "scanner"])?)
      .header(ACCEPT, JSON_CONTENT_TYPE)
      .json(&spec)
      .send()
      .await?;

    let location = match response.status() {
      StatusCode::NOT_FOUND => return Err(GraphiteDBError::TableNotFound(table.to_owned())),
      status if status.is_success() => response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| {
          GraphiteDBError::StoreError(format!("Scanner on table {} has no location", table))
        })?,
      status => {
        return Err(GraphiteDBError::StoreError(format!(
          "Creating scanner on table {} returned {}",
          table, status
        )))
      }
    };
    debug!("Created scanner {} on table {}", location, table);

    let mut rows = BTreeMap::new();
    let result = self.drain_scanner(&location, &mut rows).await;

    // Scanners hold server-side resources until deleted or expired.
    if let Err(e) = self.client.delete(&location).send().await {
      warn!("Could not delete scanner {}: {}", location, e);
    }

    result?;
    Ok(rows.into_iter().collect())
  }

  async fn put(&self, table: &str, key: &str, columns: &Row) -> Result<(), GraphiteDBError> {
    if columns.is_empty() {
      return Ok(());
    }

    let response = self
      .client
      .put(self.get_url(&[table, key])?)
      .header(ACCEPT, JSON_CONTENT_TYPE)
      .json(&encode_row(key, columns))
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(GraphiteDBError::StoreError(format!(
        "Writing row {} to table {} returned {}",
        key, table, status
      )));
    }
    Ok(())
  }
}
