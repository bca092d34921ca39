// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
/// Enum for various errors in graphitedb.
pub enum GraphiteDBError {
  #[error("Invalid configuration. {0}")]
  InvalidConfiguration(String),

  #[error("Invalid time range. {0}")]
  InvalidTimeRange(String),

  #[error("Invalid interval. Start {0} is after end {1}.")]
  InvalidInterval(u64, u64),

  #[error("Invalid retention. {0}")]
  InvalidRetention(String),

  #[error("Invalid pattern. {0}")]
  InvalidPattern(String),

  #[error("Table {0} not found.")]
  TableNotFound(String),

  #[error("Store Error: {0}")]
  StoreError(String),

  #[error("Json Error: {0}")]
  JsonError(String),

  #[error("Fetch task failed: {0}")]
  FetchTaskFailed(String),

  #[error("All sub-fetches failed for {0}.")]
  AllFetchesFailed(String),
}

impl From<reqwest::Error> for GraphiteDBError {
  fn from(error: reqwest::Error) -> Self {
    GraphiteDBError::StoreError(error.to_string())
  }
}

impl From<serde_json::Error> for GraphiteDBError {
  fn from(error: serde_json::Error) -> Self {
    GraphiteDBError::JsonError(error.to_string())
  }
}

impl From<regex::Error> for GraphiteDBError {
  fn from(error: regex::Error) -> Self {
    GraphiteDBError::InvalidPattern(error.to_string())
  }
}

impl From<base64::DecodeError> for GraphiteDBError {
  fn from(error: base64::DecodeError) -> Self {
    GraphiteDBError::StoreError(format!("Could not decode base64 payload: {}", error))
  }
}

impl From<tokio::task::JoinError> for GraphiteDBError {
  fn from(error: tokio::task::JoinError) -> Self {
    GraphiteDBError::FetchTaskFailed(error.to_string())
  }
}
