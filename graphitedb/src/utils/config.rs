// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

const DEFAULT_CONFIG_FILE_NAME: &str = "default.toml";

/// Backend used to reach the wide-column store.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
  /// In-process tables. Useful for tests and local development.
  Memory,

  /// HBase REST gateway.
  Rest,
}

#[derive(Debug, Deserialize)]
/// Settings for the HBase connection.
pub struct HBaseSettings {
  storage_type: StorageType,
  host: String,
  port: u16,
  table_prefix: String,
  meta_table: String,
  timeout_seconds: u64,
}

impl HBaseSettings {
  /// Get the storage type.
  pub fn get_storage_type(&self) -> StorageType {
    self.storage_type
  }

  /// Get the host of the HBase REST gateway.
  pub fn get_host(&self) -> &str {
    self.host.as_str()
  }

  /// Get the port of the HBase REST gateway.
  pub fn get_port(&self) -> u16 {
    self.port
  }

  /// Get the prefix prepended to every table name.
  pub fn get_table_prefix(&self) -> &str {
    self.table_prefix.as_str()
  }

  /// Get the name of the table holding the metric tree.
  pub fn get_meta_table(&self) -> &str {
    self.meta_table.as_str()
  }

  pub fn get_timeout_seconds(&self) -> u64 {
    self.timeout_seconds
  }

  pub fn get_default_config_file_name() -> &'static str {
    DEFAULT_CONFIG_FILE_NAME
  }
}

#[derive(Debug, Deserialize)]
/// Settings for graphitedb, read from config file.
pub struct Settings {
  hbase: HBaseSettings,
}

impl Settings {
  /// Create Settings from given configuration directory path.
  pub fn new(config_dir_path: &str) -> Result<Self, ConfigError> {
    let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
    let config_default_file_name = format!("{}/{}", config_dir_path, DEFAULT_CONFIG_FILE_NAME);
    let config_environment_file_name = format!("{}/{}.toml", config_dir_path, run_mode);

    let config = Config::builder()
      // Start off by merging in the "default" configuration file
      .add_source(File::with_name(&config_default_file_name))
      // Add in the current environment file
      // Default to 'development' env
      // Note that this file is _optional_
      .add_source(File::with_name(&config_environment_file_name).required(false))
      // Add in settings from the environment, e.g. GRAPHITE_HBASE__HOST
      .add_source(
        Environment::with_prefix("graphite")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?;

    config.try_deserialize()
  }

  /// Get HBase settings.
  pub fn get_hbase_settings(&self) -> &HBaseSettings {
    &self.hbase
  }
}

/// Initialize env_logger for tests. Safe to call more than once.
pub fn config_test_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::fs::File;
  use std::io::Write;

  use tempdir::TempDir;

  use crate::utils::io::get_joined_path;

  #[test]
  fn test_settings() {
    let config_dir = TempDir::new("config_test").unwrap();
    let config_dir_path = config_dir.path().to_str().unwrap();

    // Reading from an empty directory should be an error.
    assert!(Settings::new(config_dir_path).is_err());

    let config_file_path = get_joined_path(config_dir_path, DEFAULT_CONFIG_FILE_NAME);
    {
      let mut file = File::create(&config_file_path).unwrap();
      file.write_all(b"[hbase]\n").unwrap();
      file.write_all(b"storage_type = \"rest\"\n").unwrap();
      file.write_all(b"host = \"hbase-rest\"\n").unwrap();
      file.write_all(b"port = 8080\n").unwrap();
      file.write_all(b"table_prefix = \"graphite\"\n").unwrap();
      file.write_all(b"meta_table = \"meta\"\n").unwrap();
      file.write_all(b"timeout_seconds = 30\n").unwrap();
    }

    let settings = Settings::new(config_dir_path).unwrap();
    let hbase_settings = settings.get_hbase_settings();
    assert_eq!(hbase_settings.get_storage_type(), StorageType::Rest);
    assert_eq!(hbase_settings.get_host(), "hbase-rest");
    assert_eq!(hbase_settings.get_port(), 8080);
    assert_eq!(hbase_settings.get_table_prefix(), "graphite");
    assert_eq!(hbase_settings.get_meta_table(), "meta");
    assert_eq!(hbase_settings.get_timeout_seconds(), 30);
  }

  #[test]
  fn test_invalid_storage_type() {
    let config_dir = TempDir::new("config_test").unwrap();
    let config_dir_path = config_dir.path().to_str().unwrap();

    let config_file_path = get_joined_path(config_dir_path, DEFAULT_CONFIG_FILE_NAME);
    {
      let mut file = File::create(&config_file_path).unwrap();
      file.write_all(b"[hbase]\n").unwrap();
      file.write_all(b"storage_type = \"thrift\"\n").unwrap();
      file.write_all(b"host = \"localhost\"\n").unwrap();
      file.write_all(b"port = 8080\n").unwrap();
      file.write_all(b"table_prefix = \"\"\n").unwrap();
      file.write_all(b"meta_table = \"meta\"\n").unwrap();
      file.write_all(b"timeout_seconds = 30\n").unwrap();
    }

    assert!(Settings::new(config_dir_path).is_err());
  }
}
