// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Utilities for managing GraphiteDB.

pub(crate) mod sync;

pub mod config;
pub mod environment;
pub mod error;
pub mod io;
pub mod request;
