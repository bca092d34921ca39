// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! The read path: datapoints of a leaf from its retention tier tables.

pub mod hbase_reader;
pub mod multi_reader;
