// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use serde::{Deserialize, Serialize};

use crate::utils::error::GraphiteDBError;

/// One retention tier of a metric: `points` datapoints, each covering `seconds_per_point`.
///
/// Serialized as a `[seconds_per_point, points]` pair, which is how the tiers are stored in the
/// `t::AGG` column of the meta table.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "(u64, u64)", into = "(u64, u64)")]
pub struct Retention {
  seconds_per_point: u64,
  points: u64,
}

impl Retention {
  pub fn new(seconds_per_point: u64, points: u64) -> Result<Self, GraphiteDBError> {
    if seconds_per_point == 0 || points == 0 {
      return Err(GraphiteDBError::InvalidRetention(format!(
        "{}:{} - both values must be positive",
        seconds_per_point, points
      )));
    }
    if seconds_per_point.checked_mul(points).is_none() {
      return Err(GraphiteDBError::InvalidRetention(format!(
        "{}:{} - covers more seconds than fit in a timestamp",
        seconds_per_point, points
      )));
    }

    Ok(Retention {
      seconds_per_point,
      points,
    })
  }

  pub fn get_seconds_per_point(&self) -> u64 {
    self.seconds_per_point
  }

  pub fn get_points(&self) -> u64 {
    self.points
  }

  /// Number of seconds covered by this tier.
  pub fn duration(&self) -> u64 {
    self.seconds_per_point * self.points
  }
}

impl TryFrom<(u64, u64)> for Retention {
  type Error = GraphiteDBError;

  fn try_from((seconds_per_point, points): (u64, u64)) -> Result<Self, Self::Error> {
    Retention::new(seconds_per_point, points)
  }
}

impl From<Retention> for (u64, u64) {
  fn from(retention: Retention) -> Self {
    (retention.seconds_per_point, retention.points)
  }
}

/// Parse the retentions stored for a leaf, e.g. `[[60, 1440], [300, 2016]]`. Tiers must be
/// listed finest first.
pub fn parse_retentions(json: &str) -> Result<Vec<Retention>, GraphiteDBError> {
  let retentions: Vec<Retention> = serde_json::from_str(json)?;
  if retentions.is_empty() {
    return Err(GraphiteDBError::InvalidRetention(
      "at least one retention is required".to_owned(),
    ));
  }
  Ok(retentions)
}

/// How datapoints that fall into the same slot are combined.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AggregationMethod {
  #[default]
  Average,
  Sum,
  Min,
  Max,
  Last,
}

impl AggregationMethod {
  /// Lenient parse of the `t::AGG_METHOD` column. Anything unrecognized averages.
  pub fn from_method_name(name: &str) -> Self {
    let name = name.to_ascii_lowercase();
    if name.contains("max") {
      AggregationMethod::Max
    } else if name.contains("min") {
      AggregationMethod::Min
    } else if name.contains("sum") {
      AggregationMethod::Sum
    } else if name.contains("last") {
      AggregationMethod::Last
    } else {
      AggregationMethod::Average
    }
  }

  pub fn get_name(&self) -> &'static str {
    match self {
      AggregationMethod::Average => "average",
      AggregationMethod::Sum => "sum",
      AggregationMethod::Min => "min",
      AggregationMethod::Max => "max",
      AggregationMethod::Last => "last",
    }
  }

  /// Aggregate the given values. Returns None when there is nothing to aggregate.
  pub fn aggregate(&self, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
      return None;
    }

    let aggregated = match self {
      AggregationMethod::Average => values.iter().sum::<f64>() / values.len() as f64,
      AggregationMethod::Sum => values.iter().sum(),
      AggregationMethod::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
      AggregationMethod::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
      AggregationMethod::Last => *values.last()?,
    };
    Some(aggregated)
  }
}

#[cfg(test)]
mod tests {
  use test_case::test_case;

  use super::*;

  #[test]
  fn test_retention() {
    let retention = Retention::new(60, 1440).unwrap();
    assert_eq!(retention.get_seconds_per_point(), 60);
    assert_eq!(retention.get_points(), 1440);
    assert_eq!(retention.duration(), 86_400);

    assert!(Retention::new(0, 10).is_err());
    assert!(Retention::new(10, 0).is_err());
    assert!(matches!(
      Retention::new(u64::MAX, 2),
      Err(GraphiteDBError::InvalidRetention(_))
    ));
    assert_eq!(Retention::new(u64::MAX, 1).unwrap().duration(), u64::MAX);
  }

  #[test]
  fn test_parse_retentions() {
    let retentions = parse_retentions("[[60, 1440], [300, 2016]]").unwrap();
    assert_eq!(
      retentions,
      vec![
        Retention::new(60, 1440).unwrap(),
        Retention::new(300, 2016).unwrap()
      ]
    );

    assert_eq!(
      serde_json::to_string(&retentions).unwrap(),
      "[[60,1440],[300,2016]]"
    );

    assert!(parse_retentions("[]").is_err());
    assert!(parse_retentions("[[0, 10]]").is_err());
    assert!(parse_retentions("[[18446744073709551615, 2]]").is_err());
    assert!(matches!(
      parse_retentions("not json"),
      Err(GraphiteDBError::JsonError(_))
    ));
  }

  #[test_case("average", AggregationMethod::Average)]
  #[test_case("avg", AggregationMethod::Average)]
  #[test_case("", AggregationMethod::Average)]
  #[test_case("sum", AggregationMethod::Sum)]
  #[test_case("MAX", AggregationMethod::Max)]
  #[test_case("min", AggregationMethod::Min)]
  #[test_case("last", AggregationMethod::Last)]
  fn test_from_method_name(name: &str, expected: AggregationMethod) {
    assert_eq!(AggregationMethod::from_method_name(name), expected);
  }

  #[test_case(AggregationMethod::Average, Some(2.0))]
  #[test_case(AggregationMethod::Sum, Some(6.0))]
  #[test_case(AggregationMethod::Min, Some(1.0))]
  #[test_case(AggregationMethod::Max, Some(3.0))]
  #[test_case(AggregationMethod::Last, Some(2.0))]
  fn test_aggregate(method: AggregationMethod, expected: Option<f64>) {
    assert_eq!(method.aggregate(&[1.0, 3.0, 2.0]), expected);
    assert_eq!(method.aggregate(&[]), None);
  }
}
