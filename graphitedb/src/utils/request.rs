// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use chrono::Duration;

use crate::utils::error::GraphiteDBError;

/// Parses a Graphite-style `from`/`until` value into epoch seconds, relative to `now`.
///
/// Accepted forms are `now`, absolute epoch seconds (`1700000000`), and offsets such as
/// `-1h`, `-30min`, `-7d` or `+2w`. Units are matched by prefix the way Graphite does:
/// `s`, `min`, `h`, `d`, `w`, `mon` (30 days) and `y` (365 days).
pub fn parse_time(s: &str, now: u64) -> Result<u64, GraphiteDBError> {
  let s = s.trim();
  if s.is_empty() || s.eq_ignore_ascii_case("now") {
    return Ok(now);
  }

  if s.chars().all(|c| c.is_ascii_digit()) {
    return s
      .parse::<u64>()
      .map_err(|_| GraphiteDBError::InvalidTimeRange(format!("Invalid timestamp {}", s)));
  }

  let (sign, rest) = match s.chars().next() {
    Some('-') => (-1, &s[1..]),
    Some('+') => (1, &s[1..]),
    _ => {
      return Err(GraphiteDBError::InvalidTimeRange(format!(
        "Unsupported time format {}",
        s
      )))
    }
  };

  let offset = parse_time_offset(rest)?;
  let offset_seconds = offset.num_seconds().unsigned_abs();
  if sign < 0 {
    Ok(now.saturating_sub(offset_seconds))
  } else {
    Ok(now.saturating_add(offset_seconds))
  }
}

/// Parses an unsigned offset such as `5min` or `24h` into a `Duration`.
fn parse_time_offset(s: &str) -> Result<Duration, GraphiteDBError> {
  let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
  let (number, unit) = s.split_at(digits_end);

  let value = number
    .parse::<i64>()
    .map_err(|_| GraphiteDBError::InvalidTimeRange(format!("Invalid number in offset {}", s)))?;

  let unit = unit.to_ascii_lowercase();
  let unit_seconds: i64 = if unit.starts_with('s') {
    1
  } else if unit.starts_with("min") {
    60
  } else if unit.starts_with('h') {
    3600
  } else if unit.starts_with('d') {
    86_400
  } else if unit.starts_with('w') {
    604_800
  } else if unit.starts_with("mon") {
    30 * 86_400
  } else if unit.starts_with('y') {
    365 * 86_400
  } else {
    return Err(GraphiteDBError::InvalidTimeRange(format!(
      "Unsupported offset unit in {:?}",
      s
    )));
  };

  value
    .checked_mul(unit_seconds)
    .and_then(Duration::try_seconds)
    .ok_or_else(|| GraphiteDBError::InvalidTimeRange(format!("Offset {} is out of range", s)))
}

#[cfg(test)]
mod tests {
  use test_case::test_case;

  use super::*;

  const NOW: u64 = 1_699_999_200;

  #[test_case("now", NOW; "now")]
  #[test_case("", NOW; "empty defaults to now")]
  #[test_case("1600000000", 1_600_000_000; "absolute")]
  #[test_case("-60s", NOW - 60; "seconds")]
  #[test_case("-5min", NOW - 300; "minutes")]
  #[test_case("-24h", NOW - 86_400; "hours")]
  #[test_case("-7d", NOW - 604_800; "days")]
  #[test_case("-1w", NOW - 604_800; "weeks")]
  #[test_case("-1mon", NOW - 2_592_000; "months")]
  #[test_case("-1y", NOW - 31_536_000; "years")]
  #[test_case("+1h", NOW + 3600; "future offset")]
  fn test_parse_time(input: &str, expected: u64) {
    assert_eq!(parse_time(input, NOW).unwrap(), expected);
  }

  #[test_case("yesterday"; "unknown word")]
  #[test_case("-5m"; "ambiguous minute or month")]
  #[test_case("-h"; "missing number")]
  #[test_case("-5q"; "unknown unit")]
  #[test_case("-9999999999999999s"; "seconds out of range")]
  #[test_case("-99999999999999999d"; "days out of range")]
  #[test_case("-99999999999999999y"; "years overflow")]
  #[test_case("-99999999999999999999min"; "number overflow")]
  fn test_parse_time_invalid(input: &str) {
    assert!(matches!(
      parse_time(input, NOW),
      Err(GraphiteDBError::InvalidTimeRange(_))
    ));
  }

  #[test]
  fn test_parse_time_saturates() {
    assert_eq!(parse_time("-100y", 1000).unwrap(), 0);
  }
}
