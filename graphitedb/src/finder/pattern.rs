// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Graphite glob patterns for a single path component.
//!
//! `*` matches any run of characters, `?` a single character, `[...]` a character class
//! (`[!...]` negated) and `{a,b}` any of the listed alternatives.

use std::collections::BTreeSet;

use regex::Regex;

use crate::utils::error::GraphiteDBError;

/// Characters that make a path component a pattern rather than a literal.
const PATTERN_CHARS: [char; 6] = ['*', '[', ']', '{', '}', '?'];

/// Does the component contain any pattern characters?
pub fn is_pattern(component: &str) -> bool {
  component.contains(&PATTERN_CHARS[..])
}

/// Return the entries matching the pattern, sorted and de-duplicated. Entries starting with
/// '.' are hidden unless the pattern also starts with '.'.
pub fn match_entries<S: AsRef<str>>(
  entries: &[S],
  pattern: &str,
) -> Result<Vec<String>, GraphiteDBError> {
  let regexes = expand_braces(pattern)
    .iter()
    .map(|expanded| Regex::new(&glob_to_regex(expanded)))
    .collect::<Result<Vec<_>, _>>()?;

  let show_hidden = pattern.starts_with('.');
  let matched: BTreeSet<String> = entries
    .iter()
    .map(|entry| entry.as_ref())
    .filter(|entry| show_hidden || !entry.starts_with('.'))
    .filter(|entry| regexes.iter().any(|re| re.is_match(entry)))
    .map(str::to_owned)
    .collect();

  Ok(matched.into_iter().collect())
}

/// Coalesce the leading literal components into one, so the finder can jump straight to the
/// deepest literal row:
/// `[Platform, MySQL, *, *, *qps*]` becomes `[Platform.MySQL, *, *, *qps*]`.
pub fn cheaper_patterns(parts: Vec<String>) -> Vec<String> {
  if parts.len() < 2 || is_pattern(&parts[0]) {
    return parts;
  }

  let literal_len = parts
    .iter()
    .position(|part| is_pattern(part))
    .unwrap_or(parts.len());

  let mut result = Vec::with_capacity(parts.len() - literal_len + 1);
  result.push(parts[..literal_len].join("."));
  result.extend_from_slice(&parts[literal_len..]);
  result
}

/// Expand `{a,b}` alternatives. Multiple and nested groups expand to every combination.
fn expand_braces(pattern: &str) -> Vec<String> {
  let open = match pattern.find('{') {
    Some(open) => open,
    None => return vec![pattern.to_owned()],
  };

  // Find the matching close brace, tracking nesting, and the top-level commas inside.
  let mut depth = 0;
  let mut close = None;
  let mut commas = Vec::new();
  for (i, c) in pattern[open..].char_indices() {
    let i = open + i;
    match c {
      '{' => depth += 1,
      '}' => {
        depth -= 1;
        if depth == 0 {
          close = Some(i);
          break;
        }
      }
      ',' if depth == 1 => commas.push(i),
      _ => {}
    }
  }

  // An unbalanced brace is taken literally.
  let close = match close {
    Some(close) => close,
    None => return vec![pattern.to_owned()],
  };

  let prefix = &pattern[..open];
  let suffix = &pattern[close + 1..];
  let mut bounds = vec![open];
  bounds.extend(commas);
  bounds.push(close);

  let mut expanded = Vec::new();
  for window in bounds.windows(2) {
    let alternative = &pattern[window[0] + 1..window[1]];
    let candidate = format!("{}{}{}", prefix, alternative, suffix);
    for result in expand_braces(&candidate) {
      if !expanded.contains(&result) {
        expanded.push(result);
      }
    }
  }
  expanded
}

/// Translate a brace-free glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> String {
  let chars: Vec<char> = pattern.chars().collect();
  let mut regex = String::from("^");

  let mut i = 0;
  while i < chars.len() {
    let c = chars[i];
    i += 1;
    match c {
      '*' => regex.push_str(".*"),
      '?' => regex.push('.'),
      '[' => {
        // A ']' right after '[' or '[!' is part of the class.
        let mut j = i;
        if j < chars.len() && chars[j] == '!' {
          j += 1;
        }
        if j < chars.len() && chars[j] == ']' {
          j += 1;
        }
        while j < chars.len() && chars[j] != ']' {
          j += 1;
        }

        if j >= chars.len() {
          regex.push_str(r"\[");
          continue;
        }

        let mut class: &[char] = &chars[i..j];
        regex.push('[');
        if class.first() == Some(&'!') {
          regex.push('^');
          class = &class[1..];
        }
        for &member in class {
          // Escape everything the regex crate treats specially inside a class, except ranges.
          if member != '-' && !member.is_alphanumeric() {
            regex.push('\\');
          }
          regex.push(member);
        }
        regex.push(']');
        i = j + 1;
      }
      _ => regex.push_str(&regex::escape(&c.to_string())),
    }
  }

  regex.push('$');
  regex
}

#[cfg(test)]
mod tests {
  use test_case::test_case;

  use super::*;

  fn names(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|e| e.to_string()).collect()
  }

  const ENTRIES: [&str; 7] = ["web01", "web02", "web10", "db01", "cache", ".hidden", "w[x]"];

  #[test_case("*", &["cache", "db01", "w[x]", "web01", "web02", "web10"]; "star")]
  #[test_case("web*", &["web01", "web02", "web10"]; "prefix")]
  #[test_case("*01", &["db01", "web01"]; "suffix")]
  #[test_case("web0?", &["web01", "web02"]; "question mark")]
  #[test_case("web0[12]", &["web01", "web02"]; "class")]
  #[test_case("web[0-1]0", &["web10"]; "range")]
  #[test_case("web0[!1]", &["web02"]; "negated class")]
  #[test_case("{web01,db01}", &["db01", "web01"]; "alternatives")]
  #[test_case("{web,db}0{1,2}", &["db01", "web01", "web02"]; "two groups")]
  #[test_case("{web{01,02},cache}", &["cache", "web01", "web02"]; "nested groups")]
  #[test_case("cache", &["cache"]; "literal")]
  #[test_case("nothing*", &[]; "no match")]
  #[test_case(".*", &[".hidden"]; "hidden")]
  #[test_case("w[x", &[]; "unclosed class is literal")]
  fn test_match_entries(pattern: &str, expected: &[&str]) {
    assert_eq!(match_entries(&ENTRIES, pattern).unwrap(), names(expected));
  }

  #[test]
  fn test_match_entries_dedup() {
    let entries = names(&["a", "b"]);
    assert_eq!(match_entries(&entries, "{a,a,*}").unwrap(), names(&["a", "b"]));
  }

  #[test_case("servers", false)]
  #[test_case("web*", true)]
  #[test_case("web0?", true)]
  #[test_case("[ab]", true)]
  #[test_case("{a,b}", true)]
  fn test_is_pattern(component: &str, expected: bool) {
    assert_eq!(is_pattern(component), expected);
  }

  #[test_case(&["Platform", "MySQL", "*", "*", "*qps*"], &["Platform.MySQL", "*", "*", "*qps*"])]
  #[test_case(&["Infrastructure", "servers", "CH", "ag*", "loadavg", "[01][15]"],
              &["Infrastructure.servers.CH", "ag*", "loadavg", "[01][15]"])]
  #[test_case(&["a", "b", "c"], &["a.b.c"])]
  #[test_case(&["a"], &["a"])]
  #[test_case(&["*", "b", "c"], &["*", "b", "c"])]
  fn test_cheaper_patterns(parts: &[&str], expected: &[&str]) {
    assert_eq!(cheaper_patterns(names(parts)), names(expected));
  }

  #[test]
  fn test_expand_braces() {
    assert_eq!(expand_braces("a"), names(&["a"]));
    assert_eq!(expand_braces("{a,b}c"), names(&["ac", "bc"]));
    assert_eq!(expand_braces("x{a,b"), names(&["x{a,b"]));
  }
}
