//! The derivation relation `⊢`: which columns can be computed from a cube's
//! stored key columns without touching raw rows. Centralized here as a data
//! table so the router never special-cases a column by name.

use crate::catalog::Column;

/// What `col` derives, directly. Composing this transitively (see
/// [`derivable_closure`]) gives the full derivable set for a key column.
fn direct_derivations(col: Column) -> &'static [Column] {
  match col {
    Column::Minute => &[Column::Day, Column::Hour, Column::Week],
    Column::Day => &[Column::Week],
    // `hour` alone lacks date context and does NOT derive `day`.
    Column::Hour => &[],
    Column::Week => &[],
    Column::Country => &[],
    Column::AdvertiserId => &[],
    Column::PublisherId => &[],
    Column::Type => &[],
  }
}

/// The transitive closure of columns derivable from a cube's key set `key`,
/// including the key columns themselves (`K ∪ derivable(K)`).
pub fn derivable_closure(key: &[Column]) -> Vec<Column> {
  let mut out: Vec<Column> = key.to_vec();
  let mut frontier: Vec<Column> = key.to_vec();

  while let Some(col) = frontier.pop() {
    for &derived in direct_derivations(col) {
      if !out.contains(&derived) {
        out.push(derived);
        frontier.push(derived);
      }
    }
  }

  out
}

/// Whether every column in `required` is contained in the derivable closure
/// of `key` — the router's core matching predicate.
pub fn covers(key: &[Column], required: &[Column]) -> bool {
  let closure = derivable_closure(key);
  required.iter().all(|c| closure.contains(c))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minute_derives_day_hour_week() {
    let closure = derivable_closure(&[Column::Minute, Column::Type]);
    assert!(closure.contains(&Column::Day));
    assert!(closure.contains(&Column::Hour));
    assert!(closure.contains(&Column::Week));
  }

  #[test]
  fn test_day_derives_week_not_hour() {
    let closure = derivable_closure(&[Column::Day, Column::Type]);
    assert!(closure.contains(&Column::Week));
    assert!(!closure.contains(&Column::Hour));
    assert!(!closure.contains(&Column::Minute));
  }

  #[test]
  fn test_hour_does_not_derive_day() {
    let closure = derivable_closure(&[Column::Hour, Column::Type]);
    assert!(!closure.contains(&Column::Day));
  }

  #[test]
  fn test_covers_positive_and_negative() {
    let key = [Column::Minute, Column::Type];
    assert!(covers(&key, &[Column::Day, Column::Type]));
    assert!(!covers(&key, &[Column::Country]));
  }
}
