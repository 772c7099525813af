//! Shared ORDER BY / LIMIT application used by both executors, so result
//! ordering is identical regardless of which one answered a query.

use crate::query::{OrderTerm, SortDirection};
use crate::result::Cell;
use std::cmp::Ordering;

fn cell_cmp(a: &Cell, b: &Cell) -> Ordering {
  match (a, b) {
    (Cell::Int(x), Cell::Int(y)) => x.cmp(y),
    (Cell::Float(x), Cell::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
    (Cell::Str(x), Cell::Str(y)) => x.cmp(y),
    (Cell::Null, Cell::Null) => Ordering::Equal,
    // NULL sorts as larger than any value: combined with the direction-based
    // reversal below, that puts it last under ASC and first under DESC, per
    // the NULL-ordering rule.
    (Cell::Null, _) => Ordering::Greater,
    (_, Cell::Null) => Ordering::Less,
    // Mixed numeric types only arise comparing int/float aggregates, which
    // share an ordering once coerced.
    (Cell::Int(x), Cell::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
    (Cell::Float(x), Cell::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
  }
}

/// Sort `rows` (each a positional tuple matching `columns`) by `order_by`,
/// then truncate to `limit`. Ties are broken by the rows' original relative
/// order (a stable sort), giving deterministic output for equal keys.
pub fn apply_order_and_limit(
  rows: &mut Vec<Vec<Cell>>,
  columns: &[String],
  order_by: &[OrderTerm],
  limit: Option<usize>,
) {
  if !order_by.is_empty() {
    let indices: Vec<(usize, SortDirection)> = order_by
      .iter()
      .filter_map(|term| resolve_order_column(columns, &term.field).map(|i| (i, term.direction)))
      .collect();

    rows.sort_by(|a, b| {
      for &(idx, direction) in &indices {
        let ordering = cell_cmp(&a[idx], &b[idx]);
        let ordering = if direction == SortDirection::Desc { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
          return ordering;
        }
      }
      Ordering::Equal
    });
  }

  if let Some(limit) = limit {
    rows.truncate(limit);
  }
}

/// Resolve an `order_by` reference against the result's column list: an
/// exact match first (group column, or a caller-supplied aggregate alias),
/// then a case-insensitive match on the canonical `FUNC(column)` form so
/// `sum(bid_price)` and `SUM(bid_price)` both resolve.
fn resolve_order_column(columns: &[String], field: &str) -> Option<usize> {
  columns
    .iter()
    .position(|c| c == field)
    .or_else(|| columns.iter().position(|c| c.eq_ignore_ascii_case(field)))
}
