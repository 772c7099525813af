//! The Rollup Executor: answers a query against a single
//! already-matched cube by filtering its stored rows, re-grouping down to
//! the query's requested dimensions, and finishing the arithmetic (SUM,
//! AVG, COUNT) SQL-faithfully — a group's SUM/AVG is null only when its
//! COUNT is zero.

use crate::query::{AggColumn, AggFunc, CompareOp, Filter, Query};
use crate::result::{Cell, QueryResult};
use arrow::array::{Float64Array, Int32Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use rollup_core::catalog::Column;
use rollup_core::{day_from_minute, hour_from_minute, Error};
use rollup_store::LoadedCube;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Clone, PartialEq)]
enum Value {
  Str(String),
  Int(i32),
}

impl Value {
  fn as_str(&self) -> String {
    match self {
      Value::Str(s) => s.clone(),
      Value::Int(i) => i.to_string(),
    }
  }
}

#[derive(Clone, Default)]
struct Agg {
  bid_price_sum: f64,
  bid_price_count: i64,
  total_price_sum: f64,
  total_price_count: i64,
  row_count: i64,
}

impl Agg {
  fn merge(&mut self, other: &Agg) {
    self.bid_price_sum += other.bid_price_sum;
    self.bid_price_count += other.bid_price_count;
    self.total_price_sum += other.total_price_sum;
    self.total_price_count += other.total_price_count;
    self.row_count += other.row_count;
  }
}

/// Read `column`'s value out of a cube row, deriving it from `minute` when
/// the cube doesn't carry it as a stored key.
fn column_value(column: Column, key_columns: &[Column], row_values: &HashMap<Column, Value>) -> Option<Value> {
  if let Some(v) = row_values.get(&column) {
    return Some(v.clone());
  }
  if key_columns.contains(&Column::Minute) {
    if let Some(Value::Str(minute)) = row_values.get(&Column::Minute) {
      return match column {
        Column::Day => Some(Value::Str(day_from_minute(minute).to_string())),
        Column::Hour => Some(Value::Int(hour_from_minute(minute) as i32)),
        _ => None,
      };
    }
  }
  if key_columns.contains(&Column::Day) && column == Column::Week {
    // day already derives week directly; handled by the general `Week` key
    // case above when week is itself a stored key. Nothing further to do.
  }
  None
}

fn matches_filters(key_columns: &[Column], row_values: &HashMap<Column, Value>, filters: &[Filter]) -> bool {
  filters.iter().all(|filter| match filter {
    Filter::DimensionEq { column, values } => match column_value(*column, key_columns, row_values) {
      Some(v) => values.iter().any(|candidate| *candidate == v.as_str()),
      None => false,
    },
    Filter::DimensionCompare { column, op, value } => match column_value(*column, key_columns, row_values) {
      Some(v) => compare(&v, *op, value),
      None => false,
    },
    Filter::DimensionBetween { column, lo, hi } => match column_value(*column, key_columns, row_values) {
      // `lo > hi` is well-formed and simply matches nothing: both bounds
      // just have to hold simultaneously.
      Some(v) => compare(&v, CompareOp::Gte, lo) && compare(&v, CompareOp::Lte, hi),
      None => false,
    },
    Filter::AggregateCompare { .. } | Filter::Like { .. } => {
      unreachable!("router never sends fallback-only filters to the rollup executor")
    }
  })
}

fn compare(value: &Value, op: CompareOp, rhs: &str) -> bool {
  let ordering = match value {
    Value::Int(i) => rhs.parse::<i32>().ok().map(|r| i.cmp(&r)),
    Value::Str(s) => Some(s.as_str().cmp(rhs)),
  };
  match ordering {
    Some(Ordering::Equal) => matches!(op, CompareOp::Eq | CompareOp::Gte | CompareOp::Lte),
    Some(Ordering::Less) => matches!(op, CompareOp::Lt | CompareOp::Lte | CompareOp::Neq),
    Some(Ordering::Greater) => matches!(op, CompareOp::Gt | CompareOp::Gte | CompareOp::Neq),
    None => false,
  }
}

fn decode_batch(batch: &RecordBatch, key_columns: &[Column]) -> Vec<(HashMap<Column, Value>, Agg)> {
  let mut rows = Vec::with_capacity(batch.num_rows());

  let bid_sum = batch.column_by_name("bid_price_sum").unwrap().as_any().downcast_ref::<Float64Array>().unwrap();
  let bid_count = batch.column_by_name("bid_price_count").unwrap().as_any().downcast_ref::<Int64Array>().unwrap();
  let total_sum = batch.column_by_name("total_price_sum").unwrap().as_any().downcast_ref::<Float64Array>().unwrap();
  let total_count =
    batch.column_by_name("total_price_count").unwrap().as_any().downcast_ref::<Int64Array>().unwrap();
  let row_count = batch.column_by_name("row_count").unwrap().as_any().downcast_ref::<Int64Array>().unwrap();

  for i in 0..batch.num_rows() {
    let mut values = HashMap::new();
    for column in key_columns {
      let array = batch.column_by_name(column.as_str()).unwrap();
      let value = match column {
        Column::Hour | Column::AdvertiserId | Column::PublisherId => {
          Value::Int(array.as_any().downcast_ref::<Int32Array>().unwrap().value(i))
        }
        _ => Value::Str(array.as_any().downcast_ref::<StringArray>().unwrap().value(i).to_string()),
      };
      values.insert(*column, value);
    }

    let agg = Agg {
      bid_price_sum: bid_sum.value(i),
      bid_price_count: bid_count.value(i),
      total_price_sum: total_sum.value(i),
      total_price_count: total_count.value(i),
      row_count: row_count.value(i),
    };
    rows.push((values, agg));
  }

  rows
}

/// Execute `query` against `cube`, whose key columns are assumed (by the
/// router) to derivably cover every column the query references.
pub fn execute(cube: &LoadedCube, key_columns: &[Column], query: &Query) -> Result<QueryResult, Error> {
  let mut groups: HashMap<Vec<String>, Agg> = HashMap::new();

  for batch in &cube.batches {
    for (row_values, agg) in decode_batch(batch, key_columns) {
      if !matches_filters(key_columns, &row_values, &query.filters) {
        continue;
      }

      let group_key: Vec<String> = query
        .group_by
        .iter()
        .map(|column| {
          column_value(*column, key_columns, &row_values)
            .map(|v| v.as_str())
            .expect("router guarantees every group_by column is derivable from this cube")
        })
        .collect();

      groups.entry(group_key).or_default().merge(&agg);
    }
  }

  let columns: Vec<String> =
    query.group_by.iter().map(|c| c.as_str().to_string()).chain(query.aggregates.iter().map(|a| a.alias.clone())).collect();

  let mut rows: Vec<Vec<Cell>> = groups
    .into_iter()
    .map(|(key, agg)| {
      let mut cells: Vec<Cell> = key.into_iter().map(Cell::Str).collect();
      for aggregate in &query.aggregates {
        cells.push(finalize_aggregate(aggregate.func, aggregate.column, &agg));
      }
      cells
    })
    .collect();

  crate::sort::apply_order_and_limit(&mut rows, &columns, &query.order_by, query.limit);

  Ok(QueryResult { columns, rows })
}

fn finalize_aggregate(func: AggFunc, column: Option<AggColumn>, agg: &Agg) -> Cell {
  match (func, column) {
    (AggFunc::Count, None) => Cell::Int(agg.row_count),
    (AggFunc::Count, Some(AggColumn::BidPrice)) => Cell::Int(agg.bid_price_count),
    (AggFunc::Count, Some(AggColumn::TotalPrice)) => Cell::Int(agg.total_price_count),
    (AggFunc::Sum, Some(AggColumn::BidPrice)) => {
      if agg.bid_price_count == 0 {
        Cell::Null
      } else {
        Cell::Float(agg.bid_price_sum)
      }
    }
    (AggFunc::Sum, Some(AggColumn::TotalPrice)) => {
      if agg.total_price_count == 0 {
        Cell::Null
      } else {
        Cell::Float(agg.total_price_sum)
      }
    }
    (AggFunc::Avg, Some(AggColumn::BidPrice)) => {
      if agg.bid_price_count == 0 {
        Cell::Null
      } else {
        Cell::Float(agg.bid_price_sum / agg.bid_price_count as f64)
      }
    }
    (AggFunc::Avg, Some(AggColumn::TotalPrice)) => {
      if agg.total_price_count == 0 {
        Cell::Null
      } else {
        Cell::Float(agg.total_price_sum / agg.total_price_count as f64)
      }
    }
    (AggFunc::Min, _) | (AggFunc::Max, _) => unreachable!("router always falls back for MIN/MAX"),
    (AggFunc::Sum, None) | (AggFunc::Avg, None) => unreachable!("SUM/AVG always carry a column"),
  }
}
