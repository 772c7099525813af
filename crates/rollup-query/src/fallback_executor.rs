//! The Fallback Executor: a generic analytical engine over the sorted fact
//! store, used whenever the router can't match a rollup cube. Built on a
//! Polars `LazyFrame` so the optimizer can push filters and projections
//! down into the Parquet scan.

use crate::query::{AggColumn, AggFunc, CompareOp, Filter, Query};
use crate::result::{Cell, QueryResult};
use polars::prelude::*;
use rollup_core::Error;
use rollup_store::FactStoreHandle;

fn to_polars_error(err: PolarsError) -> Error {
  Error::Unexpected(err.to_string())
}

fn dimension_expr(column_name: &str, is_numeric: bool, op: CompareOp, value: &str) -> PolarsResult<Expr> {
  let lit_expr = if is_numeric {
    let parsed: i64 = value.parse().map_err(|_| PolarsError::ComputeError(format!("non-numeric value '{value}'").into()))?;
    lit(parsed)
  } else {
    lit(value)
  };
  let c = col(column_name);
  Ok(match op {
    CompareOp::Eq => c.eq(lit_expr),
    CompareOp::Neq => c.neq(lit_expr),
    CompareOp::Gt => c.gt(lit_expr),
    CompareOp::Gte => c.gt_eq(lit_expr),
    CompareOp::Lt => c.lt(lit_expr),
    CompareOp::Lte => c.lt_eq(lit_expr),
  })
}

fn dimension_between_expr(column_name: &str, is_numeric: bool, lo: &str, hi: &str) -> PolarsResult<Expr> {
  let (lo_expr, hi_expr) = if is_numeric {
    let lo: i64 = lo.parse().map_err(|_| PolarsError::ComputeError(format!("non-numeric value '{lo}'").into()))?;
    let hi: i64 = hi.parse().map_err(|_| PolarsError::ComputeError(format!("non-numeric value '{hi}'").into()))?;
    (lit(lo), lit(hi))
  } else {
    (lit(lo), lit(hi))
  };
  Ok(col(column_name).gt_eq(lo_expr).and(col(column_name).lt_eq(hi_expr)))
}

fn is_numeric_column(name: &str) -> bool {
  matches!(name, "hour" | "advertiser_id" | "publisher_id")
}

fn filter_expr(filter: &Filter) -> PolarsResult<Expr> {
  match filter {
    Filter::DimensionEq { column, values } => {
      let name = column.as_str();
      if is_numeric_column(name) {
        let ints: PolarsResult<Vec<i64>> = values
          .iter()
          .map(|v| v.parse::<i64>().map_err(|_| PolarsError::ComputeError(format!("non-numeric value '{v}'").into())))
          .collect();
        Ok(col(name).is_in(lit(Series::new("".into(), ints?)), false))
      } else {
        Ok(col(name).is_in(lit(Series::new("".into(), values.clone())), false))
      }
    }
    Filter::DimensionCompare { column, op, value } => {
      let name = column.as_str();
      dimension_expr(name, is_numeric_column(name), *op, value)
    }
    Filter::DimensionBetween { column, lo, hi } => {
      let name = column.as_str();
      dimension_between_expr(name, is_numeric_column(name), lo, hi)
    }
    Filter::AggregateCompare { column, op, value } => {
      let name = column.as_str();
      let lit_value = lit(*value);
      Ok(match op {
        CompareOp::Eq => col(name).eq(lit_value),
        CompareOp::Neq => col(name).neq(lit_value),
        CompareOp::Gt => col(name).gt(lit_value),
        CompareOp::Gte => col(name).gt_eq(lit_value),
        CompareOp::Lt => col(name).lt(lit_value),
        CompareOp::Lte => col(name).lt_eq(lit_value),
      })
    }
    Filter::Like { column, pattern } => {
      // Translate a SQL-style `%` wildcard into a Polars regex match.
      let regex = format!("^{}$", regex_escape_except_percent(pattern));
      Ok(col(column.as_str()).str().contains(lit(regex), false))
    }
  }
}

fn regex_escape_except_percent(pattern: &str) -> String {
  let mut out = String::new();
  for ch in pattern.chars() {
    match ch {
      '%' => out.push_str(".*"),
      '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' => {
        out.push('\\');
        out.push(ch);
      }
      _ => out.push(ch),
    }
  }
  out
}

fn aggregate_expr(agg_column: AggColumn) -> (Expr, Expr) {
  // (sum/value expr, count expr) pair so Sum/Avg/Count share one code path.
  let name = agg_column.as_str();
  (col(name).sum(), col(name).count())
}

fn build_agg_exprs(query: &Query) -> Vec<Expr> {
  query
    .aggregates
    .iter()
    .map(|a| match (a.func, a.column) {
      (AggFunc::Count, None) => len().alias(&a.alias),
      (AggFunc::Count, Some(column)) => col(column.as_str()).drop_nulls().count().alias(&a.alias),
      (AggFunc::Sum, Some(column)) => {
        let (sum_expr, _) = aggregate_expr(column);
        sum_expr.alias(&a.alias)
      }
      (AggFunc::Avg, Some(column)) => col(column.as_str()).mean().alias(&a.alias),
      (AggFunc::Min, Some(column)) => col(column.as_str()).min().alias(&a.alias),
      (AggFunc::Max, Some(column)) => col(column.as_str()).max().alias(&a.alias),
      (AggFunc::Sum, None) | (AggFunc::Avg, None) | (AggFunc::Min, None) | (AggFunc::Max, None) => {
        unreachable!("query parsing always attaches a column to SUM/AVG/MIN/MAX")
      }
    })
    .collect()
}

/// Execute `query` against the sorted fact store at `handle.path`.
pub fn execute(handle: &FactStoreHandle, query: &Query) -> Result<QueryResult, Error> {
  let mut lazy = LazyFrame::scan_parquet(&handle.path, ScanArgsParquet::default()).map_err(to_polars_error)?;

  for filter in &query.filters {
    let expr = filter_expr(filter).map_err(to_polars_error)?;
    lazy = lazy.filter(expr);
  }

  let group_cols: Vec<Expr> = query.group_by.iter().map(|c| col(c.as_str())).collect();
  let agg_cols = build_agg_exprs(query);

  let lazy = if group_cols.is_empty() { lazy.select(agg_cols) } else { lazy.group_by(group_cols).agg(agg_cols) };

  let df = lazy.collect().map_err(to_polars_error)?;
  let mut result = dataframe_to_result(&df, query)?;
  crate::sort::apply_order_and_limit(&mut result.rows, &result.columns, &query.order_by, query.limit);
  Ok(result)
}

fn dataframe_to_result(df: &DataFrame, query: &Query) -> Result<QueryResult, Error> {
  let columns: Vec<String> =
    query.group_by.iter().map(|c| c.as_str().to_string()).chain(query.aggregates.iter().map(|a| a.alias.clone())).collect();

  let mut rows = vec![Vec::with_capacity(columns.len()); df.height()];
  for name in &columns {
    let series = df.column(name).map_err(to_polars_error)?;
    for (row_idx, row) in rows.iter_mut().enumerate() {
      row.push(any_value_to_cell(series.get(row_idx).map_err(to_polars_error)?));
    }
  }

  Ok(QueryResult { columns, rows })
}

fn any_value_to_cell(value: AnyValue) -> Cell {
  match value {
    AnyValue::Null => Cell::Null,
    AnyValue::String(s) => Cell::Str(s.to_string()),
    AnyValue::Int32(i) => Cell::Int(i as i64),
    AnyValue::Int64(i) => Cell::Int(i),
    AnyValue::UInt32(i) => Cell::Int(i as i64),
    AnyValue::Float64(f) => Cell::Float(f),
    other => Cell::Str(other.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::Aggregate;
  use arrow::array::{Float64Array, Int32Array, Int64Array, StringArray};
  use arrow::record_batch::RecordBatch;
  use rollup_core::catalog::Column;
  use std::sync::Arc;

  fn write_fixture_store(dir: &std::path::Path) -> FactStoreHandle {
    let schema = rollup_store::build_fact_store_schema();
    let batch = RecordBatch::try_new(
      schema.clone(),
      vec![
        Arc::new(Int64Array::from(vec![1_717_200_000_000, 1_717_200_060_000])) as Arc<dyn arrow::array::Array>,
        Arc::new(StringArray::from(vec!["impression", "click"])),
        Arc::new(StringArray::from(vec!["auc-1", "auc-2"])),
        Arc::new(Int32Array::from(vec![1, 2])),
        Arc::new(Int32Array::from(vec![10, 11])),
        Arc::new(Float64Array::from(vec![Some(1.5), None])),
        Arc::new(Int64Array::from(vec![42, 7])),
        Arc::new(Float64Array::from(vec![None, Some(9.99)])),
        Arc::new(StringArray::from(vec!["US", "FR"])),
        Arc::new(StringArray::from(vec!["2024-06-01", "2024-06-01"])),
        Arc::new(Int32Array::from(vec![0, 0])),
        Arc::new(StringArray::from(vec!["2024-06-01 00:00", "2024-06-01 00:01"])),
        Arc::new(StringArray::from(vec!["2024-W22", "2024-W22"])),
      ],
    )
    .unwrap();
    let path = dir.join("fact_store.parquet");
    rollup_store::write_fact_store(&path, schema, &[batch]).unwrap();
    FactStoreHandle::open(&path).unwrap()
  }

  #[test]
  fn test_fallback_count_star_group_by_country() {
    let dir = tempfile::tempdir().unwrap();
    let handle = write_fixture_store(dir.path());
    let query = Query {
      group_by: vec![Column::Country],
      aggregates: vec![Aggregate { func: AggFunc::Count, column: None, alias: "count".to_string() }],
      filters: vec![],
      order_by: vec![],
      limit: None,
    };
    let result = execute(&handle, &query).unwrap();
    assert_eq!(result.row_count(), 2);
  }

  #[test]
  fn test_fallback_sum_bid_price_is_null_when_all_rows_null() {
    let dir = tempfile::tempdir().unwrap();
    let handle = write_fixture_store(dir.path());
    let query = Query {
      group_by: vec![Column::Type],
      aggregates: vec![Aggregate { func: AggFunc::Sum, column: Some(AggColumn::BidPrice), alias: "s".to_string() }],
      filters: vec![Filter::DimensionEq { column: Column::Type, values: vec!["click".to_string()] }],
      order_by: vec![],
      limit: None,
    };
    let result = execute(&handle, &query).unwrap();
    assert_eq!(result.rows[0][1], Cell::Null);
  }

  #[test]
  fn test_fallback_neq_filter_excludes_matching_type() {
    let dir = tempfile::tempdir().unwrap();
    let handle = write_fixture_store(dir.path());
    let query = Query {
      group_by: vec![Column::Type],
      aggregates: vec![Aggregate { func: AggFunc::Count, column: None, alias: "count".to_string() }],
      filters: vec![Filter::DimensionCompare { column: Column::Type, op: CompareOp::Neq, value: "click".to_string() }],
      order_by: vec![],
      limit: None,
    };
    let result = execute(&handle, &query).unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0][0], Cell::Str("impression".to_string()));
  }

  #[test]
  fn test_fallback_order_by_matches_shared_sort_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let handle = write_fixture_store(dir.path());
    let query = Query {
      group_by: vec![Column::Country],
      aggregates: vec![Aggregate { func: AggFunc::Count, column: None, alias: "count".to_string() }],
      filters: vec![],
      order_by: vec![crate::query::OrderTerm {
        field: "COUNTRY".to_string(),
        direction: crate::query::SortDirection::Desc,
      }],
      limit: Some(1),
    };
    let result = execute(&handle, &query).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Cell::Str("US".to_string()));
  }

  #[test]
  fn test_fallback_dimension_between_matches_inclusive_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let handle = write_fixture_store(dir.path());
    let query = Query {
      group_by: vec![Column::Day],
      aggregates: vec![Aggregate { func: AggFunc::Count, column: None, alias: "count".to_string() }],
      filters: vec![Filter::DimensionBetween { column: Column::Day, lo: "2024-06-01".to_string(), hi: "2024-06-01".to_string() }],
      order_by: vec![],
      limit: None,
    };
    let result = execute(&handle, &query).unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0][1], Cell::Int(2));
  }
}
