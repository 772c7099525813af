//! The Query Router: a small pattern matcher that either picks the smallest
//! rollup cube whose key columns derive every column the query needs, or
//! routes to the fallback executor.

use crate::query::Query;
use rollup_core::catalog::{RollupDescriptor, CATALOG};
use rollup_core::derivation::covers;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  Rollup(&'static RollupDescriptor),
  Fallback,
}

/// Decide how `query` should be executed. Catalog entries are considered in
/// declaration order and the smallest matching cube (by declared expected
/// row count) wins; ties keep the first declared entry.
pub fn route(query: &Query) -> Route {
  if query.forces_fallback() {
    debug!("query forces fallback (extrema aggregate or like/aggregate-compare filter)");
    return Route::Fallback;
  }

  let required = query.required_columns();
  let best = CATALOG
    .iter()
    .filter(|descriptor| covers(descriptor.key_columns, &required))
    .min_by_key(|descriptor| descriptor.expected_row_count());

  match best {
    Some(descriptor) => {
      debug!(cube = descriptor.id, "routed to rollup cube");
      Route::Rollup(descriptor)
    }
    None => {
      debug!("no cube covers required columns, falling back");
      Route::Fallback
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::{AggColumn, AggFunc, Aggregate, Filter};
  use rollup_core::catalog::Column;

  fn count_query(group_by: Vec<Column>) -> Query {
    Query {
      group_by,
      aggregates: vec![Aggregate { func: AggFunc::Count, column: None, alias: "count".to_string() }],
      filters: vec![],
      order_by: vec![],
      limit: None,
    }
  }

  #[test]
  fn test_route_picks_exact_small_cube_for_day_type() {
    let query = count_query(vec![Column::Day, Column::Type]);
    assert_eq!(route(&query), Route::Rollup(rollup_core::catalog::find("day_type").unwrap()));
  }

  #[test]
  fn test_route_derives_day_from_minute_cube_but_prefers_smaller_day_cube() {
    let query = count_query(vec![Column::Day]);
    // day_type, day_country_type, day_advertiser_type, day_publisher_country_type,
    // and minute_type all derive `day`; the smallest declared cube wins.
    let chosen = route(&query);
    assert_eq!(chosen, Route::Rollup(rollup_core::catalog::find("day_type").unwrap()));
  }

  #[test]
  fn test_route_falls_back_when_hour_and_advertiser_both_required() {
    // No cube's key set derives both `hour` and `advertiser_id` together.
    let query = count_query(vec![Column::Hour, Column::AdvertiserId]);
    assert_eq!(route(&query), Route::Fallback);
  }

  #[test]
  fn test_route_uses_minute_cube_when_both_day_and_hour_required() {
    // `minute` derives both `day` and `hour` simultaneously, so a query
    // grouping by both can still be answered from a rollup.
    let query = count_query(vec![Column::Hour, Column::Day]);
    assert_eq!(route(&query), Route::Rollup(rollup_core::catalog::find("minute_type").unwrap()));
  }

  #[test]
  fn test_route_falls_back_for_min_max_aggregate() {
    let mut query = count_query(vec![Column::Day]);
    query.aggregates = vec![Aggregate { func: AggFunc::Max, column: Some(AggColumn::BidPrice), alias: "m".into() }];
    assert_eq!(route(&query), Route::Fallback);
  }

  #[test]
  fn test_route_falls_back_on_aggregate_compare_filter() {
    let mut query = count_query(vec![Column::Day]);
    query.filters = vec![Filter::AggregateCompare {
      column: AggColumn::BidPrice,
      op: crate::query::CompareOp::Gt,
      value: 10.0,
    }];
    assert_eq!(route(&query), Route::Fallback);
  }
}
