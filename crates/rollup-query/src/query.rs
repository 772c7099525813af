//! The query document model: a small, JSON-shaped analytical query over
//! dimensions and aggregates. This is the contract `rollup-cli` parses
//! from its input file and hands to the router.

use rollup_core::catalog::Column;
use rollup_core::Error;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunc {
  Sum,
  Avg,
  Count,
  Min,
  Max,
}

impl AggFunc {
  /// Canonical uppercase name used to build `FUNC(column)` aggregate
  /// identifiers for aliasing, order_by resolution, and CSV headers.
  pub fn as_str(&self) -> &'static str {
    match self {
      AggFunc::Sum => "SUM",
      AggFunc::Avg => "AVG",
      AggFunc::Count => "COUNT",
      AggFunc::Min => "MIN",
      AggFunc::Max => "MAX",
    }
  }
}

/// A column an aggregate function is applied to; `None` means `COUNT(*)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggColumn {
  BidPrice,
  TotalPrice,
}

impl AggColumn {
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "bid_price" => Some(AggColumn::BidPrice),
      "total_price" => Some(AggColumn::TotalPrice),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      AggColumn::BidPrice => "bid_price",
      AggColumn::TotalPrice => "total_price",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
  pub func: AggFunc,
  pub column: Option<AggColumn>,
  pub alias: String,
}

impl Aggregate {
  /// `COUNT(*)` is the only aggregate with no source column.
  pub fn is_count_star(&self) -> bool {
    self.func == AggFunc::Count && self.column.is_none()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
  Eq,
  Neq,
  Gt,
  Gte,
  Lt,
  Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
  /// `column = value` / `column IN (...)` on a dimension column — always
  /// supported by a rollup cube that carries `column` as a key.
  DimensionEq { column: Column, values: Vec<String> },
  /// An arithmetic comparison against a dimension column's raw value
  /// (e.g. `hour > 12`, `country != US`). Supported on rollups since every
  /// key column is stored verbatim.
  DimensionCompare { column: Column, op: CompareOp, value: String },
  /// `column BETWEEN lo AND hi` (inclusive) on a dimension column. Legal on
  /// rollups; `lo > hi` is well-formed and simply selects nothing.
  DimensionBetween { column: Column, lo: String, hi: String },
  /// A comparison against an *aggregated* measure (e.g.
  /// `SUM(bid_price) > 100`). No rollup cube stores enough information to
  /// answer this without re-deriving the aggregate, so it always forces
  /// fallback.
  AggregateCompare { column: AggColumn, op: CompareOp, value: f64 },
  /// `LIKE` / regex-style text matching. Always forces fallback.
  Like { column: Column, pattern: String },
}

impl Filter {
  pub fn forces_fallback(&self) -> bool {
    matches!(self, Filter::AggregateCompare { .. } | Filter::Like { .. })
  }

  pub fn dimension_column(&self) -> Option<Column> {
    match self {
      Filter::DimensionEq { column, .. } => Some(*column),
      Filter::DimensionCompare { column, .. } => Some(*column),
      Filter::DimensionBetween { column, .. } => Some(*column),
      Filter::Like { column, .. } => Some(*column),
      Filter::AggregateCompare { .. } => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
  Asc,
  Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
  pub field: String,
  pub direction: SortDirection,
}

/// A fully parsed query: which dimensions to group by, which aggregates to
/// compute, what to filter on, how to order, and an optional row limit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
  pub group_by: Vec<Column>,
  pub aggregates: Vec<Aggregate>,
  pub filters: Vec<Filter>,
  pub order_by: Vec<OrderTerm>,
  pub limit: Option<usize>,
}

impl Query {
  /// Whether MIN/MAX appear anywhere in the aggregate list. The reference
  /// catalog carries no per-group extrema, so any such query always falls
  /// back (decided Open Question: see DESIGN.md).
  pub fn requires_extrema(&self) -> bool {
    self.aggregates.iter().any(|a| matches!(a.func, AggFunc::Min | AggFunc::Max))
  }

  pub fn forces_fallback(&self) -> bool {
    self.requires_extrema() || self.filters.iter().any(Filter::forces_fallback)
  }

  /// Every column the cube must carry as a key to answer this query:
  /// the GROUP BY columns plus any dimension columns referenced by filters.
  pub fn required_columns(&self) -> Vec<Column> {
    let mut columns = self.group_by.clone();
    for filter in &self.filters {
      if let Some(column) = filter.dimension_column() {
        if !columns.contains(&column) {
          columns.push(column);
        }
      }
    }
    columns
  }
}

/// JSON wire shape for a query document, deserialized then validated into
/// a [`Query`]. Kept distinct from `Query` so malformed input produces a
/// `QueryMalformed` error at a single boundary rather than scattering
/// `serde` error handling through the router and executors.
#[derive(Debug, Deserialize)]
pub struct QueryDocument {
  #[serde(default)]
  pub group_by: Vec<String>,
  pub select: Vec<SelectSpec>,
  #[serde(default)]
  pub filters: Vec<FilterSpec>,
  #[serde(default)]
  pub order_by: Vec<String>,
  pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SelectSpec {
  CountStar(CountStarMarker),
  Aggregate { func: AggFunc, column: String, alias: Option<String> },
}

#[derive(Debug, Deserialize)]
pub struct CountStarMarker {
  #[serde(rename = "count_star")]
  pub _marker: bool,
}

#[derive(Debug, Deserialize)]
pub struct FilterSpec {
  pub column: String,
  pub op: FilterOp,
  #[serde(default)]
  pub value: Option<String>,
  #[serde(default)]
  pub values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
  Eq,
  Neq,
  In,
  Gt,
  Gte,
  Lt,
  Lte,
  Between,
  Like,
}

/// The wire shape accepted by `run --query-file`: either a bare JSON array
/// of query documents, or an object carrying them under a `queries` key
/// (the "language-native equivalent mapping" spec §6.4 allows).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryBatchDocument {
  Array(Vec<QueryDocument>),
  Wrapped { queries: Vec<QueryDocument> },
  Single(Box<QueryDocument>),
}

impl QueryDocument {
  /// Parse raw JSON bytes into a validated [`Query`], or a
  /// `QueryMalformed` / `UnsupportedOperation` error.
  pub fn parse(bytes: &[u8]) -> Result<Query, Error> {
    let doc: QueryDocument =
      serde_json::from_slice(bytes).map_err(|e| Error::QueryMalformed(e.to_string()))?;
    doc.into_query()
  }

  /// Parse a `--query-file` payload into one or more validated [`Query`]s,
  /// in document order.
  pub fn parse_many(bytes: &[u8]) -> Result<Vec<Query>, Error> {
    let batch: QueryBatchDocument =
      serde_json::from_slice(bytes).map_err(|e| Error::QueryMalformed(e.to_string()))?;
    let docs = match batch {
      QueryBatchDocument::Array(docs) => docs,
      QueryBatchDocument::Wrapped { queries } => queries,
      QueryBatchDocument::Single(doc) => vec![*doc],
    };
    docs.into_iter().map(QueryDocument::into_query).collect()
  }

  fn into_query(self) -> Result<Query, Error> {
    let group_by = self
      .group_by
      .iter()
      .map(|s| Column::parse(s).ok_or_else(|| Error::QueryMalformed(format!("unknown group_by column '{s}'"))))
      .collect::<Result<Vec<_>, _>>()?;

    let aggregates = self
      .select
      .into_iter()
      .map(|spec| match spec {
        SelectSpec::CountStar(_) => {
          Ok(Aggregate { func: AggFunc::Count, column: None, alias: "COUNT(*)".to_string() })
        }
        SelectSpec::Aggregate { func, column, alias } => {
          let agg_column = AggColumn::parse(&column)
            .ok_or_else(|| Error::QueryMalformed(format!("unknown aggregate column '{column}'")))?;
          let default_alias = format!("{}({})", func.as_str(), agg_column.as_str());
          Ok(Aggregate { func, column: Some(agg_column), alias: alias.unwrap_or(default_alias) })
        }
      })
      .collect::<Result<Vec<_>, Error>>()?;

    let filters = self
      .filters
      .into_iter()
      .map(FilterSpec::into_filters)
      .collect::<Result<Vec<Vec<Filter>>, _>>()?
      .into_iter()
      .flatten()
      .collect();

    let order_by = self
      .order_by
      .iter()
      .map(|term| {
        let (field, direction) = match term.rsplit_once(' ') {
          Some((f, "desc")) | Some((f, "DESC")) => (f.to_string(), SortDirection::Desc),
          Some((f, "asc")) | Some((f, "ASC")) => (f.to_string(), SortDirection::Asc),
          _ => (term.clone(), SortDirection::Asc),
        };
        OrderTerm { field, direction }
      })
      .collect();

    Ok(Query { group_by, aggregates, filters, order_by, limit: self.limit })
  }
}

impl FilterSpec {
  /// Most filters expand to exactly one [`Filter`]; `between` on an
  /// aggregate column expands to two `AggregateCompare` filters (`>= lo AND
  /// <= hi`), which already forces fallback on its own via
  /// [`Filter::forces_fallback`] without a dedicated aggregate-between
  /// variant.
  fn into_filters(self) -> Result<Vec<Filter>, Error> {
    if self.op == FilterOp::Like {
      let column = Column::parse(&self.column)
        .ok_or_else(|| Error::QueryMalformed(format!("unknown filter column '{}'", self.column)))?;
      let pattern = self.value.ok_or_else(|| Error::QueryMalformed("LIKE filter missing value".to_string()))?;
      return Ok(vec![Filter::Like { column, pattern }]);
    }

    if let Some(agg_column) = AggColumn::parse(&self.column) {
      if self.op == FilterOp::Between {
        let (lo, hi) = self.between_bounds()?;
        let lo: f64 = lo.parse().map_err(|_| Error::QueryMalformed(format!("non-numeric aggregate bound '{lo}'")))?;
        let hi: f64 = hi.parse().map_err(|_| Error::QueryMalformed(format!("non-numeric aggregate bound '{hi}'")))?;
        return Ok(vec![
          Filter::AggregateCompare { column: agg_column, op: CompareOp::Gte, value: lo },
          Filter::AggregateCompare { column: agg_column, op: CompareOp::Lte, value: hi },
        ]);
      }
      let op = compare_op(self.op)
        .ok_or_else(|| Error::UnsupportedOperation(format!("operator {:?} on aggregate column", self.op)))?;
      let raw = self.value.ok_or_else(|| Error::QueryMalformed("aggregate filter missing value".to_string()))?;
      let value: f64 =
        raw.parse().map_err(|_| Error::QueryMalformed(format!("non-numeric aggregate filter value '{raw}'")))?;
      return Ok(vec![Filter::AggregateCompare { column: agg_column, op, value }]);
    }

    let column = Column::parse(&self.column)
      .ok_or_else(|| Error::QueryMalformed(format!("unknown filter column '{}'", self.column)))?;

    match self.op {
      FilterOp::Eq => {
        let value = normalize_literal(column, self.value_required()?);
        Ok(vec![Filter::DimensionEq { column, values: vec![value] }])
      }
      FilterOp::Neq => {
        let value = normalize_literal(column, self.value_required()?);
        Ok(vec![Filter::DimensionCompare { column, op: CompareOp::Neq, value }])
      }
      FilterOp::In => {
        let values = self.values.ok_or_else(|| Error::QueryMalformed("IN filter missing values".to_string()))?;
        let values = values.into_iter().map(|v| normalize_literal(column, v)).collect();
        Ok(vec![Filter::DimensionEq { column, values }])
      }
      FilterOp::Between => {
        let (lo, hi) = self.between_bounds()?;
        Ok(vec![Filter::DimensionBetween {
          column,
          lo: normalize_literal(column, lo),
          hi: normalize_literal(column, hi),
        }])
      }
      FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
        let op = compare_op(self.op).expect("non-eq/neq/in/between/like ops always map to a CompareOp");
        let value = normalize_literal(column, self.value_required()?);
        Ok(vec![Filter::DimensionCompare { column, op, value }])
      }
      FilterOp::Like => unreachable!("handled above"),
    }
  }

  fn value_required(&self) -> Result<String, Error> {
    self.value.clone().ok_or_else(|| Error::QueryMalformed("filter missing value".to_string()))
  }

  /// `between`'s ordered pair is carried in `values` (`[lo, hi]`); `value`
  /// is not used for this operator.
  fn between_bounds(&self) -> Result<(String, String), Error> {
    let values = self
      .values
      .as_ref()
      .ok_or_else(|| Error::QueryMalformed("BETWEEN filter missing values".to_string()))?;
    match values.as_slice() {
      [lo, hi] => Ok((lo.clone(), hi.clone())),
      _ => Err(Error::QueryMalformed("BETWEEN filter requires exactly two values".to_string())),
    }
  }
}

fn compare_op(op: FilterOp) -> Option<CompareOp> {
  match op {
    FilterOp::Eq => Some(CompareOp::Eq),
    FilterOp::Neq => Some(CompareOp::Neq),
    FilterOp::Gt => Some(CompareOp::Gt),
    FilterOp::Gte => Some(CompareOp::Gte),
    FilterOp::Lt => Some(CompareOp::Lt),
    FilterOp::Lte => Some(CompareOp::Lte),
    _ => None,
  }
}

/// Normalize a calendar-date literal against a `day`-keyed filter to the
/// same canonical `YYYY-MM-DD` form the `day` column is stored in, so a
/// loosely-formatted literal (e.g. `2024-6-1`) still matches. Every other
/// column's literal passes through unchanged.
fn normalize_literal(column: Column, literal: String) -> String {
  if column != Column::Day {
    return literal;
  }
  chrono::NaiveDate::parse_from_str(&literal, "%Y-%m-%d")
    .map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or(literal)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_simple_group_by_count_query() {
    let json = br#"{"group_by": ["day", "type"], "select": [{"count_star": true}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.group_by, vec![Column::Day, Column::Type]);
    assert!(query.aggregates[0].is_count_star());
  }

  #[test]
  fn test_parse_rejects_unknown_column() {
    let json = br#"{"group_by": ["bogus"], "select": [{"count_star": true}]}"#;
    assert!(QueryDocument::parse(json).is_err());
  }

  #[test]
  fn test_aggregate_compare_filter_forces_fallback() {
    let json = br#"{"group_by": ["day"], "select": [{"func": "sum", "column": "bid_price"}],
      "filters": [{"column": "bid_price", "op": "gt", "value": "10"}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert!(query.forces_fallback());
  }

  #[test]
  fn test_like_filter_forces_fallback() {
    let json = br#"{"group_by": ["country"], "select": [{"count_star": true}],
      "filters": [{"column": "country", "op": "like", "value": "U%"}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert!(query.forces_fallback());
  }

  #[test]
  fn test_min_max_aggregate_requires_extrema() {
    let json = br#"{"group_by": ["day"], "select": [{"func": "max", "column": "bid_price"}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert!(query.requires_extrema());
    assert!(query.forces_fallback());
  }

  #[test]
  fn test_required_columns_includes_filter_dimension() {
    let json = br#"{"group_by": ["day"], "select": [{"count_star": true}],
      "filters": [{"column": "country", "op": "eq", "value": "US"}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.required_columns(), vec![Column::Day, Column::Country]);
  }

  #[test]
  fn test_order_by_parses_direction_suffix() {
    let json = br#"{"group_by": ["day"], "select": [{"count_star": true}], "order_by": ["day desc"]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.order_by[0], OrderTerm { field: "day".to_string(), direction: SortDirection::Desc });
  }

  #[test]
  fn test_default_aggregate_alias_is_canonical_func_form() {
    let json = br#"{"group_by": ["day"], "select": [{"func": "sum", "column": "bid_price"}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.aggregates[0].alias, "SUM(bid_price)");
  }

  #[test]
  fn test_count_star_alias_is_canonical() {
    let json = br#"{"group_by": ["day"], "select": [{"count_star": true}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.aggregates[0].alias, "COUNT(*)");
  }

  #[test]
  fn test_neq_filter_parses_to_dimension_compare() {
    let json = br#"{"group_by": ["country"], "select": [{"count_star": true}],
      "filters": [{"column": "country", "op": "neq", "value": "US"}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.filters[0], Filter::DimensionCompare { column: Column::Country, op: CompareOp::Neq, value: "US".to_string() });
    assert!(!query.forces_fallback());
  }

  #[test]
  fn test_between_filter_on_dimension_parses_to_single_filter() {
    let json = br#"{"group_by": ["day"], "select": [{"count_star": true}],
      "filters": [{"column": "day", "op": "between", "values": ["2024-06-01", "2024-06-30"]}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.filters.len(), 1);
    assert_eq!(
      query.filters[0],
      Filter::DimensionBetween { column: Column::Day, lo: "2024-06-01".to_string(), hi: "2024-06-30".to_string() }
    );
    assert!(!query.forces_fallback());
  }

  #[test]
  fn test_between_filter_on_aggregate_expands_to_two_compares_and_forces_fallback() {
    let json = br#"{"group_by": ["day"], "select": [{"func": "sum", "column": "bid_price"}],
      "filters": [{"column": "bid_price", "op": "between", "values": ["1", "100"]}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.filters.len(), 2);
    assert!(query.forces_fallback());
  }

  #[test]
  fn test_parse_many_accepts_bare_array() {
    let json = br#"[{"group_by": ["day"], "select": [{"count_star": true}]},
      {"group_by": ["country"], "select": [{"count_star": true}]}]"#;
    let queries = QueryDocument::parse_many(json).unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].group_by, vec![Column::Day]);
    assert_eq!(queries[1].group_by, vec![Column::Country]);
  }

  #[test]
  fn test_parse_many_accepts_queries_wrapper_object() {
    let json = br#"{"queries": [{"group_by": ["day"], "select": [{"count_star": true}]}]}"#;
    let queries = QueryDocument::parse_many(json).unwrap();
    assert_eq!(queries.len(), 1);
  }

  #[test]
  fn test_parse_many_accepts_single_bare_document() {
    let json = br#"{"group_by": ["day"], "select": [{"count_star": true}]}"#;
    let queries = QueryDocument::parse_many(json).unwrap();
    assert_eq!(queries.len(), 1);
  }

  #[test]
  fn test_eq_filter_on_day_normalizes_loose_date_literal() {
    let json = br#"{"group_by": ["day"], "select": [{"count_star": true}],
      "filters": [{"column": "day", "op": "eq", "value": "2024-6-1"}]}"#;
    let query = QueryDocument::parse(json).unwrap();
    assert_eq!(query.filters[0], Filter::DimensionEq { column: Column::Day, values: vec!["2024-06-01".to_string()] });
  }
}
