//! Mapping from catalog [`Column`]s to physical Arrow types, and the fixed
//! aggregate-column schema every cube carries.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use rollup_core::catalog::Column;
use std::sync::Arc;

/// Physical Arrow type used to store a given key column's values on disk.
pub fn arrow_type_for(column: Column) -> DataType {
  match column {
    Column::Day => DataType::Utf8,
    Column::Hour => DataType::Int32,
    Column::Minute => DataType::Utf8,
    Column::Week => DataType::Utf8,
    Column::Country => DataType::Utf8,
    Column::AdvertiserId => DataType::Int32,
    Column::PublisherId => DataType::Int32,
    Column::Type => DataType::Utf8,
  }
}

/// Names of the five stored aggregate columns, in the fixed order every
/// cube file carries them in regardless of which key columns precede them.
pub const AGGREGATE_COLUMN_NAMES: [&str; 5] =
  ["bid_price_sum", "bid_price_count", "total_price_sum", "total_price_count", "row_count"];

/// Build the on-disk schema for a cube keyed by `key_columns`: the key
/// columns in declared order, followed by the fixed aggregate columns.
pub fn build_cube_schema(key_columns: &[Column]) -> SchemaRef {
  let mut fields: Vec<Field> = key_columns
    .iter()
    .map(|c| Field::new(c.as_str(), arrow_type_for(*c), false))
    .collect();

  fields.push(Field::new("bid_price_sum", DataType::Float64, false));
  fields.push(Field::new("bid_price_count", DataType::Int64, false));
  fields.push(Field::new("total_price_sum", DataType::Float64, false));
  fields.push(Field::new("total_price_count", DataType::Int64, false));
  fields.push(Field::new("row_count", DataType::Int64, false));

  Arc::new(Schema::new(fields))
}

/// The sorted fact store's schema: the raw event columns plus the four
/// derived time dimensions.
pub fn build_fact_store_schema() -> SchemaRef {
  Arc::new(Schema::new(vec![
    Field::new("ts", DataType::Int64, false),
    Field::new("type", DataType::Utf8, false),
    Field::new("auction_id", DataType::Utf8, false),
    Field::new("advertiser_id", DataType::Int32, false),
    Field::new("publisher_id", DataType::Int32, false),
    Field::new("bid_price", DataType::Float64, true),
    Field::new("user_id", DataType::Int64, false),
    Field::new("total_price", DataType::Float64, true),
    Field::new("country", DataType::Utf8, false),
    Field::new("day", DataType::Utf8, false),
    Field::new("hour", DataType::Int32, false),
    Field::new("minute", DataType::Utf8, false),
    Field::new("week", DataType::Utf8, false),
  ]))
}
