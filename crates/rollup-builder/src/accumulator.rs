/*
 *
 *
 *
 *
 * MIT License
 * Copyright (c) 2025. Dwight J. Browne
 * dwight[-at-]dwightjbrowne[-dot-]com
 *
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! The per-cube streaming accumulator: a bounded-memory hash aggregation
//! that processes one batch of events at a time and folds the running
//! totals together, so no single pass ever needs the whole dataset
//! resident.
//!
//! SUM/AVG follow SQL null semantics: a group's sum is only meaningful when
//! its count is nonzero, so we always carry the pair and let the caller
//! decide nullability at finalize time.

use ahash::AHashMap;
use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use rollup_core::catalog::{Column, RollupDescriptor};
use rollup_core::Event;
use std::sync::Arc;

#[derive(Clone, PartialEq, Eq, Hash)]
enum KeyValue {
  Str(String),
  Int(i32),
}

type GroupKey = Vec<KeyValue>;

#[derive(Clone, Default)]
struct Agg {
  bid_price_sum: f64,
  bid_price_count: i64,
  total_price_sum: f64,
  total_price_count: i64,
  row_count: i64,
}

impl Agg {
  fn accumulate(&mut self, event: &Event) {
    if let Some(bid) = event.bid_price {
      self.bid_price_sum += bid;
      self.bid_price_count += 1;
    }
    if let Some(total) = event.total_price {
      self.total_price_sum += total;
      self.total_price_count += 1;
    }
    self.row_count += 1;
  }

  fn merge(&mut self, other: &Agg) {
    self.bid_price_sum += other.bid_price_sum;
    self.bid_price_count += other.bid_price_count;
    self.total_price_sum += other.total_price_sum;
    self.total_price_count += other.total_price_count;
    self.row_count += other.row_count;
  }
}

fn key_value_for(column: Column, event: &Event) -> KeyValue {
  match column {
    Column::Day => KeyValue::Str(event.day.clone()),
    Column::Hour => KeyValue::Int(event.hour as i32),
    Column::Minute => KeyValue::Str(event.minute.clone()),
    Column::Week => KeyValue::Str(event.week.clone()),
    Column::Country => KeyValue::Str(event.country.clone()),
    Column::AdvertiserId => KeyValue::Int(event.advertiser_id),
    Column::PublisherId => KeyValue::Int(event.publisher_id),
    Column::Type => KeyValue::Str(event.event_type.as_str().to_string()),
  }
}

/// Accumulates one cube's groups across an arbitrary number of batches.
pub struct Accumulator {
  pub descriptor: &'static RollupDescriptor,
  groups: AHashMap<GroupKey, Agg>,
}

impl Accumulator {
  pub fn new(descriptor: &'static RollupDescriptor) -> Self {
    Accumulator { descriptor, groups: AHashMap::new() }
  }

  pub fn accumulate_batch(&mut self, events: &[Event]) {
    for event in events {
      let key: GroupKey = self.descriptor.key_columns.iter().map(|c| key_value_for(*c, event)).collect();
      self.groups.entry(key).or_default().accumulate(event);
    }
  }

  /// Merge another accumulator's groups into this one and drop the other.
  /// Called every fold cadence to bound the number of distinct partial
  /// accumulators held by the builder at once; it does not change the
  /// asymptotic memory of the group map itself, which is bounded by the
  /// cube's key cardinality regardless of how many rows have been seen.
  pub fn fold(&mut self, mut other: Accumulator) {
    for (key, agg) in other.groups.drain() {
      self.groups.entry(key).or_default().merge(&agg);
    }
  }

  pub fn group_count(&self) -> usize {
    self.groups.len()
  }

  /// Rebuild the group map at its current size via `fold`, dropping whatever
  /// excess capacity the table grew into while absorbing the batches since
  /// the last fold. Called on the configured fold cadence so folding bounds
  /// transient hash-table memory instead of only counting batches.
  pub fn compact(&mut self) {
    let fresh = Accumulator { descriptor: self.descriptor, groups: AHashMap::with_capacity(self.groups.len()) };
    let stale = std::mem::replace(self, fresh);
    self.fold(stale);
  }

  /// Materialize the accumulated groups into a single [`RecordBatch`]
  /// matching this cube's on-disk schema.
  pub fn finalize(&self) -> RecordBatch {
    let schema = rollup_store::build_cube_schema(self.descriptor.key_columns);
    let n = self.groups.len();

    let mut key_columns: Vec<Vec<KeyValue>> = vec![Vec::with_capacity(n); self.descriptor.key_columns.len()];
    let mut bid_sum = Vec::with_capacity(n);
    let mut bid_count = Vec::with_capacity(n);
    let mut total_sum = Vec::with_capacity(n);
    let mut total_count = Vec::with_capacity(n);
    let mut row_count = Vec::with_capacity(n);

    for (key, agg) in &self.groups {
      for (i, value) in key.iter().enumerate() {
        key_columns[i].push(value.clone());
      }
      bid_sum.push(agg.bid_price_sum);
      bid_count.push(agg.bid_price_count);
      total_sum.push(agg.total_price_sum);
      total_count.push(agg.total_price_count);
      row_count.push(agg.row_count);
    }

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (column, values) in self.descriptor.key_columns.iter().zip(key_columns.into_iter()) {
      arrays.push(key_array(*column, values));
    }
    arrays.push(Arc::new(Float64Array::from(bid_sum)));
    arrays.push(Arc::new(Int64Array::from(bid_count)));
    arrays.push(Arc::new(Float64Array::from(total_sum)));
    arrays.push(Arc::new(Int64Array::from(total_count)));
    arrays.push(Arc::new(Int64Array::from(row_count)));

    RecordBatch::try_new(schema, arrays).expect("accumulator-built arrays match cube schema by construction")
  }
}

fn key_array(column: Column, values: Vec<KeyValue>) -> ArrayRef {
  match column {
    Column::Hour | Column::AdvertiserId | Column::PublisherId => Arc::new(Int32Array::from(
      values
        .into_iter()
        .map(|v| match v {
          KeyValue::Int(i) => i,
          KeyValue::Str(_) => unreachable!("column {column} is always keyed by an integer"),
        })
        .collect::<Vec<_>>(),
    )),
    _ => Arc::new(StringArray::from(
      values
        .into_iter()
        .map(|v| match v {
          KeyValue::Str(s) => s,
          KeyValue::Int(_) => unreachable!("column {column} is always keyed by a string"),
        })
        .collect::<Vec<_>>(),
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rollup_core::EventType;

  fn sample_event(bid: Option<f64>, total: Option<f64>) -> Event {
    Event::from_raw(
      1_717_200_000_000,
      EventType::Impression,
      "auc-1".to_string(),
      1,
      10,
      bid,
      42,
      total,
      "US".to_string(),
    )
  }

  #[test]
  fn test_accumulate_batch_groups_by_key_columns() {
    let descriptor = rollup_core::catalog::find("day_type").unwrap();
    let mut acc = Accumulator::new(descriptor);
    acc.accumulate_batch(&[sample_event(Some(1.0), None), sample_event(Some(2.0), Some(5.0))]);
    assert_eq!(acc.group_count(), 1);

    let batch = acc.finalize();
    let bid_sum = batch.column_by_name("bid_price_sum").unwrap().as_any().downcast_ref::<Float64Array>().unwrap();
    let bid_count = batch.column_by_name("bid_price_count").unwrap().as_any().downcast_ref::<Int64Array>().unwrap();
    let total_count =
      batch.column_by_name("total_price_count").unwrap().as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(bid_sum.value(0), 3.0);
    assert_eq!(bid_count.value(0), 2);
    assert_eq!(total_count.value(0), 1);
  }

  #[test]
  fn test_fold_merges_groups_across_partials() {
    let descriptor = rollup_core::catalog::find("day_type").unwrap();
    let mut main = Accumulator::new(descriptor);
    main.accumulate_batch(&[sample_event(Some(1.0), None)]);

    let mut partial = Accumulator::new(descriptor);
    partial.accumulate_batch(&[sample_event(Some(4.0), None)]);

    main.fold(partial);
    assert_eq!(main.group_count(), 1);
    let batch = main.finalize();
    let row_count = batch.column_by_name("row_count").unwrap().as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(row_count.value(0), 2);
  }

  #[test]
  fn test_compact_preserves_groups_and_totals() {
    let descriptor = rollup_core::catalog::find("day_type").unwrap();
    let mut acc = Accumulator::new(descriptor);
    acc.accumulate_batch(&[sample_event(Some(1.0), None), sample_event(Some(2.0), Some(5.0))]);
    acc.compact();

    assert_eq!(acc.group_count(), 1);
    let batch = acc.finalize();
    let bid_sum = batch.column_by_name("bid_price_sum").unwrap().as_any().downcast_ref::<Float64Array>().unwrap();
    let row_count = batch.column_by_name("row_count").unwrap().as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(bid_sum.value(0), 3.0);
    assert_eq!(row_count.value(0), 2);
  }

  #[test]
  fn test_zero_count_group_has_zero_sum_not_null() {
    let descriptor = rollup_core::catalog::find("day_type").unwrap();
    let mut acc = Accumulator::new(descriptor);
    acc.accumulate_batch(&[sample_event(None, None)]);
    let batch = acc.finalize();
    let bid_count = batch.column_by_name("bid_price_count").unwrap().as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(bid_count.value(0), 0);
  }
}
