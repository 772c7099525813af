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

//! Builds the sorted fact store: unlike the cubes, this retains every row,
//! physically ordered by `(week, country, type)` so the fallback executor
//! can prune large ranges of the file by scanning row groups.
//!
//! Every row is retained, so the builder never holds the whole dataset in
//! Rust-native form: each batch is sorted and spilled to its own run file on
//! disk as soon as it arrives, and `finalize` merges the runs with a k-way
//! streaming merge, reading only a small window of each run at a time.

use arrow::array::{
  ArrayRef, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use rollup_core::Event;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::BuilderResult;

/// Row count per chunk written to (and read back from) a run file, and per
/// output batch produced by the merge. Independent of the PREPARE batch
/// size so merge-phase memory stays bounded regardless of how large a
/// configured batch is.
const MERGE_CHUNK_ROWS: usize = 8192;

/// Sort key shared by the per-batch spill sort and the merge's heap.
type SortKey = (String, String, String);

fn event_sort_key(event: &Event) -> SortKey {
  (event.week.clone(), event.country.clone(), event.event_type.as_str().to_string())
}

pub struct FactBuilder {
  spill_dir: PathBuf,
  run_paths: Vec<PathBuf>,
  row_count: usize,
  next_run_id: usize,
}

impl FactBuilder {
  /// Create a builder that spills sorted run files under `spill_dir`,
  /// creating the directory if it doesn't already exist.
  pub fn new(spill_dir: &Path) -> BuilderResult<Self> {
    std::fs::create_dir_all(spill_dir)?;
    Ok(FactBuilder { spill_dir: spill_dir.to_path_buf(), run_paths: Vec::new(), row_count: 0, next_run_id: 0 })
  }

  pub fn row_count(&self) -> usize {
    self.row_count
  }

  /// Sort `events` by `(week, country, type)` and spill them to a new run
  /// file. Memory held at any time is bounded by one batch, not the whole
  /// dataset.
  pub fn accumulate_batch(&mut self, events: &[Event]) -> BuilderResult<()> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_cached_key(|e| event_sort_key(e));

    let run_path = self.spill_dir.join(format!("run-{:06}.arrow", self.next_run_id));
    write_run(&run_path, &sorted)?;

    self.run_paths.push(run_path);
    self.row_count += events.len();
    self.next_run_id += 1;
    Ok(())
  }

  /// Merge every spilled run into the fact store's final record batches,
  /// physically sorted by `(week, country, type)`, then remove the spill
  /// directory regardless of whether the merge succeeded.
  pub fn finalize(self) -> BuilderResult<Vec<RecordBatch>> {
    merge_runs(&self.run_paths, self.row_count)
  }
}

impl Drop for FactBuilder {
  /// Remove the spill directory whether `finalize` ran or the builder was
  /// dropped partway through (e.g. PREPARE aborted on an earlier error), so
  /// a failed run never leaves orphaned run files behind.
  fn drop(&mut self) {
    let _ = std::fs::remove_dir_all(&self.spill_dir);
  }
}

fn write_run(path: &Path, sorted: &[&Event]) -> BuilderResult<()> {
  let schema = rollup_store::build_fact_store_schema();
  let file = File::create(path)?;
  let mut writer = FileWriter::try_new(file, &schema)?;
  for chunk in sorted.chunks(MERGE_CHUNK_ROWS) {
    let mut buf = RowBuffer::default();
    for event in chunk {
      buf.push_event(event);
    }
    writer.write(&buf.finish(schema.clone()))?;
  }
  writer.finish()?;
  Ok(())
}

fn merge_runs(run_paths: &[PathBuf], total_rows: usize) -> BuilderResult<Vec<RecordBatch>> {
  let schema = rollup_store::build_fact_store_schema();
  if run_paths.is_empty() {
    return Ok(vec![RowBuffer::default().finish(schema)]);
  }

  let mut cursors: Vec<RunCursor> = run_paths.iter().map(|p| RunCursor::open(p)).collect::<BuilderResult<_>>()?;
  let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(cursors.len());
  for (run, cursor) in cursors.iter().enumerate() {
    if let Some(key) = cursor.key() {
      heap.push(HeapEntry { key, run });
    }
  }

  let mut out = Vec::with_capacity(total_rows.div_ceil(MERGE_CHUNK_ROWS).max(1));
  let mut buf = RowBuffer::default();

  while let Some(HeapEntry { run, .. }) = heap.pop() {
    let cursor = &mut cursors[run];
    cursor.push_current_row(&mut buf);
    cursor.advance()?;

    if buf.len() >= MERGE_CHUNK_ROWS {
      out.push(std::mem::take(&mut buf).finish(schema.clone()));
    }

    if let Some(key) = cursor.key() {
      heap.push(HeapEntry { key, run });
    }
  }

  if buf.len() > 0 {
    out.push(buf.finish(schema.clone()));
  }
  if out.is_empty() {
    out.push(RowBuffer::default().finish(schema));
  }
  Ok(out)
}

/// Streams one run file chunk-by-chunk so the merge never holds more than
/// one in-flight chunk per run in memory.
struct RunCursor {
  reader: FileReader<BufReader<File>>,
  chunk: Option<RecordBatch>,
  row: usize,
}

impl RunCursor {
  fn open(path: &Path) -> BuilderResult<Self> {
    let file = File::open(path)?;
    let mut reader = FileReader::try_new(BufReader::new(file), None)?;
    let chunk = reader.next().transpose()?;
    Ok(RunCursor { reader, chunk, row: 0 })
  }

  fn key(&self) -> Option<SortKey> {
    let batch = self.chunk.as_ref()?;
    let week = batch.column(12).as_any().downcast_ref::<StringArray>().unwrap();
    let country = batch.column(8).as_any().downcast_ref::<StringArray>().unwrap();
    let event_type = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    Some((week.value(self.row).to_string(), country.value(self.row).to_string(), event_type.value(self.row).to_string()))
  }

  fn push_current_row(&self, buf: &mut RowBuffer) {
    buf.push_row(self.chunk.as_ref().expect("push_current_row called with no current row"), self.row);
  }

  fn advance(&mut self) -> BuilderResult<()> {
    let len = self.chunk.as_ref().map(|b| b.num_rows()).unwrap_or(0);
    if self.row + 1 < len {
      self.row += 1;
    } else {
      self.chunk = self.reader.next().transpose()?;
      self.row = 0;
    }
    Ok(())
  }
}

struct HeapEntry {
  key: SortKey,
  run: usize,
}

impl PartialEq for HeapEntry {
  fn eq(&self, other: &Self) -> bool {
    self.key == other.key
  }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for HeapEntry {
  fn cmp(&self, other: &Self) -> Ordering {
    // Reversed so `BinaryHeap`, a max-heap, pops the smallest key first.
    other.key.cmp(&self.key)
  }
}

#[derive(Default)]
struct RowBuffer {
  ts: Vec<i64>,
  event_type: Vec<String>,
  auction_id: Vec<String>,
  advertiser_id: Vec<i32>,
  publisher_id: Vec<i32>,
  bid_price: Vec<Option<f64>>,
  user_id: Vec<i64>,
  total_price: Vec<Option<f64>>,
  country: Vec<String>,
  day: Vec<String>,
  hour: Vec<i32>,
  minute: Vec<String>,
  week: Vec<String>,
}

impl RowBuffer {
  fn push_event(&mut self, event: &Event) {
    self.ts.push(event.ts);
    self.event_type.push(event.event_type.as_str().to_string());
    self.auction_id.push(event.auction_id.clone());
    self.advertiser_id.push(event.advertiser_id);
    self.publisher_id.push(event.publisher_id);
    self.bid_price.push(event.bid_price);
    self.user_id.push(event.user_id);
    self.total_price.push(event.total_price);
    self.country.push(event.country.clone());
    self.day.push(event.day.clone());
    self.hour.push(event.hour as i32);
    self.minute.push(event.minute.clone());
    self.week.push(event.week.clone());
  }

  fn push_row(&mut self, batch: &RecordBatch, row: usize) {
    self.ts.push(batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap().value(row));
    self.event_type.push(batch.column(1).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string());
    self.auction_id.push(batch.column(2).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string());
    self.advertiser_id.push(batch.column(3).as_any().downcast_ref::<Int32Array>().unwrap().value(row));
    self.publisher_id.push(batch.column(4).as_any().downcast_ref::<Int32Array>().unwrap().value(row));
    let bid_col = batch.column(5).as_any().downcast_ref::<Float64Array>().unwrap();
    self.bid_price.push(if bid_col.is_null(row) { None } else { Some(bid_col.value(row)) });
    self.user_id.push(batch.column(6).as_any().downcast_ref::<Int64Array>().unwrap().value(row));
    let total_col = batch.column(7).as_any().downcast_ref::<Float64Array>().unwrap();
    self.total_price.push(if total_col.is_null(row) { None } else { Some(total_col.value(row)) });
    self.country.push(batch.column(8).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string());
    self.day.push(batch.column(9).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string());
    self.hour.push(batch.column(10).as_any().downcast_ref::<Int32Array>().unwrap().value(row));
    self.minute.push(batch.column(11).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string());
    self.week.push(batch.column(12).as_any().downcast_ref::<StringArray>().unwrap().value(row).to_string());
  }

  fn len(&self) -> usize {
    self.ts.len()
  }

  fn finish(self, schema: arrow::datatypes::SchemaRef) -> RecordBatch {
    let arrays: Vec<ArrayRef> = vec![
      Arc::new(Int64Array::from(self.ts)),
      Arc::new(StringArray::from(self.event_type)),
      Arc::new(StringArray::from(self.auction_id)),
      Arc::new(Int32Array::from(self.advertiser_id)),
      Arc::new(Int32Array::from(self.publisher_id)),
      Arc::new(Float64Array::from(self.bid_price)),
      Arc::new(Int64Array::from(self.user_id)),
      Arc::new(Float64Array::from(self.total_price)),
      Arc::new(StringArray::from(self.country)),
      Arc::new(StringArray::from(self.day)),
      Arc::new(Int32Array::from(self.hour)),
      Arc::new(StringArray::from(self.minute)),
      Arc::new(StringArray::from(self.week)),
    ];
    RecordBatch::try_new(schema, arrays).expect("fact store arrays match schema by construction")
  }
}
