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

//! The Row Source: reads raw event CSV rows and turns them into [`Event`]s
//! with their derived time dimensions attached, one batch at a time so the
//! builder never holds the whole file in memory.

use crate::error::{BuilderError, BuilderResult};
use csv::Reader;
use rollup_core::{Event, EventType};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct RawEventRecord {
  ts: i64,
  #[serde(rename = "type")]
  event_type: String,
  auction_id: String,
  advertiser_id: i32,
  publisher_id: i32,
  bid_price: Option<f64>,
  user_id: i64,
  total_price: Option<f64>,
  country: String,
}

/// Streams [`Event`]s out of one or more CSV files, in fixed-size batches
/// that span file boundaries transparently: a batch is filled from the
/// current file and, once it runs out, from however many of the remaining
/// files it takes to reach `batch_size` (or end of input).
pub struct RowSource {
  remaining_files: Vec<PathBuf>,
  current: Option<Reader<File>>,
  batch_size: usize,
  row_number: usize,
}

impl RowSource {
  /// Open a single CSV file as the row source.
  pub fn open<P: AsRef<Path>>(path: P, batch_size: usize) -> BuilderResult<Self> {
    Self::open_files(vec![path.as_ref().to_path_buf()], batch_size)
  }

  /// Open every `*.csv` file directly under `dir` (sorted by file name for
  /// deterministic batch numbering across runs) as one logical row stream.
  pub fn open_dir<P: AsRef<Path>>(dir: P, batch_size: usize) -> BuilderResult<Self> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
      .collect();
    files.sort();
    Self::open_files(files, batch_size)
  }

  fn open_files(mut files: Vec<PathBuf>, batch_size: usize) -> BuilderResult<Self> {
    files.reverse(); // pop() takes files in the original order
    let mut source = RowSource { remaining_files: files, current: None, batch_size, row_number: 0 };
    source.advance_file()?;
    Ok(source)
  }

  fn advance_file(&mut self) -> BuilderResult<bool> {
    match self.remaining_files.pop() {
      Some(path) => {
        let file = File::open(path)?;
        self.current = Some(Reader::from_reader(file));
        Ok(true)
      }
      None => {
        self.current = None;
        Ok(false)
      }
    }
  }

  /// Read the next batch of events, or an empty vector at end of input.
  pub fn next_batch(&mut self) -> BuilderResult<Vec<Event>> {
    let mut batch = Vec::with_capacity(self.batch_size);

    while batch.len() < self.batch_size {
      let Some(reader) = self.current.as_mut() else { break };

      for result in reader.deserialize::<RawEventRecord>().take(self.batch_size - batch.len()) {
        self.row_number += 1;
        let record = result?;
        let event_type = EventType::parse(&record.event_type).ok_or_else(|| BuilderError::MalformedRow {
          row: self.row_number,
          field: "type".to_string(),
        })?;

        batch.push(Event::from_raw(
          record.ts,
          event_type,
          record.auction_id,
          record.advertiser_id,
          record.publisher_id,
          record.bid_price,
          record.user_id,
          record.total_price,
          record.country,
        ));
      }

      // A short read means this file's rows are exhausted: move on so the
      // batch can keep filling from the next file (or stop at end of input).
      if batch.len() < self.batch_size && !self.advance_file()? {
        break;
      }
    }

    Ok(batch)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn fixture_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
  }

  const HEADER: &str = "ts,type,auction_id,advertiser_id,publisher_id,bid_price,user_id,total_price,country\n";

  #[test]
  fn test_next_batch_parses_rows_into_events() {
    let file = fixture_file(&format!(
      "{HEADER}1717200000000,impression,auc-1,1,10,1.5,42,,US\n1717200000000,click,auc-1,1,10,,42,,US\n"
    ));
    let mut source = RowSource::open(file.path(), 10).unwrap();
    let batch = source.next_batch().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].day, "2024-06-01");
    assert_eq!(batch[0].event_type, EventType::Impression);
    assert_eq!(batch[1].bid_price, None);
  }

  #[test]
  fn test_next_batch_respects_batch_size() {
    let mut rows = String::from(HEADER);
    for i in 0..5 {
      rows.push_str(&format!("1717200000000,serve,auc-{i},1,10,,42,,US\n"));
    }
    let file = fixture_file(&rows);
    let mut source = RowSource::open(file.path(), 2).unwrap();
    assert_eq!(source.next_batch().unwrap().len(), 2);
    assert_eq!(source.next_batch().unwrap().len(), 2);
    assert_eq!(source.next_batch().unwrap().len(), 1);
    assert_eq!(source.next_batch().unwrap().len(), 0);
  }

  #[test]
  fn test_next_batch_rejects_unknown_event_type() {
    let file = fixture_file(&format!("{HEADER}1717200000000,bogus,auc-1,1,10,,42,,US\n"));
    let mut source = RowSource::open(file.path(), 10).unwrap();
    let err = source.next_batch().unwrap_err();
    assert!(matches!(err, BuilderError::MalformedRow { .. }));
  }

  #[test]
  fn test_open_dir_streams_across_multiple_files_as_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join("a.csv"),
      format!("{HEADER}1717200000000,impression,auc-1,1,10,1.5,42,,US\n"),
    )
    .unwrap();
    std::fs::write(
      dir.path().join("b.csv"),
      format!("{HEADER}1717200060000,click,auc-2,2,11,,7,9.99,FR\n"),
    )
    .unwrap();
    std::fs::write(dir.path().join("not_csv.txt"), "ignored").unwrap();

    let mut source = RowSource::open_dir(dir.path(), 10).unwrap();
    let batch = source.next_batch().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(source.next_batch().unwrap().len(), 0);
  }

  #[test]
  fn test_open_dir_respects_batch_size_across_file_boundary() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join("a.csv"),
      format!("{HEADER}1717200000000,serve,auc-1,1,10,,42,,US\n"),
    )
    .unwrap();
    std::fs::write(
      dir.path().join("b.csv"),
      format!("{HEADER}1717200060000,serve,auc-2,1,10,,42,,US\n1717200060000,serve,auc-3,1,10,,42,,US\n"),
    )
    .unwrap();

    let mut source = RowSource::open_dir(dir.path(), 2).unwrap();
    assert_eq!(source.next_batch().unwrap().len(), 2);
    assert_eq!(source.next_batch().unwrap().len(), 1);
    assert_eq!(source.next_batch().unwrap().len(), 0);
  }
}
