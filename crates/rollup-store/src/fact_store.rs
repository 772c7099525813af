//! The sorted fact store: a full, read-only materialization of the events,
//! physically ordered by `(week, country,
//! type)`, used only by the fallback executor. This crate owns the write
//! side and the on-disk contract; query execution against it is the generic
//! analytical engine's job (see `rollup-query::fallback`).

use crate::error::{StoreError, StoreResult};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Write `batches` (already sorted by `(week, country, type)` by the caller)
/// to `path` as a single Parquet file, via a temp file + rename so a crash
/// mid-write never leaves a partial fact store in place.
pub fn write_fact_store(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> StoreResult<()> {
  let tmp_path = stage_fact_store(path, schema, batches)?;
  crate::commit_staged(&tmp_path, path)
}

/// Write `batches` to `path.tmp` without publishing them. Paired with
/// [`crate::commit_staged`] so a caller that stages several files can defer
/// every rename until all of them have been written successfully.
pub fn stage_fact_store(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> StoreResult<PathBuf> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
  }

  let tmp_path = tmp_path_for(path);
  let file = File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
  let props = WriterProperties::builder().set_compression(Compression::LZ4).build();
  let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
  for batch in batches {
    writer.write(batch)?;
  }
  writer.close()?;
  Ok(tmp_path)
}

/// Handle to a materialized fact store. Holds only the path and schema; the
/// generic analytical engine opens the file itself when it needs to scan.
#[derive(Debug, Clone)]
pub struct FactStoreHandle {
  pub path: PathBuf,
  pub schema: SchemaRef,
}

impl FactStoreHandle {
  /// Open an existing fact store, failing if the file is absent (the
  /// `CatalogAbsent` condition applies to the fallback substrate too).
  pub fn open(path: &Path) -> StoreResult<Self> {
    if !path.exists() {
      return Err(StoreError::MissingCubeFile(path.display().to_string()));
    }
    Ok(FactStoreHandle { path: path.to_path_buf(), schema: crate::schema::build_fact_store_schema() })
  }
}

fn tmp_path_for(path: &Path) -> PathBuf {
  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  PathBuf::from(tmp)
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
  StoreError::Io { path: path.display().to_string(), source }
}

#[cfg(test)]
mod tests {
  use super::*;
  use arrow::array::{Float64Array, Int32Array, Int64Array, StringArray};
  use std::sync::Arc;

  #[test]
  fn test_write_fact_store_then_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fact_store.parquet");
    let schema = crate::schema::build_fact_store_schema();

    let batch = RecordBatch::try_new(
      schema.clone(),
      vec![
        Arc::new(Int64Array::from(vec![1_717_200_000_000])),
        Arc::new(StringArray::from(vec!["impression"])),
        Arc::new(StringArray::from(vec!["auc-1"])),
        Arc::new(Int32Array::from(vec![1])),
        Arc::new(Int32Array::from(vec![10])),
        Arc::new(Float64Array::from(vec![Some(1.0)])),
        Arc::new(Int64Array::from(vec![42])),
        Arc::new(Float64Array::from(vec![None])),
        Arc::new(StringArray::from(vec!["US"])),
        Arc::new(StringArray::from(vec!["2024-06-01"])),
        Arc::new(Int32Array::from(vec![0])),
        Arc::new(StringArray::from(vec!["2024-06-01 00:00"])),
        Arc::new(StringArray::from(vec!["2024-W22"])),
      ],
    )
    .unwrap();

    write_fact_store(&path, schema, &[batch]).unwrap();
    let handle = FactStoreHandle::open(&path).unwrap();
    assert_eq!(handle.path, path);
  }

  #[test]
  fn test_open_missing_fact_store_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.parquet");
    assert!(FactStoreHandle::open(&path).is_err());
  }
}
