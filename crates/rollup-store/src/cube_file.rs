//! The rollup cube file format: a self-describing columnar interchange
//! format (Arrow IPC) with LZ4 block compression, written atomically
//! (temp file + rename) so a partial build is never observable.

use crate::error::{StoreError, StoreResult};
use arrow::datatypes::SchemaRef;
use arrow::ipc::writer::{FileWriter, IpcWriteOptions};
use arrow::ipc::CompressionType;
use arrow::record_batch::RecordBatch;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Write `batches` (all sharing `schema`) to `path` as an LZ4-compressed
/// Arrow IPC file. The file is first written to `path.tmp` and only renamed
/// into place once every batch has been flushed, so readers never observe a
/// half-written cube.
pub fn write_cube_file(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> StoreResult<()> {
  let tmp_path = stage_cube_file(path, schema, batches)?;
  crate::commit_staged(&tmp_path, path)
}

/// Write `batches` to `path.tmp` without publishing them. Paired with
/// [`crate::commit_staged`] so a caller that stages several files can defer
/// every rename until all of them have been written successfully.
pub fn stage_cube_file(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> StoreResult<PathBuf> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
  }

  let tmp_path = tmp_path_for(path);
  let file = File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
  let options = IpcWriteOptions::default().try_with_compression(Some(CompressionType::LZ4_FRAME))?;
  let mut writer = FileWriter::try_new_with_options(file, &schema, options)?;
  for batch in batches {
    writer.write(batch)?;
  }
  writer.finish()?;
  Ok(tmp_path)
}

/// Read a cube file back into its schema and record batches.
pub fn read_cube_file(path: &Path) -> StoreResult<(SchemaRef, Vec<RecordBatch>)> {
  let file = File::open(path).map_err(|e| io_err(path, e))?;
  let reader = arrow::ipc::reader::FileReader::try_new(BufReader::new(file), None)?;
  let schema = reader.schema();
  let mut batches = Vec::new();
  for batch in reader {
    batches.push(batch?);
  }
  Ok((schema, batches))
}

fn tmp_path_for(path: &Path) -> PathBuf {
  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  PathBuf::from(tmp)
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
  StoreError::Io { path: path.display().to_string(), source }
}
