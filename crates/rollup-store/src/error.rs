//! Store-level error type. Kept distinct from `rollup_core::Error` so this
//! crate has no upward dependency on the CLI-facing error kinds; callers
//! convert with `?` via the `From` impl below.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("I/O error at {path}: {source}")]
  Io { path: String, #[source] source: std::io::Error },

  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),

  #[error("Parquet error: {0}")]
  Parquet(#[from] parquet::errors::ParquetError),

  #[error("cube '{0}' not found in catalog")]
  UnknownCube(String),

  #[error("cube file missing: {0}")]
  MissingCubeFile(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for rollup_core::Error {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::Io { path, source } => {
        rollup_core::Error::Io(std::io::Error::new(source.kind(), format!("{path}: {source}")))
      }
      StoreError::MissingCubeFile(id) => {
        rollup_core::Error::CatalogAbsent(format!("cube file missing for '{id}'"))
      }
      StoreError::UnknownCube(id) => {
        rollup_core::Error::CatalogAbsent(format!("unknown cube '{id}'"))
      }
      other => rollup_core::Error::Unexpected(other.to_string()),
    }
  }
}
