//! On-disk artifact contracts for the events rollup engine: the rollup cube
//! file format, the sorted fact store, and the loader that brings published
//! cubes into process memory for the query path.

pub mod cube_file;
pub mod error;
pub mod fact_store;
pub mod loader;
pub mod schema;

pub use cube_file::stage_cube_file;
pub use error::{StoreError, StoreResult};
pub use fact_store::{stage_fact_store, write_fact_store, FactStoreHandle};
pub use loader::{LoadedCube, RollupLoader};
pub use schema::{build_cube_schema, build_fact_store_schema};

use std::fs;
use std::path::Path;

/// Publish a staged `path.tmp` file (from [`stage_cube_file`] or
/// [`stage_fact_store`]) by renaming it into place. A bare rename is the
/// only step, so once every staged artifact in a batch has survived this
/// call, the whole batch is durably visible.
pub fn commit_staged(tmp_path: &Path, final_path: &Path) -> StoreResult<()> {
  fs::rename(tmp_path, final_path)
    .map_err(|e| StoreError::Io { path: final_path.display().to_string(), source: e })
}
