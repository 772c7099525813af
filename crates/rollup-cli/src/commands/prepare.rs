//! `rollup prepare`: build every cube and the sorted fact store from a
//! directory of raw event CSVs, then print a one-line summary report.

use anyhow::{bail, Context, Result};
use rollup_core::Config;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args, Debug)]
pub struct PrepareArgs {
  /// Directory of raw event CSVs to build rollups from.
  #[arg(long = "data-dir")]
  pub data_dir: Option<PathBuf>,

  /// Directory cube files are written to. Overrides the configured rollup
  /// directory.
  #[arg(long = "output-dir")]
  pub output_dir: Option<PathBuf>,

  /// Directory the sorted fact store is written into (as
  /// `fact_store.parquet`). Overrides the configured fallback path.
  #[arg(long = "fallback-dir")]
  pub fallback_dir: Option<PathBuf>,
}

pub fn execute(args: PrepareArgs, mut config: Config) -> Result<()> {
  if let Some(data_dir) = args.data_dir {
    config.data_dir = data_dir;
  }
  if let Some(output_dir) = args.output_dir {
    config.rollup_dir = output_dir;
  }
  if let Some(fallback_dir) = args.fallback_dir {
    config.fallback_path = fallback_dir.join("fact_store.parquet");
  }

  if !config.data_dir.is_dir() {
    bail!("--data-dir {} is not a directory", config.data_dir.display());
  }

  std::fs::create_dir_all(&config.rollup_dir)
    .with_context(|| format!("creating rollup directory {}", config.rollup_dir.display()))?;

  let summary = rollup_builder::prepare(&config.data_dir, &config).context("prepare failed")?;

  info!(
    rows = summary.rows_processed,
    cubes = summary.cubes_published,
    duration_ms = summary.duration_ms,
    state = ?summary.state,
    "prepare complete"
  );
  println!(
    "prepare: {} rows, {} cubes published, {} ms, state={:?}",
    summary.rows_processed, summary.cubes_published, summary.duration_ms, summary.state
  );
  Ok(())
}
