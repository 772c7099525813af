/*
 *
 *
 *
 *
 * MIT License
 * Copyright (c) 2025. Dwight J. Browne
 * dwight[-dot-]browne[-at-]dwightjbrowne[-dot-]com
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

use crate::error::{Error, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Engine-wide configuration. CLI flags (parsed in `rollup-cli`) take
/// precedence; anything left unset falls back to the environment variables
/// below, which in turn fall back to the defaults baked in here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
  /// Directory of raw input CSVs (PREPARE source).
  pub data_dir: PathBuf,

  /// Directory rollup cube files are written to / read from.
  pub rollup_dir: PathBuf,

  /// Path to the sorted fact store used by the fallback executor.
  pub fallback_path: PathBuf,

  /// Row count per streaming batch during PREPARE.
  pub batch_size: usize,

  /// Number of batches between accumulator folds during PREPARE.
  pub fold_cadence: usize,
}

impl Config {
  /// Load configuration from environment variables, with the defaults below
  /// used for anything unset. CLI flags should be layered on top by calling
  /// `Config::from_env` first and then overwriting individual fields.
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let data_dir = env::var("ROLLUP_DATA_DIR").unwrap_or_else(|_| "data".to_string()).into();

    let rollup_dir =
      env::var("ROLLUP_OUTPUT_DIR").unwrap_or_else(|_| "rollups".to_string()).into();

    let fallback_path = env::var("ROLLUP_FALLBACK_PATH")
      .unwrap_or_else(|_| "rollups/fact_store.parquet".to_string())
      .into();

    let batch_size = env::var("ROLLUP_BATCH_SIZE")
      .unwrap_or_else(|_| crate::DEFAULT_BATCH_SIZE.to_string())
      .parse()
      .map_err(|_| Error::Config("invalid ROLLUP_BATCH_SIZE".to_string()))?;

    let fold_cadence = env::var("ROLLUP_FOLD_CADENCE")
      .unwrap_or_else(|_| crate::DEFAULT_FOLD_CADENCE.to_string())
      .parse()
      .map_err(|_| Error::Config("invalid ROLLUP_FOLD_CADENCE".to_string()))?;

    Ok(Config { data_dir, rollup_dir, fallback_path, batch_size, fold_cadence })
  }

  /// Build a config from explicit values (used by the CLI once flags are
  /// parsed, and by tests).
  pub fn with_paths(data_dir: PathBuf, rollup_dir: PathBuf, fallback_path: PathBuf) -> Self {
    Config {
      data_dir,
      rollup_dir,
      fallback_path,
      batch_size: crate::DEFAULT_BATCH_SIZE,
      fold_cadence: crate::DEFAULT_FOLD_CADENCE,
    }
  }
}
