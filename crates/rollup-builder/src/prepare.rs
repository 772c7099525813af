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

//! Orchestrates the PREPARE phase: stream events out of the row source in
//! batches, fan each batch out to every cube's accumulator and to the fact
//! builder, fold accumulators periodically, and publish every artifact
//! atomically once the whole input has been consumed. PREPARE is
//! abort-on-first-error: any row source or I/O failure stops the run before
//! anything is published.

use crate::accumulator::Accumulator;
use crate::error::BuilderResult;
use crate::fact_builder::FactBuilder;
use crate::process_tracker::{PrepareSummary, ProcessTracker};
use crate::row_source::RowSource;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rollup_core::catalog::CATALOG;
use rollup_core::Config;
use std::path::Path;
use tracing::info;

/// Run PREPARE against every `*.csv` file under `data_dir`, publishing cube
/// files under `config.rollup_dir` and the fact store at
/// `config.fallback_path`.
pub fn prepare(data_dir: &Path, config: &Config) -> BuilderResult<PrepareSummary> {
  let tracker = ProcessTracker::new();
  tracker.start("prepare");

  let mut accumulators: Vec<Accumulator> = CATALOG.iter().map(Accumulator::new).collect();
  let spill_dir = config.rollup_dir.join(".fact_spill");
  let mut fact_builder = FactBuilder::new(&spill_dir)?;
  let mut source = RowSource::open_dir(data_dir, config.batch_size)?;

  let progress = ProgressBar::new_spinner();
  progress.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());

  let mut batches_since_fold = 0usize;
  let mut total_rows = 0usize;
  let mut batch_number = 0usize;

  loop {
    let batch = source.next_batch()?;
    if batch.is_empty() {
      break;
    }
    batch_number += 1;
    total_rows += batch.len();

    let (_, fact_result) = rayon::join(
      || accumulators.par_iter_mut().for_each(|acc| acc.accumulate_batch(&batch)),
      || fact_builder.accumulate_batch(&batch),
    );
    fact_result?;

    batches_since_fold += 1;
    if batches_since_fold >= config.fold_cadence {
      accumulators.par_iter_mut().for_each(|acc| acc.compact());
      batches_since_fold = 0;
    }

    progress.set_message(format!("batch {batch_number}: {total_rows} rows"));
    progress.tick();
  }
  progress.finish_and_clear();

  // Stage every artifact to a `.tmp` sibling first and only rename them into
  // place once every write has succeeded, so a failure partway through
  // publishing never leaves a subset of cubes visible under the output
  // directory (a run either publishes everything or nothing).
  let mut staged: Vec<(std::path::PathBuf, std::path::PathBuf)> = Vec::with_capacity(accumulators.len() + 1);

  let stage_result = (|| -> BuilderResult<()> {
    for accumulator in &accumulators {
      let batch = accumulator.finalize();
      let schema = rollup_store::build_cube_schema(accumulator.descriptor.key_columns);
      let path = config.rollup_dir.join(accumulator.descriptor.file_name);
      let tmp_path = rollup_store::stage_cube_file(&path, schema, &[batch])?;
      staged.push((tmp_path, path));
      info!(cube = accumulator.descriptor.id, groups = accumulator.group_count(), "staged cube");
    }

    let fact_schema = rollup_store::build_fact_store_schema();
    let row_count = fact_builder.row_count();
    let fact_batches = fact_builder.finalize()?;
    let fact_tmp_path = rollup_store::stage_fact_store(&config.fallback_path, fact_schema, &fact_batches)?;
    staged.push((fact_tmp_path, config.fallback_path.clone()));
    info!(rows = row_count, "staged fact store");
    Ok(())
  })();

  if let Err(err) = stage_result {
    for (tmp_path, _) in &staged {
      let _ = std::fs::remove_file(tmp_path);
    }
    tracker.complete(crate::process_tracker::ProcessState::Failed);
    return Err(err);
  }

  for (tmp_path, final_path) in &staged {
    rollup_store::commit_staged(tmp_path, final_path)?;
  }
  info!(cubes = accumulators.len(), "published all cubes and the fact store");

  tracker.complete(crate::process_tracker::ProcessState::Success);
  Ok(tracker.summary(total_rows, CATALOG.len()))
}
