//! `rollup run`: answer one or more query documents against the published
//! rollups (or the fallback fact store), writing one CSV result file per
//! query. RUN is per-query-isolated: a failing query is reported and
//! skipped rather than aborting the rest of the batch, and the process
//! exits nonzero iff at least one query failed.

use anyhow::{bail, Context, Result};
use rollup_core::Config;
use rollup_query::{router, Query, QueryDocument};
use rollup_store::{FactStoreHandle, RollupLoader};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

#[derive(clap::Args, Debug)]
pub struct RunArgs {
  /// Path to a JSON query document, or a JSON array / `{"queries": [...]}`
  /// batch of them. Mutually exclusive with `--query-dir`.
  #[arg(long = "query-file")]
  pub query_file: Option<PathBuf>,

  /// Directory of JSON query documents (one query per file, read in
  /// filename order). Mutually exclusive with `--query-file`.
  #[arg(long = "query-dir")]
  pub query_dir: Option<PathBuf>,

  /// Directory result CSVs (`q1.csv`, `q2.csv`, ...) are written to.
  /// Defaults to the current directory.
  #[arg(long = "output-dir")]
  pub output_dir: Option<PathBuf>,

  /// Directory published rollup cubes are read from. Overrides the
  /// configured rollup directory.
  #[arg(long = "rollup-dir")]
  pub rollup_dir: Option<PathBuf>,

  /// Path to the sorted fact store. Overrides the configured fallback path.
  #[arg(long = "fallback-path")]
  pub fallback_path: Option<PathBuf>,

  /// Print each query's chosen route (rollup cube id, or fallback) without
  /// executing it.
  #[arg(long)]
  pub explain: bool,
}

struct NamedQuery {
  name: String,
  query: Query,
}

fn load_queries(args: &RunArgs) -> Result<Vec<NamedQuery>> {
  match (&args.query_file, &args.query_dir) {
    (Some(_), Some(_)) => bail!("--query-file and --query-dir are mutually exclusive"),
    (None, None) => bail!("one of --query-file or --query-dir is required"),
    (Some(path), None) => {
      let bytes = std::fs::read(path).with_context(|| format!("reading query file {}", path.display()))?;
      let queries = QueryDocument::parse_many(&bytes)?;
      Ok(queries
        .into_iter()
        .enumerate()
        .map(|(i, query)| NamedQuery { name: format!("q{}", i + 1), query })
        .collect())
    }
    (None, Some(dir)) => {
      let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading query directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .collect();
      paths.sort();

      paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
          let bytes = std::fs::read(&path).with_context(|| format!("reading query file {}", path.display()))?;
          let query = QueryDocument::parse(&bytes).with_context(|| format!("parsing {}", path.display()))?;
          Ok(NamedQuery { name: format!("q{}", i + 1), query })
        })
        .collect()
    }
  }
}

pub fn execute(args: RunArgs, mut config: Config) -> Result<()> {
  if let Some(rollup_dir) = &args.rollup_dir {
    config.rollup_dir = rollup_dir.clone();
  }
  if let Some(fallback_path) = &args.fallback_path {
    config.fallback_path = fallback_path.clone();
  }
  let output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));

  let named_queries = load_queries(&args)?;

  if args.explain {
    for nq in &named_queries {
      match router::route(&nq.query) {
        router::Route::Rollup(descriptor) => println!("{}: route=rollup({})", nq.name, descriptor.id),
        router::Route::Fallback => println!("{}: route=fallback", nq.name),
      }
    }
    return Ok(());
  }

  std::fs::create_dir_all(&output_dir)
    .with_context(|| format!("creating output directory {}", output_dir.display()))?;

  RollupLoader::verify_catalog_complete(&config.rollup_dir).context("rollup catalog incomplete; run prepare first")?;
  let loader = RollupLoader::open(&config.rollup_dir)?;

  let mut any_failed = false;

  for nq in &named_queries {
    let start = Instant::now();
    let outcome = run_one(nq, &loader, &config, &output_dir);
    let elapsed_ms = start.elapsed().as_millis();

    match outcome {
      Ok(source) => {
        info!(query = nq.name, source, elapsed_ms, "query complete");
        println!("{}: ok source={source} {elapsed_ms}ms", nq.name);
      }
      Err(err) => {
        any_failed = true;
        error!(query = nq.name, elapsed_ms, error = %err, "query failed");
        println!("{}: FAILED {elapsed_ms}ms: {err}", nq.name);
      }
    }
  }

  if any_failed {
    bail!("one or more queries failed");
  }
  Ok(())
}

fn run_one(
  nq: &NamedQuery,
  loader: &RollupLoader,
  config: &Config,
  output_dir: &std::path::Path,
) -> Result<&'static str> {
  let (result, source) = match router::route(&nq.query) {
    router::Route::Rollup(descriptor) => {
      let cube = loader.get(descriptor.id)?;
      let result = rollup_query::rollup_executor::execute(&cube, descriptor.key_columns, &nq.query)?;
      (result, "rollup")
    }
    router::Route::Fallback => {
      let handle = FactStoreHandle::open(&config.fallback_path)?;
      let result = rollup_query::fallback_executor::execute(&handle, &nq.query)?;
      (result, "fallback")
    }
  };

  write_csv(&result, &output_dir.join(format!("{}.csv", nq.name)))?;
  Ok(source)
}

fn write_csv(result: &rollup_query::QueryResult, path: &std::path::Path) -> Result<()> {
  let mut writer = csv::Writer::from_writer(std::fs::File::create(path)?);
  writer.write_record(&result.columns)?;
  for row in &result.rows {
    let fields: Vec<String> = row.iter().map(|cell| cell.to_csv_field()).collect();
    writer.write_record(&fields)?;
  }
  writer.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bare_args() -> RunArgs {
    RunArgs { query_file: None, query_dir: None, output_dir: None, rollup_dir: None, fallback_path: None, explain: false }
  }

  #[test]
  fn test_load_queries_requires_one_source() {
    let args = bare_args();
    assert!(load_queries(&args).is_err());
  }

  #[test]
  fn test_load_queries_rejects_both_sources() {
    let mut args = bare_args();
    args.query_file = Some(PathBuf::from("a.json"));
    args.query_dir = Some(PathBuf::from("b"));
    assert!(load_queries(&args).is_err());
  }

  #[test]
  fn test_load_queries_numbers_array_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queries.json");
    std::fs::write(
      &path,
      r#"[{"group_by": ["day"], "select": [{"count_star": true}]},
         {"group_by": ["country"], "select": [{"count_star": true}]}]"#,
    )
    .unwrap();
    let mut args = bare_args();
    args.query_file = Some(path);
    let named = load_queries(&args).unwrap();
    assert_eq!(named.len(), 2);
    assert_eq!(named[0].name, "q1");
    assert_eq!(named[1].name, "q2");
  }

  #[test]
  fn test_load_queries_reads_directory_in_filename_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.json"), r#"{"group_by": ["country"], "select": [{"count_star": true}]}"#)
      .unwrap();
    std::fs::write(dir.path().join("a.json"), r#"{"group_by": ["day"], "select": [{"count_star": true}]}"#).unwrap();
    let mut args = bare_args();
    args.query_dir = Some(dir.path().to_path_buf());
    let named = load_queries(&args).unwrap();
    assert_eq!(named.len(), 2);
    assert_eq!(named[0].name, "q1");
    assert_eq!(named[0].query.group_by, vec![rollup_core::catalog::Column::Day]);
    assert_eq!(named[1].query.group_by, vec![rollup_core::catalog::Column::Country]);
  }
}
