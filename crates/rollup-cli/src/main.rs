use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use rollup_core::Config;

mod commands;
use commands::{prepare::PrepareArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "rollup")]
#[command(propagate_version = true)]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// Verbose output
  #[arg(short, long, global = true)]
  verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Build every rollup cube and the sorted fact store from a directory of
  /// raw event CSVs.
  Prepare(PrepareArgs),
  /// Answer one or more query documents against the published rollups.
  Run(RunArgs),
}

fn main() -> Result<()> {
  dotenv().ok();

  let cli = Cli::parse();

  let log_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt().with_env_filter(log_level).init();

  let config = Config::from_env()?;

  match cli.command {
    Commands::Prepare(args) => commands::prepare::execute(args, config)?,
    Commands::Run(args) => commands::run::execute(args, config)?,
  }

  Ok(())
}
