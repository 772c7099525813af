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

use thiserror::Error;

/// Error kinds shared across the workspace, one per §7 of the design:
/// `InputFormat`/`Io` are PREPARE-fatal, `CatalogAbsent` is RUN-batch-fatal,
/// and `QueryMalformed`/`UnsupportedOperation`/`RollupUnfit` are per-query-fatal.
#[derive(Error, Debug)]
pub enum Error {
  #[error("malformed input: {0}")]
  InputFormat(String),

  #[error("rollup catalog is missing or incomplete: {0}")]
  CatalogAbsent(String),

  #[error("query is malformed: {0}")]
  QueryMalformed(String),

  #[error("query uses an unsupported operation: {0}")]
  UnsupportedOperation(String),

  #[error("no rollup or fallback can answer this query: {0}")]
  RollupUnfit(String),

  #[error("I/O failure: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),

  #[error("date/time parsing error: {0}")]
  ParseDate(#[from] chrono::ParseError),

  #[error("configuration error: {0}")]
  Config(String),

  #[error("environment variable error: {0}")]
  EnvVar(#[from] std::env::VarError),

  #[error("unexpected error: {0}")]
  Unexpected(String),
}

impl Error {
  /// Stable, low-cardinality name of the error kind, used for log lines and
  /// for the CLI layer's exit-code mapping.
  pub fn kind(&self) -> &'static str {
    match self {
      Error::InputFormat(_) => "InputFormat",
      Error::CatalogAbsent(_) => "CatalogAbsent",
      Error::QueryMalformed(_) => "QueryMalformed",
      Error::UnsupportedOperation(_) => "UnsupportedOperation",
      Error::RollupUnfit(_) => "RollupUnfit",
      Error::Io(_) => "IoFailure",
      Error::Serde(_) => "QueryMalformed",
      Error::ParseDate(_) => "InputFormat",
      Error::Config(_) => "Config",
      Error::EnvVar(_) => "Config",
      Error::Unexpected(_) => "Unexpected",
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
