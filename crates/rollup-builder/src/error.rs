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

#[derive(Error, Debug)]
pub enum BuilderError {
  #[error("CSV parsing error: {0}")]
  Csv(String),

  #[error("IO error: {0}")]
  Io(String),

  #[error("row {row} missing required field '{field}'")]
  MalformedRow { row: usize, field: String },

  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),

  #[error("store error: {0}")]
  Store(#[from] rollup_store::StoreError),
}

impl From<csv::Error> for BuilderError {
  fn from(err: csv::Error) -> Self {
    BuilderError::Csv(err.to_string())
  }
}

impl From<std::io::Error> for BuilderError {
  fn from(err: std::io::Error) -> Self {
    BuilderError::Io(err.to_string())
  }
}

impl From<BuilderError> for rollup_core::Error {
  fn from(err: BuilderError) -> Self {
    match err {
      BuilderError::Csv(msg) => rollup_core::Error::InputFormat(msg),
      BuilderError::MalformedRow { row, field } => {
        rollup_core::Error::InputFormat(format!("row {row}: missing field '{field}'"))
      }
      BuilderError::Io(msg) => rollup_core::Error::Io(std::io::Error::other(msg)),
      BuilderError::Arrow(e) => rollup_core::Error::Unexpected(e.to_string()),
      BuilderError::Store(e) => e.into(),
    }
  }
}

pub type BuilderResult<T> = Result<T, BuilderError>;
