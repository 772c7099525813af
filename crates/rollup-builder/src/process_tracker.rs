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

//! Tracks PREPARE's run state and produces the summary report printed at
//! the end of a run.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
  Running,
  Success,
  Failed,
}

struct ProcessInfo {
  start_time: DateTime<Utc>,
  end_time: Option<DateTime<Utc>>,
  state: ProcessState,
}

pub struct ProcessTracker {
  info: Mutex<Option<ProcessInfo>>,
}

#[derive(Debug, Clone)]
pub struct PrepareSummary {
  pub rows_processed: usize,
  pub cubes_published: usize,
  pub duration_ms: i64,
  pub state: ProcessState,
}

impl Default for ProcessTracker {
  fn default() -> Self {
    Self::new()
  }
}

impl ProcessTracker {
  pub fn new() -> Self {
    ProcessTracker { info: Mutex::new(None) }
  }

  pub fn start(&self, _process_name: &str) {
    let mut guard = self.info.lock().unwrap();
    *guard = Some(ProcessInfo { start_time: Utc::now(), end_time: None, state: ProcessState::Running });
  }

  pub fn complete(&self, state: ProcessState) {
    let mut guard = self.info.lock().unwrap();
    if let Some(info) = guard.as_mut() {
      info.state = state;
      info.end_time = Some(Utc::now());
    }
  }

  pub fn summary(&self, rows_processed: usize, cubes_published: usize) -> PrepareSummary {
    let guard = self.info.lock().unwrap();
    let info = guard.as_ref().expect("summary requested before start()");
    let end = info.end_time.unwrap_or_else(Utc::now);
    PrepareSummary {
      rows_processed,
      cubes_published,
      duration_ms: (end - info.start_time).num_milliseconds(),
      state: info.state.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tracker_reports_success_state_in_summary() {
    let tracker = ProcessTracker::new();
    tracker.start("prepare");
    tracker.complete(ProcessState::Success);
    let summary = tracker.summary(10, 11);
    assert_eq!(summary.state, ProcessState::Success);
    assert_eq!(summary.rows_processed, 10);
    assert!(summary.duration_ms >= 0);
  }
}
