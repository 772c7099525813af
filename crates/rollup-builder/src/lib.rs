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

//! # rollup-builder
//!
//! PREPARE-phase machinery: a row source that streams CSV events into
//! derived-field records, a per-cube streaming accumulator with a bounded
//! fold cadence, the sorted fact builder, and the orchestrator that
//! publishes every artifact atomically.

pub mod accumulator;
pub mod error;
pub mod fact_builder;
pub mod prepare;
pub mod process_tracker;
pub mod row_source;

pub use accumulator::Accumulator;
pub use error::{BuilderError, BuilderResult};
pub use fact_builder::FactBuilder;
pub use prepare::prepare;
pub use process_tracker::{PrepareSummary, ProcessState, ProcessTracker};
pub use row_source::RowSource;
