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

//! # rollup-core
//!
//! Core types, the rollup catalog, configuration, and error handling shared
//! across the events rollup engine.
//!
//! This crate provides the foundational components shared across the
//! workspace:
//!
//! - [`Config`] — PREPARE/RUN configuration (data paths, batch size, fold
//!   cadence)
//! - [`Error`] and [`Result`] — unified error handling
//! - [`event`] — the event record and its derived time dimensions
//! - [`catalog`] — the fixed set of rollup descriptors
//! - [`derivation`] — the column derivation relation

pub mod catalog;
pub mod config;
pub mod derivation;
pub mod error;
pub mod event;

pub use catalog::{Column, RollupDescriptor, SizeClass, CATALOG};
pub use config::Config;
pub use error::{Error, Result};
pub use event::{day_from_minute, hour_from_minute, Event, EventType};

/// Default row count per streaming batch during PREPARE.
pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;

/// Default number of batches between accumulator folds during PREPARE.
pub const DEFAULT_FOLD_CADENCE: usize = 50;

/// Size-class boundary between a "small" (eager) and "large" (lazy) cube,
/// in expected rows.
pub const SMALL_CUBE_ROW_THRESHOLD: u64 = 100_000;
