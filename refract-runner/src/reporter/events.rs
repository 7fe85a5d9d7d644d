// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted over the course of a run.

use crate::runner::{RetryData, RunStats, TestResult};
use chrono::{DateTime, FixedOffset};
use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};
use std::time::Duration;

/// Uuid kind for run ids.
pub enum RunKind {}

impl TypedUuidKind for RunKind {
    #[inline]
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("run");
        TAG
    }
}

/// A unique identifier for one run.
pub type RunId = TypedUuid<RunKind>;

/// A run event.
///
/// Events are produced by a [`RetryRunner`](crate::runner::RetryRunner) and
/// consumed by reporting layers.
#[derive(Clone, Debug)]
pub struct RunEvent {
    /// The time at which the event was generated, including the offset from
    /// UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since the start of the run.
    pub elapsed: Duration,

    /// The kind of event this is.
    pub kind: RunEventKind,
}

/// The kind of run event this is.
///
/// Forms part of [`RunEvent`].
#[derive(Clone, Debug)]
pub enum RunEventKind {
    /// The run started.
    RunStarted {
        /// The UUID for this run.
        run_id: RunId,

        /// The number of suites in the initial pass.
        suite_count: usize,

        /// The number of (suite, browser) pairs in the initial pass.
        pair_count: usize,
    },

    /// A pass over the current plan started.
    PassStarted {
        /// The 0-based attempt number of this pass. Pass 0 is the initial
        /// pass over the full suite list.
        attempt: u32,

        /// The number of (suite, browser) pairs in this pass.
        pair_count: usize,
    },

    /// A (suite, browser) pair finalized: its result counts toward the final
    /// totals and will not be re-executed.
    TestFinished {
        /// The finalized result.
        result: TestResult,

        /// Current statistics for the run so far.
        current_stats: RunStats,
    },

    /// A pair mismatched and will be re-executed in the next pass.
    ///
    /// This event does not occur for a pair's terminal outcome; finalization
    /// of a deferred pair is delayed until it either matches or exhausts its
    /// suite's retry budget.
    TestRetry {
        /// The deferred result. Never `equal`.
        result: TestResult,

        /// Data related to retries.
        retry_data: RetryData,
    },

    /// All pairs of the current pass settled.
    PassFinished {
        /// The 0-based attempt number of the pass that finished.
        attempt: u32,

        /// The number of suites that will be re-executed in the next pass.
        /// 0 means the run is over.
        retry_suite_count: usize,
    },

    /// The run finished.
    RunFinished {
        /// The UUID for this run.
        run_id: RunId,

        /// The time the run started.
        start_time: DateTime<FixedOffset>,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}
