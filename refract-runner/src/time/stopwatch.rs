// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking run event timestamps.
//!
//! Events need a wall-clock timestamp and a duration since the start of the
//! run. For that we use a combination of a `DateTime<Local>` (realtime clock)
//! and an `Instant` (monotonic clock); elapsed times are always reported from
//! the monotonic clock.

use chrono::{DateTime, FixedOffset, Local};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// The start state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            // These two syscalls happen imperceptibly close to each other,
            // which is good enough for our purposes.
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time.into()
    }

    pub(crate) fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            timestamp: Local::now().into(),
            elapsed: self.instant.elapsed(),
        }
    }
}

/// A snapshot of the stopwatch at a point in time.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchSnapshot {
    pub(crate) timestamp: DateTime<FixedOffset>,
    pub(crate) elapsed: Duration,
}
