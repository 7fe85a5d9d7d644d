// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::PassError,
    reporter::events::{RunEvent, RunEventKind, RunId},
    suite::{BrowserId, Suite},
    time::{StopwatchStart, stopwatch},
};
use camino::Utf8PathBuf;
use indexmap::{IndexMap, map::Entry};
use smol_str::SmolStr;
use std::{future::Future, pin::pin, sync::Arc};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::debug;

/// The outcome of one (suite, browser) pair within a pass.
///
/// Produced by a [`PassRunner`]. The `attempt` field is filled in by the
/// [`RetryRunner`] before the result is forwarded anywhere; pass runners
/// leave it at 0.
#[derive(Clone, Debug)]
pub struct TestResult {
    /// The suite that was captured.
    pub suite: Arc<Suite>,

    /// The name of the state whose comparison decided this outcome. For a
    /// multi-state suite this is the first state that mismatched, or the
    /// last state captured if everything matched.
    pub state: SmolStr,

    /// The browser the suite ran in.
    pub browser_id: BrowserId,

    /// The 0-based pass number this result was produced in.
    pub attempt: u32,

    /// Whether the captured screenshot matched the stored reference.
    pub equal: bool,

    /// The remote session the capture ran in.
    pub session_id: String,

    /// The path to the stored reference image.
    pub reference_path: Utf8PathBuf,

    /// The path to the freshly captured image.
    pub current_path: Utf8PathBuf,
}

/// Data related to retries of one deferred result.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct RetryData {
    /// The 0-based attempt the deferred result was produced in.
    pub attempt: u32,

    /// The number of retries left for the suite, counting the one about to
    /// be scheduled. Always at least 1.
    pub retries_left: u32,
}

/// Statistics for a run.
///
/// Each (suite, browser) pair finalizes exactly once over the course of a
/// run, however many passes it took to get there.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    /// The number of (suite, browser) pairs in the initial pass.
    pub initial_pair_count: usize,

    /// The number of pairs that finalized.
    pub finished_count: usize,

    /// The number of pairs that finalized with a matching screenshot.
    /// Includes `flaky`.
    pub passed: usize,

    /// The number of pairs that matched only after at least one retry.
    pub flaky: usize,

    /// The number of pairs that finalized with a mismatch after exhausting
    /// their suite's retry budget.
    pub failed: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success: every initially
    /// planned pair finalized and none of them failed.
    pub fn is_success(&self) -> bool {
        self.finished_count >= self.initial_pair_count && self.failed == 0
    }

    fn on_test_finished(&mut self, result: &TestResult) {
        self.finished_count += 1;
        if result.equal {
            self.passed += 1;
            if result.attempt > 0 {
                self.flaky += 1;
            }
        } else {
            self.failed += 1;
        }
    }
}

/// An immutable execution plan for one pass: each suite paired with the
/// exact browser set to run it in.
///
/// The initial plan carries every suite's configured browsers; retry plans
/// carry, per suite, exactly the browsers that mismatched in the previous
/// pass. Plans are computed from the result stream and handed to the next
/// pass as an explicit argument, so the suite tree itself is never mutated
/// between passes.
#[derive(Clone, Debug)]
pub struct PassPlan {
    entries: Vec<PassEntry>,
}

/// One suite's share of a [`PassPlan`].
#[derive(Clone, Debug)]
pub struct PassEntry {
    suite: Arc<Suite>,
    browsers: Vec<BrowserId>,
}

impl PassEntry {
    /// The suite to execute.
    pub fn suite(&self) -> &Arc<Suite> {
        &self.suite
    }

    /// The browsers to execute the suite in.
    pub fn browsers(&self) -> &[BrowserId] {
        &self.browsers
    }
}

impl PassPlan {
    /// Builds the initial plan: every suite with its configured browsers.
    pub fn new(suites: impl IntoIterator<Item = Arc<Suite>>) -> Self {
        let entries = suites
            .into_iter()
            .map(|suite| {
                let browsers = suite.browsers().to_vec();
                PassEntry { suite, browsers }
            })
            .collect();
        Self { entries }
    }

    /// The entries in this plan, in execution order.
    pub fn entries(&self) -> &[PassEntry] {
        &self.entries
    }

    /// The number of suites in this plan.
    pub fn suite_count(&self) -> usize {
        self.entries.len()
    }

    /// The total number of (suite, browser) pairs in this plan.
    pub fn pair_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.browsers.len()).sum()
    }

    /// Returns true if there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single-pass executor driven by the [`RetryRunner`].
///
/// Implementations fan the plan's (suite, browser) pairs out across their
/// browser pool, bounded by the pool's capacity, and send one [`TestResult`]
/// per finished pair on `results`, in whatever order pairs complete. The
/// returned future resolves only once every in-flight pair has settled.
///
/// A comparison mismatch is an ordinary result with `equal: false`. `Err` is
/// reserved for fatal collaborator faults (pool, capture, comparator); it
/// aborts the whole run, so a capture timeout that should merely fail the
/// pair must be reported as a non-equal result instead.
pub trait PassRunner {
    /// Executes one pass over `plan`.
    fn run_pass(
        &mut self,
        plan: PassPlan,
        results: UnboundedSender<TestResult>,
    ) -> impl Future<Output = Result<(), PassError>> + Send;
}

/// Aggregated failures for one suite within the current pass.
#[derive(Clone, Debug)]
struct FailedSuiteInfo {
    suite: Arc<Suite>,
    browsers: Vec<BrowserId>,
}

/// Retry runner options.
#[derive(Debug, Default)]
pub struct RetryRunnerBuilder {
    run_id: Option<RunId>,
}

impl RetryRunnerBuilder {
    /// Overrides the generated run id.
    pub fn set_run_id(&mut self, run_id: RunId) -> &mut Self {
        self.run_id = Some(run_id);
        self
    }

    /// Creates a new retry runner on top of `base`.
    pub fn build<R: PassRunner>(self, base: R) -> RetryRunner<R> {
        RetryRunner {
            base,
            ctx: RunnerContext {
                run_id: self.run_id.unwrap_or_else(RunId::new_v4),
                passes_performed: 0,
                failed_suites: IndexMap::new(),
                run_stats: RunStats::default(),
            },
        }
    }
}

/// Drives a visual-regression run to completion.
///
/// A run is a sequence of strictly sequential passes. Within a pass the base
/// [`PassRunner`] executes (suite, browser) pairs concurrently; every result
/// flows through this runner, which either finalizes it or defers it and, at
/// pass end, recurses into another pass containing exactly the pairs that
/// still need work. See [`RetryRunner::execute`].
pub struct RetryRunner<R> {
    base: R,
    ctx: RunnerContext,
}

impl<R: PassRunner> RetryRunner<R> {
    /// Executes the run over the given suites, invoking `callback` for every
    /// [`RunEvent`].
    ///
    /// Returns the final statistics, or the first fatal collaborator fault.
    /// Comparison mismatches never produce an `Err`; once a suite exhausts
    /// its retry budget they show up in [`RunStats::failed`].
    pub async fn execute<F>(
        mut self,
        suites: Vec<Arc<Suite>>,
        mut callback: F,
    ) -> Result<RunStats, PassError>
    where
        F: FnMut(RunEvent),
    {
        let stopwatch = stopwatch();
        let mut plan = PassPlan::new(suites);
        self.ctx.run_stats.initial_pair_count = plan.pair_count();

        callback(make_event(
            &stopwatch,
            RunEventKind::RunStarted {
                run_id: self.ctx.run_id,
                suite_count: plan.suite_count(),
                pair_count: plan.pair_count(),
            },
        ));

        loop {
            let attempt = self.ctx.passes_performed;
            debug!(
                attempt,
                suites = plan.suite_count(),
                pairs = plan.pair_count(),
                "starting pass"
            );
            callback(make_event(
                &stopwatch,
                RunEventKind::PassStarted {
                    attempt,
                    pair_count: plan.pair_count(),
                },
            ));

            let (results_tx, mut results_rx) = unbounded_channel();
            let mut pass_fut = pin!(self.base.run_pass(plan, results_tx));
            let mut pass_result = None;
            loop {
                tokio::select! {
                    res = &mut pass_fut, if pass_result.is_none() => {
                        pass_result = Some(res);
                    }
                    maybe_result = results_rx.recv() => {
                        match maybe_result {
                            Some(result) => {
                                self.ctx.on_test_complete(result, &stopwatch, &mut callback);
                            }
                            None => break,
                        }
                    }
                }
            }
            // The sender can be dropped before the pass future resolves;
            // every result has been seen either way.
            match pass_result {
                Some(res) => res?,
                None => pass_fut.await?,
            }

            let retry_plan = self.ctx.build_retry_plan();
            let retry_suite_count = retry_plan.as_ref().map_or(0, PassPlan::suite_count);
            callback(make_event(
                &stopwatch,
                RunEventKind::PassFinished {
                    attempt,
                    retry_suite_count,
                },
            ));

            match retry_plan {
                Some(next_plan) => {
                    self.ctx.passes_performed += 1;
                    plan = next_plan;
                }
                None => break,
            }
        }

        debug!(
            passes = self.ctx.passes_performed + 1,
            stats = ?self.ctx.run_stats,
            "run finished"
        );
        callback(make_event(
            &stopwatch,
            RunEventKind::RunFinished {
                run_id: self.ctx.run_id,
                start_time: stopwatch.start_time(),
                run_stats: self.ctx.run_stats,
            },
        ));
        Ok(self.ctx.run_stats)
    }
}

/// Orchestrator state, separate from the base runner so that results can be
/// processed while a pass future borrows the base.
#[derive(Debug)]
struct RunnerContext {
    run_id: RunId,
    /// The number of completed passes, shared by every suite in the run.
    passes_performed: u32,
    /// Failures aggregated during the current pass, keyed by suite full
    /// name in arrival order. Drained when the retry plan is built.
    failed_suites: IndexMap<SmolStr, FailedSuiteInfo>,
    run_stats: RunStats,
}

impl RunnerContext {
    /// Called once per finished (suite, browser) pair. Finalizes the result
    /// or defers it for retry; exactly one of the two.
    fn on_test_complete<F>(
        &mut self,
        mut result: TestResult,
        stopwatch: &StopwatchStart,
        callback: &mut F,
    ) where
        F: FnMut(RunEvent),
    {
        result.attempt = self.passes_performed;

        if !self.needs_retry(&result) {
            self.run_stats.on_test_finished(&result);
            callback(make_event(
                stopwatch,
                RunEventKind::TestFinished {
                    current_stats: self.run_stats,
                    result,
                },
            ));
            return;
        }

        let retry_data = RetryData {
            attempt: result.attempt,
            retries_left: result.suite.retries() - self.passes_performed,
        };
        debug!(
            suite = %result.suite.full_name(),
            browser = %result.browser_id,
            attempt = retry_data.attempt,
            retries_left = retry_data.retries_left,
            "deferring mismatched pair for retry"
        );
        callback(make_event(
            stopwatch,
            RunEventKind::TestRetry {
                result: result.clone(),
                retry_data,
            },
        ));
        self.record_failure(result);
    }

    /// One pass counter is shared by every suite: a suite stops being
    /// retried once the counter reaches its own budget, even while suites
    /// with larger budgets continue.
    fn needs_retry(&self, result: &TestResult) -> bool {
        !result.equal && result.suite.retries() > self.passes_performed
    }

    fn record_failure(&mut self, result: TestResult) {
        match self.failed_suites.entry(result.suite.full_name().clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().browsers.push(result.browser_id);
            }
            Entry::Vacant(entry) => {
                entry.insert(FailedSuiteInfo {
                    suite: result.suite,
                    browsers: vec![result.browser_id],
                });
            }
        }
    }

    /// Turns the failures aggregated during this pass into the next pass's
    /// plan, or `None` if nothing needs to be re-executed.
    fn build_retry_plan(&mut self) -> Option<PassPlan> {
        if self.failed_suites.is_empty() {
            return None;
        }
        let entries = self
            .failed_suites
            .drain(..)
            .map(|(_, info)| PassEntry {
                suite: info.suite,
                browsers: info.browsers,
            })
            .collect();
        Some(PassPlan { entries })
    }
}

fn make_event(stopwatch: &StopwatchStart, kind: RunEventKind) -> RunEvent {
    let snapshot = stopwatch.snapshot();
    RunEvent {
        timestamp: snapshot.timestamp,
        elapsed: snapshot.elapsed,
        kind,
    }
}
