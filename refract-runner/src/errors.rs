// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by refract.

use crate::suite::BrowserId;
use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use smol_str::SmolStr;
use std::error;
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse refract config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the path to the config file the error occurred in.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }
}

/// An error that occurred while building the suite tree.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum SuiteBuildError {
    /// Two suites in the tree resolved to the same full name.
    #[error("duplicate suite full name `{full_name}`")]
    DuplicateSuiteName {
        /// The full name both suites resolved to.
        full_name: SmolStr,
    },

    /// A suite targets a browser id with no corresponding `[browsers.<id>]`
    /// entry in the config.
    #[error(
        "suite `{suite}` targets unknown browser `{browser_id}` (known browsers: {})",
        display_browser_list(.known)
    )]
    UnknownBrowser {
        /// The full name of the offending suite.
        suite: SmolStr,
        /// The browser id that isn't configured.
        browser_id: BrowserId,
        /// The browser ids that are configured.
        known: Vec<BrowserId>,
    },
}

fn display_browser_list(known: &[BrowserId]) -> String {
    known
        .iter()
        .map(BrowserId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A fatal collaborator fault that aborts the run.
///
/// This is distinct from an ordinary comparison mismatch, which is expected
/// signal and drives retries rather than erroring. No further pass is
/// attempted after a `PassError`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PassError {
    /// The browser pool failed to produce a live session.
    #[error("failed to acquire a `{browser_id}` session from the pool")]
    PoolAcquire {
        /// The browser that was requested.
        browser_id: BrowserId,
        /// The underlying pool error.
        #[source]
        source: Box<dyn error::Error + Send + Sync>,
    },

    /// Driving a browser through a suite's states failed.
    #[error("screenshot capture failed for suite `{suite}` in `{browser_id}`")]
    Capture {
        /// The full name of the suite being captured.
        suite: SmolStr,
        /// The browser the capture ran in.
        browser_id: BrowserId,
        /// The underlying capture error.
        #[source]
        source: Box<dyn error::Error + Send + Sync>,
    },

    /// The image comparator itself failed (not a mismatch).
    #[error("image comparison failed for suite `{suite}` in `{browser_id}`")]
    Compare {
        /// The full name of the suite being compared.
        suite: SmolStr,
        /// The browser the screenshot came from.
        browser_id: BrowserId,
        /// The underlying comparator error.
        #[source]
        source: Box<dyn error::Error + Send + Sync>,
    },
}
