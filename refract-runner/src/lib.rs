// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core retry orchestration for refract visual-regression runs.
//!
//! A run executes a flattened suite tree across remote browsers in concurrent
//! *passes*. Screenshot comparisons are noisy, so results that mismatch are
//! retried: after each pass the [`runner::RetryRunner`] computes a minimal
//! plan of (suite, browser) pairs that still need work and recurses into
//! another pass, bounded by each suite's retry budget.
//!
//! The actual pass execution (browser pooling, capture, comparison) is an
//! external collaborator injected through the [`runner::PassRunner`] trait.

pub mod config;
pub mod errors;
pub mod reporter;
pub mod runner;
pub mod suite;
mod time;
