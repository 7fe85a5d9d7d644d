// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event stream consumed by reporters.
//!
//! Rendering (console, HTML) lives outside this crate. Reporters observe a
//! run by consuming the [`events::RunEvent`] values the runner produces; the
//! runner never reorders or rewrites base-runner results, it only decides
//! whether a result is finalized now or deferred to a later pass.

pub mod events;
