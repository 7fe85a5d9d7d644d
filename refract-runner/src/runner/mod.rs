// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The retry runner.
//!
//! The main structure in this module is [`RetryRunner`].

mod imp;

pub use imp::*;
