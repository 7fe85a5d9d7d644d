// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The suite tree: named UI scenarios, their capturable states, and the
//! browsers they target.
//!
//! A tree is built once, before any run, via [`SuiteBuilder`]. Suites are
//! immutable after that: per-pass browser narrowing happens in
//! [`PassPlan`](crate::runner::PassPlan) values, never on the tree itself.

use crate::{config::RefractConfig, errors::SuiteBuildError};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{collections::HashSet, fmt, sync::Arc};

/// Identifier for a configured browser target, e.g. `chrome` or
/// `firefox-esr`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct BrowserId(SmolStr);

impl BrowserId {
    /// Creates a new browser id.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrowserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One capturable UI snapshot point within a suite.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct State {
    name: SmolStr,
}

impl State {
    /// Creates a new state.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the state's name.
    pub fn name(&self) -> &SmolStr {
        &self.name
    }
}

/// A named UI scenario: an ordered list of states, a set of target browsers,
/// and a retry budget.
///
/// Suites form a tree; the full name (ancestor names joined with spaces) is
/// the unique key a suite is tracked by throughout a run.
#[derive(Debug)]
pub struct Suite {
    name: SmolStr,
    full_name: SmolStr,
    url: Option<String>,
    retries: u32,
    browsers: Vec<BrowserId>,
    states: Vec<State>,
    children: Vec<Arc<Suite>>,
}

impl Suite {
    /// Returns the suite's own name.
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// Returns the suite's full name, unique within the tree.
    pub fn full_name(&self) -> &SmolStr {
        &self.full_name
    }

    /// Returns the url captured for this suite, relative to the configured
    /// root url.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns the suite's retry budget. 0 means mismatches are never
    /// retried.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Returns the browsers this suite was configured to target.
    ///
    /// This is the initial target set; the browsers actually executed in a
    /// given pass are carried by that pass's plan.
    pub fn browsers(&self) -> &[BrowserId] {
        &self.browsers
    }

    /// Returns the suite's states, in capture order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Returns the suite's child suites.
    pub fn children(&self) -> &[Arc<Suite>] {
        &self.children
    }

    /// Returns true if this suite has states to capture.
    pub fn has_states(&self) -> bool {
        !self.states.is_empty()
    }
}

/// Builder for a [`Suite`] tree.
#[derive(Clone, Debug)]
pub struct SuiteBuilder {
    name: SmolStr,
    url: Option<String>,
    retries: Option<u32>,
    browsers: Option<Vec<BrowserId>>,
    states: Vec<State>,
    children: Vec<SuiteBuilder>,
}

impl SuiteBuilder {
    /// Creates a builder for a suite with the given name.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            url: None,
            retries: None,
            browsers: None,
            states: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sets the url captured for this suite.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the retry budget, overriding the configured default.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Sets the target browsers, overriding the configured default.
    pub fn browsers(mut self, browsers: impl IntoIterator<Item = BrowserId>) -> Self {
        self.browsers = Some(browsers.into_iter().collect());
        self
    }

    /// Appends a capturable state.
    pub fn state(mut self, name: impl Into<SmolStr>) -> Self {
        self.states.push(State::new(name));
        self
    }

    /// Appends a child suite.
    pub fn child(mut self, child: SuiteBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Builds the suite tree, applying config defaults and validating
    /// browser ids against the configured browser table.
    pub fn build(self, config: &RefractConfig) -> Result<Arc<Suite>, SuiteBuildError> {
        let mut seen = HashSet::new();
        self.build_inner(None, config, &mut seen)
    }

    fn build_inner(
        self,
        parent_full_name: Option<&str>,
        config: &RefractConfig,
        seen: &mut HashSet<SmolStr>,
    ) -> Result<Arc<Suite>, SuiteBuildError> {
        let full_name: SmolStr = match parent_full_name {
            Some(parent) => SmolStr::from(format!("{parent} {}", self.name)),
            None => self.name.clone(),
        };
        if !seen.insert(full_name.clone()) {
            return Err(SuiteBuildError::DuplicateSuiteName { full_name });
        }

        let browsers = self
            .browsers
            .or_else(|| config.defaults.browsers.clone())
            .unwrap_or_else(|| config.browser_ids().cloned().collect());
        for browser_id in &browsers {
            if !config.browsers.contains_key(browser_id) {
                return Err(SuiteBuildError::UnknownBrowser {
                    suite: full_name,
                    browser_id: browser_id.clone(),
                    known: config.browser_ids().cloned().collect(),
                });
            }
        }

        let children = self
            .children
            .into_iter()
            .map(|child| child.build_inner(Some(&full_name), config, seen))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Arc::new(Suite {
            name: self.name,
            full_name,
            url: self.url,
            retries: self.retries.unwrap_or(config.defaults.retries),
            browsers,
            states: self.states,
            children,
        }))
    }
}

/// Flattens a suite tree into the depth-first list of suites that have
/// states to capture.
///
/// This is the list handed to [`PassPlan::new`](crate::runner::PassPlan::new)
/// for the initial pass.
pub fn flatten_suites(root: &Arc<Suite>) -> Vec<Arc<Suite>> {
    let mut flattened = Vec::new();
    collect_suites(root, &mut flattened);
    flattened
}

fn collect_suites(suite: &Arc<Suite>, flattened: &mut Vec<Arc<Suite>>) {
    if suite.has_states() {
        flattened.push(Arc::clone(suite));
    }
    for child in suite.children() {
        collect_suites(child, flattened);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn two_browser_config() -> RefractConfig {
        RefractConfig::from_toml_str(indoc! {r#"
            root-url = "https://example.com"

            [browsers.chrome]
            [browsers.firefox]

            [defaults]
            retries = 2
        "#})
        .expect("config is valid")
    }

    #[test]
    fn build_applies_defaults() {
        let config = two_browser_config();
        let root = SuiteBuilder::new("root")
            .child(SuiteBuilder::new("header").url("/").state("plain"))
            .build(&config)
            .expect("tree builds");

        let header = &root.children()[0];
        assert_eq!(header.full_name().as_str(), "root header");
        assert_eq!(header.retries(), 2);
        assert_eq!(
            header.browsers(),
            &[BrowserId::new("chrome"), BrowserId::new("firefox")],
        );
    }

    #[test]
    fn build_respects_overrides() {
        let config = two_browser_config();
        let root = SuiteBuilder::new("root")
            .child(
                SuiteBuilder::new("footer")
                    .url("/footer")
                    .retries(0)
                    .browsers([BrowserId::new("firefox")])
                    .state("plain"),
            )
            .build(&config)
            .expect("tree builds");

        let footer = &root.children()[0];
        assert_eq!(footer.retries(), 0);
        assert_eq!(footer.browsers(), &[BrowserId::new("firefox")]);
    }

    #[test]
    fn build_rejects_unknown_browser() {
        let config = two_browser_config();
        let err = SuiteBuilder::new("root")
            .child(
                SuiteBuilder::new("header")
                    .browsers([BrowserId::new("opera")])
                    .state("plain"),
            )
            .build(&config)
            .expect_err("opera is not configured");
        assert!(matches!(
            err,
            SuiteBuildError::UnknownBrowser { ref browser_id, .. }
                if browser_id.as_str() == "opera"
        ));
    }

    #[test]
    fn build_rejects_duplicate_full_names() {
        let config = two_browser_config();
        let err = SuiteBuilder::new("root")
            .child(SuiteBuilder::new("header").state("plain"))
            .child(SuiteBuilder::new("header").state("hovered"))
            .build(&config)
            .expect_err("two `root header` suites");
        assert!(matches!(
            err,
            SuiteBuildError::DuplicateSuiteName { ref full_name }
                if full_name.as_str() == "root header"
        ));
    }

    #[test]
    fn flatten_skips_stateless_suites() {
        let config = two_browser_config();
        let root = SuiteBuilder::new("root")
            .child(
                SuiteBuilder::new("header")
                    .state("plain")
                    .child(SuiteBuilder::new("menu").state("open")),
            )
            .child(SuiteBuilder::new("empty-group").child(SuiteBuilder::new("body").state("plain")))
            .build(&config)
            .expect("tree builds");

        let flattened = flatten_suites(&root);
        let names: Vec<_> = flattened
            .iter()
            .map(|suite| suite.full_name().as_str())
            .collect();
        assert_eq!(
            names,
            vec!["root header", "root header menu", "root empty-group body"],
        );
    }
}
