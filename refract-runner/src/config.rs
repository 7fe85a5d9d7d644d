// Copyright (c) The refract Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run configuration, read from `refract.toml`.

use crate::{errors::ConfigParseError, suite::BrowserId};
use camino::Utf8Path;
use config::{Config, File, FileFormat};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{cmp::Ordering, fmt};

/// The name of the default config file.
pub const CONFIG_FILE_NAME: &str = "refract.toml";

/// Refract run configuration.
///
/// Suite authors consult this through [`SuiteBuilder::build`](crate::suite::SuiteBuilder::build),
/// which applies [`SuiteDefaults`] and validates browser ids against the
/// configured [`browsers`](Self::browsers) table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RefractConfig {
    /// The base URL suite urls are resolved against.
    pub root_url: String,

    /// The remote grid endpoint the browser pool connects to.
    #[serde(default)]
    pub grid_url: Option<String>,

    /// Configured browser targets, in declaration order.
    pub browsers: IndexMap<BrowserId, BrowserConfig>,

    /// Defaults applied to suites that don't specify their own.
    #[serde(default)]
    pub defaults: SuiteDefaults,
}

impl RefractConfig {
    /// Reads configuration from a TOML file on disk.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigParseError> {
        let config = Config::builder()
            .add_source(File::new(path.as_str(), FileFormat::Toml))
            .build()
            .map_err(|err| ConfigParseError::new(path, err))?;
        config
            .try_deserialize()
            .map_err(|err| ConfigParseError::new(path, err))
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigParseError> {
        let config = Config::builder()
            .add_source(File::from_str(input, FileFormat::Toml))
            .build()
            .map_err(|err| ConfigParseError::new("<string>", err))?;
        config
            .try_deserialize()
            .map_err(|err| ConfigParseError::new("<string>", err))
    }

    /// Returns the configured browser ids, in declaration order.
    pub fn browser_ids(&self) -> impl Iterator<Item = &BrowserId> {
        self.browsers.keys()
    }
}

/// Configuration for one browser target.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BrowserConfig {
    /// Desired capabilities forwarded to the remote session.
    #[serde(default)]
    pub desired_capabilities: IndexMap<String, String>,

    /// Browser window size, e.g. `1280x1024`.
    #[serde(default)]
    pub window_size: Option<String>,
}

/// Defaults applied to suites that don't set their own values.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SuiteDefaults {
    /// The default retry budget. 0 means mismatching suites are never
    /// retried.
    #[serde(default, deserialize_with = "deserialize_retries")]
    pub retries: u32,

    /// The default browser targets. When absent, suites target every
    /// configured browser.
    #[serde(default)]
    pub browsers: Option<Vec<BrowserId>>,
}

impl Default for SuiteDefaults {
    fn default() -> Self {
        Self {
            retries: 0,
            browsers: None,
        }
    }
}

fn deserialize_retries<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct V;

    impl serde::de::Visitor<'_> for V {
        type Value = u32;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a non-negative number of retries")
        }

        // Note that TOML uses i64, not u64.
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            match v.cmp(&0) {
                Ordering::Greater | Ordering::Equal => u32::try_from(v).map_err(|_| {
                    serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &"a positive u32",
                    )
                }),
                Ordering::Less => Err(serde::de::Error::invalid_value(
                    serde::de::Unexpected::Signed(v),
                    &self,
                )),
            }
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u32::try_from(v).map_err(|_| {
                serde::de::Error::invalid_value(serde::de::Unexpected::Unsigned(v), &"a u32")
            })
        }
    }

    deserializer.deserialize_any(V)
}
