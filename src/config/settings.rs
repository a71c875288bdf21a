// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monitor settings: raw host parameters and their resolved form.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::BandThresholds;

use super::fields::{ConfigWarning, Loaded, RawValue, load_poll_interval, load_thresholds};

/// Settings exactly as the host provides them.
///
/// Every field is optional; a missing field takes its default without a
/// warning. Field names also accept the `Mode1`..`Mode6` parameter slots
/// used by the Domoticz plugin form.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::config::RawSettings;
///
/// let raw = RawSettings::from_json(r#"{"interval": "120", "full": 80, "debug": "Debug"}"#).unwrap();
/// let loaded = raw.resolve();
/// assert_eq!(loaded.value.poll_interval_minutes, 120);
/// assert_eq!(loaded.value.thresholds.full, 80);
/// assert!(loaded.value.debug);
/// assert!(loaded.warnings.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawSettings {
    /// Polling interval in minutes.
    #[serde(default, alias = "Mode1")]
    pub interval: Option<RawValue>,
    /// Full threshold in percent.
    #[serde(default, alias = "Mode2")]
    pub full: Option<RawValue>,
    /// Ok threshold in percent.
    #[serde(default, alias = "Mode3")]
    pub ok: Option<RawValue>,
    /// Low threshold in percent.
    #[serde(default, alias = "Mode4")]
    pub low: Option<RawValue>,
    /// Verbose logging flag.
    #[serde(default, alias = "Mode6")]
    pub debug: Option<RawValue>,
}

impl RawSettings {
    /// Parses a JSON settings document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Document` if the document is not a JSON object
    /// of the expected shape.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Document(e.to_string()))
    }

    /// Validates every field, see [`Settings::resolve`].
    #[must_use]
    pub fn resolve(&self) -> Loaded<Settings> {
        Settings::resolve(self)
    }
}

/// Validated monitor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Band thresholds.
    pub thresholds: BandThresholds,
    /// Minutes between two ticks (30-1440).
    pub poll_interval_minutes: u16,
    /// Whether the host asked for verbose output.
    pub debug: bool,
}

impl Settings {
    /// Default polling interval in minutes.
    pub const DEFAULT_POLL_INTERVAL_MINUTES: u16 = 60;

    /// Resolves raw settings into usable ones.
    ///
    /// Never fails: each invalid field is replaced by a clamped or default
    /// value and reported once, through the returned warnings and a
    /// `warn`-level log event.
    #[must_use]
    pub fn resolve(raw: &RawSettings) -> Loaded<Self> {
        let mut settings = Self::default();
        let mut warnings = Vec::new();

        if raw.full.is_some() || raw.ok.is_some() || raw.low.is_some() {
            let defaults = BandThresholds::default();
            let loaded = load_thresholds(
                raw.full
                    .clone()
                    .unwrap_or(RawValue::Int(i64::from(defaults.full))),
                raw.ok
                    .clone()
                    .unwrap_or(RawValue::Int(i64::from(defaults.ok))),
                raw.low
                    .clone()
                    .unwrap_or(RawValue::Int(i64::from(defaults.low))),
            );
            settings.thresholds = loaded.value;
            warnings.extend(loaded.warnings);
        }

        if let Some(interval) = &raw.interval {
            let loaded = load_poll_interval(interval.clone());
            settings.poll_interval_minutes = loaded.value;
            warnings.extend(loaded.warnings);
        }

        if let Some(debug) = &raw.debug {
            match debug.as_flag() {
                Some(flag) => settings.debug = flag,
                None => warnings.push(ConfigWarning::Invalid {
                    error: ConfigError::NotFlag {
                        field: "debug",
                        value: debug.to_string(),
                    },
                    applied: 0,
                }),
            }
        }

        for warning in &warnings {
            tracing::warn!(field = warning.field(), "{warning}");
        }
        tracing::info!(
            full = settings.thresholds.full,
            ok = settings.thresholds.ok,
            low = settings.thresholds.low,
            interval_minutes = settings.poll_interval_minutes,
            debug = settings.debug,
            "Battery monitor settings resolved"
        );

        Loaded {
            value: settings,
            warnings,
        }
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.poll_interval_minutes) * 60)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thresholds: BandThresholds::default(),
            poll_interval_minutes: Self::DEFAULT_POLL_INTERVAL_MINUTES,
            debug: false,
        }
    }
}
