// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field-level loaders: clamp each value into its own range, never fail.

use std::fmt;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::BandThresholds;

use super::Settings;

/// A configuration value as supplied by the host.
///
/// Hosts hand parameters over as text, settings documents as JSON numbers
/// or booleans. Any other JSON value is kept as is so that it only
/// invalidates its own field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// A JSON boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// Free text, parsed on use.
    Text(String),
    /// Any other JSON value: floats, integers beyond `i64`, arrays, objects.
    Other(serde_json::Value),
}

impl RawValue {
    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Other(_) => None,
        }
    }

    pub(crate) fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(0) => Some(false),
            Self::Int(1) => Some(true),
            Self::Int(_) => None,
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "debug" => Some(true),
                "false" | "0" | "no" | "normal" | "" => Some(false),
                _ => None,
            },
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Something noteworthy that happened while loading configuration.
///
/// Warnings never stop the load; the affected field gets a usable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The requested value was below the field's range.
    TooLow {
        /// Field name.
        field: &'static str,
        /// The value the host asked for.
        requested: i64,
        /// The value actually used.
        applied: i64,
    },
    /// The requested value was above the field's range.
    TooHigh {
        /// Field name.
        field: &'static str,
        /// The value the host asked for.
        requested: i64,
        /// The value actually used.
        applied: i64,
    },
    /// The value could not be interpreted; the default was used.
    Invalid {
        /// What was wrong with the value.
        error: ConfigError,
        /// The default that replaced it.
        applied: i64,
    },
}

impl ConfigWarning {
    /// Returns the name of the field this warning is about.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::TooLow { field, .. } | Self::TooHigh { field, .. } => *field,
            Self::Invalid { error, .. } => match error {
                ConfigError::NotNumeric { field, .. } | ConfigError::NotFlag { field, .. } => {
                    *field
                }
                ConfigError::Document(_) => "settings",
            },
        }
    }

    /// Returns the value that was applied for the field.
    #[must_use]
    pub fn applied(&self) -> i64 {
        match self {
            Self::TooLow { applied, .. }
            | Self::TooHigh { applied, .. }
            | Self::Invalid { applied, .. } => *applied,
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLow {
                field,
                requested,
                applied,
            } => write!(f, "specified {field} value {requested} too low: changed to {applied}"),
            Self::TooHigh {
                field,
                requested,
                applied,
            } => write!(f, "specified {field} value {requested} too high: changed to {applied}"),
            Self::Invalid { error, applied } => write!(f, "{error}: using default {applied}"),
        }
    }
}

/// A value together with the warnings raised while producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    /// The usable value.
    pub value: T,
    /// Warnings in field order; empty when everything was accepted as is.
    pub warnings: Vec<ConfigWarning>,
}

/// Range and default of one integer setting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldRange {
    pub name: &'static str,
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

// Defaults come from the types that own them; the casts only widen.
#[allow(clippy::cast_lossless)]
pub(crate) const FULL: FieldRange = FieldRange {
    name: "battery full",
    min: 75,
    max: 99,
    default: BandThresholds::DEFAULT_FULL as i64,
};

#[allow(clippy::cast_lossless)]
pub(crate) const OK: FieldRange = FieldRange {
    name: "battery ok",
    min: 40,
    max: 75,
    default: BandThresholds::DEFAULT_OK as i64,
};

#[allow(clippy::cast_lossless)]
pub(crate) const LOW: FieldRange = FieldRange {
    name: "battery low",
    min: 10,
    max: 25,
    default: BandThresholds::DEFAULT_LOW as i64,
};

#[allow(clippy::cast_lossless)]
pub(crate) const INTERVAL: FieldRange = FieldRange {
    name: "polling interval",
    min: 30,
    max: 1440,
    default: Settings::DEFAULT_POLL_INTERVAL_MINUTES as i64,
};

impl FieldRange {
    /// Resolves a raw value into the field's range, recording any warning.
    pub(crate) fn resolve(self, raw: &RawValue, warnings: &mut Vec<ConfigWarning>) -> i64 {
        let Some(requested) = raw.as_int() else {
            warnings.push(ConfigWarning::Invalid {
                error: ConfigError::NotNumeric {
                    field: self.name,
                    value: raw.to_string(),
                },
                applied: self.default,
            });
            return self.default;
        };

        if requested < self.min {
            warnings.push(ConfigWarning::TooLow {
                field: self.name,
                requested,
                applied: self.min,
            });
            self.min
        } else if requested > self.max {
            warnings.push(ConfigWarning::TooHigh {
                field: self.name,
                requested,
                applied: self.max,
            });
            self.max
        } else {
            requested
        }
    }
}

/// Validates the three band thresholds.
///
/// Fields are checked in the order full, ok, low, each against its own
/// range only: full 75-99, ok 40-75, low 10-25. Out-of-range values are
/// clamped to the nearest bound, non-numeric values fall back to the
/// field's default (75, 50, 25). The fields are not checked against one
/// another.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::config::load_thresholds;
///
/// let loaded = load_thresholds(40, 50, 25);
/// assert_eq!(loaded.value.full, 75);
/// assert_eq!(loaded.warnings.len(), 1);
///
/// let loaded = load_thresholds("80", "abc", 12);
/// assert_eq!((loaded.value.full, loaded.value.ok, loaded.value.low), (80, 50, 12));
/// assert_eq!(loaded.warnings.len(), 1);
/// ```
#[must_use]
pub fn load_thresholds(
    full: impl Into<RawValue>,
    ok: impl Into<RawValue>,
    low: impl Into<RawValue>,
) -> Loaded<BandThresholds> {
    let mut warnings = Vec::new();
    let full = FULL.resolve(&full.into(), &mut warnings);
    let ok = OK.resolve(&ok.into(), &mut warnings);
    let low = LOW.resolve(&low.into(), &mut warnings);

    Loaded {
        value: BandThresholds::new(to_percent(full), to_percent(ok), to_percent(low)),
        warnings,
    }
}

/// Validates the polling interval in minutes (30-1440, default 60).
#[must_use]
pub fn load_poll_interval(minutes: impl Into<RawValue>) -> Loaded<u16> {
    let mut warnings = Vec::new();
    let value = INTERVAL.resolve(&minutes.into(), &mut warnings);
    Loaded {
        value: u16::try_from(value).unwrap_or(u16::MAX),
        warnings,
    }
}

// Every percent field's range lies inside 0..=99.
fn to_percent(value: i64) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_through() {
        let loaded = load_thresholds(75, 50, 25);
        assert_eq!(loaded.value, BandThresholds::default());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn full_too_low_is_raised() {
        let loaded = load_thresholds(40, 50, 25);
        assert_eq!(loaded.value.full, 75);
        assert_eq!(
            loaded.warnings,
            vec![ConfigWarning::TooLow {
                field: "battery full",
                requested: 40,
                applied: 75,
            }]
        );
    }

    #[test]
    fn full_too_high_is_lowered() {
        let loaded = load_thresholds(150, 50, 25);
        assert_eq!(loaded.value.full, 99);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(matches!(
            loaded.warnings[0],
            ConfigWarning::TooHigh { applied: 99, .. }
        ));
    }

    #[test]
    fn fields_clamp_independently() {
        let loaded = load_thresholds(10, 90, 0);
        assert_eq!(loaded.value, BandThresholds::new(75, 75, 10));
        let fields: Vec<_> = loaded.warnings.iter().map(ConfigWarning::field).collect();
        assert_eq!(fields, vec!["battery full", "battery ok", "battery low"]);
    }

    #[test]
    fn overlapping_bands_are_accepted() {
        let loaded = load_thresholds(75, 25, 25);
        // ok is clamped to its own floor, not compared with low
        assert_eq!(loaded.value, BandThresholds::new(75, 40, 25));
        assert_eq!(loaded.warnings.len(), 1);

        let loaded = load_thresholds(75, 75, 25);
        assert_eq!(loaded.value, BandThresholds::new(75, 75, 25));
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn non_numeric_field_uses_default_only_for_that_field() {
        let loaded = load_thresholds("90", "lots", " 12 ");
        assert_eq!(loaded.value, BandThresholds::new(90, 50, 12));
        assert_eq!(loaded.warnings.len(), 1);
        match &loaded.warnings[0] {
            ConfigWarning::Invalid { error, applied } => {
                assert_eq!(*applied, 50);
                assert!(matches!(error, ConfigError::NotNumeric { field: "battery ok", .. }));
            }
            other => panic!("unexpected warning {other:?}"),
        }
    }

    #[test]
    fn boolean_is_not_a_number() {
        let loaded = load_thresholds(true, 50, 25);
        assert_eq!(loaded.value.full, 75);
        assert_eq!(loaded.warnings[0].field(), "battery full");
    }

    #[test]
    fn interval_is_clamped() {
        assert_eq!(load_poll_interval(60).value, 60);
        let short = load_poll_interval(5);
        assert_eq!(short.value, 30);
        assert_eq!(short.warnings.len(), 1);
        let long = load_poll_interval("10000");
        assert_eq!(long.value, 1440);
        let bad = load_poll_interval("hourly");
        assert_eq!(bad.value, 60);
        assert!(matches!(bad.warnings[0], ConfigWarning::Invalid { .. }));
    }

    #[test]
    fn defaults_match_owning_types() {
        assert_eq!(load_poll_interval("never").value, Settings::DEFAULT_POLL_INTERVAL_MINUTES);
        assert_eq!(
            load_thresholds("a", "b", "c").value,
            BandThresholds::default()
        );
        assert_eq!(INTERVAL.default, 60);
    }

    #[test]
    fn warning_display() {
        let w = ConfigWarning::TooHigh {
            field: "battery full",
            requested: 150,
            applied: 99,
        };
        assert_eq!(
            w.to_string(),
            "specified battery full value 150 too high: changed to 99"
        );
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(RawValue::from("Debug").as_flag(), Some(true));
        assert_eq!(RawValue::from("Normal").as_flag(), Some(false));
        assert_eq!(RawValue::from(true).as_flag(), Some(true));
        assert_eq!(RawValue::from(1).as_flag(), Some(true));
        assert_eq!(RawValue::from("maybe").as_flag(), None);
    }
}
