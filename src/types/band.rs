// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Severity bands and their thresholds.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::BatteryLevel;

/// Severity classification of a battery level.
///
/// Variants are ordered by charge, so `Band::Empty < Band::Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    /// Below the low threshold.
    Empty,
    /// At or above the low threshold.
    Low,
    /// At or above the ok threshold.
    Ok,
    /// At or above the full threshold.
    Full,
}

impl Band {
    /// All bands, from most to least severe.
    pub const ALL: [Self; 4] = [Self::Empty, Self::Low, Self::Ok, Self::Full];

    /// Returns the host icon key used to render this band.
    #[must_use]
    pub const fn icon_name(self) -> &'static str {
        match self {
            Self::Full => "batterylevelfull",
            Self::Ok => "batterylevelok",
            Self::Low => "batterylevellow",
            Self::Empty => "batterylevelempty",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Full => "full",
            Self::Ok => "ok",
            Self::Low => "low",
            Self::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// Lower bounds, in percent, of the `Full`, `Ok` and `Low` bands.
///
/// Use [`crate::config::load_thresholds`] to build one from user input;
/// that path clamps each field into its documented range. The fields are
/// not checked against each other, so overlapping bands are possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BandThresholds {
    /// Minimum percentage reported as `Full` (75-99).
    pub full: u8,
    /// Minimum percentage reported as `Ok` (40-75).
    pub ok: u8,
    /// Minimum percentage reported as `Low` (10-25).
    pub low: u8,
}

impl BandThresholds {
    /// Default full threshold.
    pub const DEFAULT_FULL: u8 = 75;
    /// Default ok threshold.
    pub const DEFAULT_OK: u8 = 50;
    /// Default low threshold.
    pub const DEFAULT_LOW: u8 = 25;

    /// Creates thresholds from already validated values.
    #[must_use]
    pub const fn new(full: u8, ok: u8, low: u8) -> Self {
        Self { full, ok, low }
    }

    /// Classifies a level against these thresholds.
    #[must_use]
    pub fn classify(&self, level: BatteryLevel) -> Band {
        classify(level, self)
    }
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FULL, Self::DEFAULT_OK, Self::DEFAULT_LOW)
    }
}

/// Maps a battery level to its band.
///
/// Thresholds are tested from the top down, so with overlapping thresholds
/// the higher band wins.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::types::{classify, Band, BandThresholds, BatteryLevel};
///
/// let t = BandThresholds::default();
/// assert_eq!(classify(BatteryLevel::new(80).unwrap(), &t), Band::Full);
/// assert_eq!(classify(BatteryLevel::new(50).unwrap(), &t), Band::Ok);
/// assert_eq!(classify(BatteryLevel::new(30).unwrap(), &t), Band::Low);
/// assert_eq!(classify(BatteryLevel::new(5).unwrap(), &t), Band::Empty);
/// ```
#[must_use]
pub fn classify(level: BatteryLevel, thresholds: &BandThresholds) -> Band {
    let p = level.value();
    if p >= thresholds.full {
        Band::Full
    } else if p >= thresholds.ok {
        Band::Ok
    } else if p >= thresholds.low {
        Band::Low
    } else {
        Band::Empty
    }
}
