// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Battery level percentage type.
//!
//! This module provides a type-safe representation of a battery charge,
//! ensuring values are always within the valid range of 0-100%.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Battery charge as a percentage (0-100).
///
/// Z-Wave battery command class reports use a single byte where values
/// above 100 carry special meanings (`255` is "low battery warning" on the
/// wire and "not a battery device" in Domoticz). Those never make it into a
/// `BatteryLevel`; sources decode them as an unknown reading instead.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::types::BatteryLevel;
///
/// let level = BatteryLevel::new(80).unwrap();
/// assert_eq!(level.value(), 80);
/// assert_eq!(level.to_string(), "80%");
///
/// assert!(BatteryLevel::new(101).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BatteryLevel(u8);

impl BatteryLevel {
    /// Empty battery (0%).
    pub const MIN: Self = Self(0);

    /// Fully charged battery (100%).
    pub const MAX: Self = Self(100);

    /// Creates a new battery level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: u16::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Creates a battery level, clamping to the valid range.
    ///
    /// ```
    /// use batterylevel_lib::types::BatteryLevel;
    ///
    /// assert_eq!(BatteryLevel::clamped(150).value(), 100);
    /// ```
    #[must_use]
    pub const fn clamped(value: u8) -> Self {
        if value > 100 { Self(100) } else { Self(value) }
    }

    /// Decodes a raw report, treating anything outside 0-100 as no reading.
    #[must_use]
    pub fn from_raw(raw: i64) -> Option<Self> {
        u8::try_from(raw).ok().and_then(|v| Self::new(v).ok())
    }

    /// Returns the percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for BatteryLevel {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatteryLevel> for u8 {
    fn from(level: BatteryLevel) -> Self {
        level.0
    }
}
