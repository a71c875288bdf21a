// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node readings and snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{BatteryLevel, NodeId};

/// Maximum age of source data before the whole snapshot is rejected.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

/// Battery state of a node as seen in one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reading {
    /// A valid percentage.
    Level(BatteryLevel),
    /// The node is listed but has no usable value this time (asleep,
    /// sentinel value, not a battery device).
    Unknown,
}

impl Reading {
    /// Decodes a raw percentage; anything outside 0-100 is `Unknown`.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        BatteryLevel::from_raw(raw).map_or(Self::Unknown, Self::Level)
    }

    /// Returns the level, if known.
    #[must_use]
    pub fn level(&self) -> Option<BatteryLevel> {
        match self {
            Self::Level(level) => Some(*level),
            Self::Unknown => None,
        }
    }
}

impl From<BatteryLevel> for Reading {
    fn from(level: BatteryLevel) -> Self {
        Self::Level(level)
    }
}

/// One node's entry in a snapshot.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::source::{NodeReading, Reading};
/// use batterylevel_lib::types::NodeId;
///
/// let reading = NodeReading::new(NodeId::new(5), "", Reading::from_raw(80));
/// assert_eq!(reading.name(), "Node 5");
/// assert_eq!(reading.reading().level().unwrap().value(), 80);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReading {
    id: NodeId,
    name: String,
    reading: Reading,
}

impl NodeReading {
    /// Creates a reading; a blank name is replaced with `Node {id}`.
    #[must_use]
    pub fn new(id: NodeId, name: impl Into<String>, reading: Reading) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            format!("Node {id}")
        } else {
            name
        };
        Self { id, name, reading }
    }

    /// Creates a reading from a raw percentage, see [`Reading::from_raw`].
    #[must_use]
    pub fn from_raw(id: NodeId, name: impl Into<String>, raw: i64) -> Self {
        Self::new(id, name, Reading::from_raw(raw))
    }

    /// Returns the node identifier.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the battery state.
    #[must_use]
    pub fn reading(&self) -> Reading {
        self.reading
    }
}

/// The complete set of readings obtained in one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    readings: Vec<NodeReading>,
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a snapshot captured now.
    #[must_use]
    pub fn new(readings: Vec<NodeReading>) -> Self {
        Self::with_timestamp(readings, Utc::now())
    }

    /// Creates a snapshot whose data dates from `captured_at`.
    #[must_use]
    pub fn with_timestamp(readings: Vec<NodeReading>, captured_at: DateTime<Utc>) -> Self {
        Self {
            readings,
            captured_at,
        }
    }

    /// Creates an empty snapshot captured now.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the readings in source order.
    #[must_use]
    pub fn readings(&self) -> &[NodeReading] {
        &self.readings
    }

    /// Returns when the underlying data was produced.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Returns the number of readings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Returns true if the snapshot holds no readings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Returns how old the data is at `now`; data from the future counts as
    /// zero age.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.captured_at).to_std().unwrap_or(Duration::ZERO)
    }
}

impl FromIterator<NodeReading> for Snapshot {
    fn from_iter<I: IntoIterator<Item = NodeReading>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn sentinel_is_unknown() {
        assert_eq!(Reading::from_raw(255), Reading::Unknown);
        assert_eq!(Reading::from_raw(101), Reading::Unknown);
        assert_eq!(
            Reading::from_raw(0),
            Reading::Level(BatteryLevel::new(0).unwrap())
        );
    }

    #[test]
    fn blank_name_falls_back_to_node_id() {
        let r = NodeReading::from_raw(NodeId::new(12), "   ", 50);
        assert_eq!(r.name(), "Node 12");
        let r = NodeReading::from_raw(NodeId::new(12), "Hall sensor", 50);
        assert_eq!(r.name(), "Hall sensor");
    }

    #[test]
    fn age_is_measured_from_capture_time() {
        let now = Utc::now();
        let snapshot = Snapshot::with_timestamp(Vec::new(), now - TimeDelta::minutes(150));
        assert_eq!(snapshot.age(now), Duration::from_secs(150 * 60));
        assert!(snapshot.age(now) > FRESHNESS_WINDOW);
    }

    #[test]
    fn future_capture_time_has_zero_age() {
        let now = Utc::now();
        let snapshot = Snapshot::with_timestamp(Vec::new(), now + TimeDelta::minutes(5));
        assert_eq!(snapshot.age(now), Duration::ZERO);
    }

    #[test]
    fn collect_into_snapshot() {
        let snapshot: Snapshot = (1..=3)
            .map(|i| NodeReading::from_raw(NodeId::new(i), "", 90))
            .collect();
        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot.is_empty());
    }
}
