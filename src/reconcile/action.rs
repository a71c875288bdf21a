// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Actions emitted by the reconciler for the host registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Band, BatteryLevel, NodeId};

/// The fields of a device record that need rewriting.
///
/// `None` means "leave as is".
///
/// # Examples
///
/// ```
/// use batterylevel_lib::reconcile::DevicePatch;
///
/// let patch = DevicePatch::default();
/// assert!(patch.is_empty());
///
/// let patch = DevicePatch { stale: Some(false), ..DevicePatch::default() };
/// assert!(!patch.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DevicePatch {
    /// New battery percentage.
    pub level: Option<BatteryLevel>,
    /// New band (drives the displayed icon).
    pub band: Option<Band>,
    /// New stale flag.
    pub stale: Option<bool>,
}

impl DevicePatch {
    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.band.is_none() && self.stale.is_none()
    }

    /// A patch rewriting every field, for a node seen fresh.
    #[must_use]
    pub fn full(level: BatteryLevel, band: Band) -> Self {
        Self {
            level: Some(level),
            band: Some(band),
            stale: Some(false),
        }
    }
}

/// What the host must do with one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NodeAction {
    /// First reading of a node: create its record with these values.
    Create {
        /// Display name for the new record.
        name: String,
        /// Initial percentage.
        level: BatteryLevel,
        /// Initial band.
        band: Band,
    },
    /// Rewrite the listed fields of an existing record.
    Update(DevicePatch),
    /// The node produced no reading: flag its record as stale.
    MarkStale,
}

impl NodeAction {
    /// Returns the change expressed as a patch.
    ///
    /// A creation patches every field; marking stale only the flag.
    #[must_use]
    pub fn patch(&self) -> DevicePatch {
        match self {
            Self::Create { level, band, .. } => DevicePatch::full(*level, *band),
            Self::Update(patch) => *patch,
            Self::MarkStale => DevicePatch {
                stale: Some(true),
                ..DevicePatch::default()
            },
        }
    }

    /// Returns true for [`NodeAction::Create`].
    #[must_use]
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create { .. })
    }
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { .. } => f.write_str("create"),
            Self::Update(_) => f.write_str("update"),
            Self::MarkStale => f.write_str("mark stale"),
        }
    }
}

/// An action bound to the node it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// Target node.
    pub node: NodeId,
    /// What to do.
    pub action: NodeAction,
}

impl PlannedAction {
    /// Creates a planned action.
    #[must_use]
    pub fn new(node: NodeId, action: NodeAction) -> Self {
        Self { node, action }
    }
}
