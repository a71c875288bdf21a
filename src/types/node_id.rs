// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node identifiers and hub identifier decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Identifier of a tracked battery node.
///
/// Usually the Z-Wave node id, but a source may use any host-specific
/// encoding as long as it is stable across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a node identifier.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<u16> for NodeId {
    fn from(id: u16) -> Self {
        Self(u32::from(id))
    }
}

/// A device identifier as assigned by the hub, packing the node id in its
/// middle bytes.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::types::{NodeId, PackedId};
///
/// let packed: PackedId = "00120034".parse().unwrap();
/// assert_eq!(packed.node_id(), NodeId::new(0x1200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedId(u32);

impl PackedId {
    /// Wraps a packed identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw packed value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Derives the node id, see [`derive_node_id`].
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        derive_node_id(self.0)
    }
}

impl std::str::FromStr for PackedId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| ValueError::InvalidPackedId(s.to_string()))
    }
}

/// Derives a node id from a packed hub identifier.
///
/// Byte 2 and byte 1 of the packed value form the node id as
/// `(byte2 << 8) | byte1`. When both are zero the whole packed value is used
/// instead, which covers the older encoding that stored the node id in the
/// low byte only.
///
/// ```
/// use batterylevel_lib::types::{derive_node_id, NodeId};
///
/// assert_eq!(derive_node_id(0x0012_0034), NodeId::new(0x1200));
/// assert_eq!(derive_node_id(0x0000_00FF), NodeId::new(0xFF));
/// ```
#[must_use]
pub fn derive_node_id(packed: u32) -> NodeId {
    let [_, byte2, byte1, _] = packed.to_be_bytes();
    let derived = u16::from_be_bytes([byte2, byte1]);
    if derived == 0 {
        NodeId::new(packed)
    } else {
        NodeId::from(derived)
    }
}

/// How a source turns the identifiers it sees into node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeIdStrategy {
    /// The identifier already is the node id.
    #[default]
    Direct,
    /// The identifier is a packed hub id, see [`derive_node_id`].
    Packed,
}

impl NodeIdStrategy {
    /// Resolves a raw identifier into a node id.
    #[must_use]
    pub fn resolve(self, raw: u32) -> NodeId {
        match self {
            Self::Direct => NodeId::new(raw),
            Self::Packed => derive_node_id(raw),
        }
    }
}
