// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for battery monitoring.
//!
//! Each type ensures values are within their valid ranges at construction
//! time.
//!
//! # Types
//!
//! - [`BatteryLevel`] - Battery charge (0-100%)
//! - [`Band`] - Severity band derived from a level
//! - [`BandThresholds`] - Lower bounds of the full/ok/low bands
//! - [`NodeId`] - Identifier of a tracked node
//! - [`PackedId`] - Hub-assigned identifier packing a node id

mod band;
mod level;
mod node_id;

pub use band::{Band, BandThresholds, classify};
pub use level::BatteryLevel;
pub use node_id::{NodeId, NodeIdStrategy, PackedId, derive_node_id};
