// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change detection between snapshots.
//!
//! The [`Reconciler`] keeps the last known state of each node and turns every
//! [`Snapshot`](crate::source::Snapshot) into the minimal list of
//! [`PlannedAction`]s for the host:
//!
//! | Previous state | Observation          | Action                  |
//! |----------------|----------------------|-------------------------|
//! | unseen         | valid level          | [`NodeAction::Create`]  |
//! | unseen         | unknown              | none                    |
//! | known          | same level           | none                    |
//! | known          | different level      | [`NodeAction::Update`]  |
//! | known          | unknown or missing   | [`NodeAction::MarkStale`] |
//! | stale          | unknown or missing   | none                    |
//! | stale          | valid level          | [`NodeAction::Update`]  |

mod action;
mod reconciler;

pub use action::{DevicePatch, NodeAction, PlannedAction};
pub use reconciler::{NodeState, NodeStatus, Reconciler};
