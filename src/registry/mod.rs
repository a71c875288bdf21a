// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The host side: where planned actions end up.
//!
//! A host implements [`DeviceRegistry`] over whatever record store it has.
//! [`MemoryRegistry`] keeps records in memory for hosts without one, and for
//! tests.

mod memory;

use std::sync::Arc;

pub use memory::{DeviceRecord, MemoryRegistry};

use crate::error::ApplyError;
use crate::reconcile::NodeAction;
use crate::types::NodeId;

/// The host device registry.
///
/// Called once per node with a non-empty action per tick. Actions for
/// distinct nodes carry no ordering requirement.
#[allow(async_fn_in_trait)]
pub trait DeviceRegistry {
    /// Applies `action` to the record of `node`.
    ///
    /// # Errors
    ///
    /// Returns `ApplyError::NotFound` if an update targets a record that no
    /// longer exists, or `ApplyError::Rejected` if the host refused the
    /// write.
    async fn apply(&self, node: NodeId, action: &NodeAction) -> Result<(), ApplyError>;
}

impl<R: DeviceRegistry> DeviceRegistry for Arc<R> {
    async fn apply(&self, node: NodeId, action: &NodeAction) -> Result<(), ApplyError> {
        self.as_ref().apply(node, action).await
    }
}
