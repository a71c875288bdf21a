// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory device registry.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::ApplyError;
use crate::reconcile::{DevicePatch, NodeAction, PlannedAction};
use crate::types::{Band, BatteryLevel, NodeId};

/// Default capacity of the applied-action channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A device record as the host would display it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    name: String,
    level: BatteryLevel,
    band: Band,
    stale: bool,
    writes: u32,
}

impl DeviceRecord {
    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Displayed percentage.
    #[must_use]
    pub fn level(&self) -> BatteryLevel {
        self.level
    }

    /// Displayed band.
    #[must_use]
    pub fn band(&self) -> Band {
        self.band
    }

    /// Icon key of the displayed band.
    #[must_use]
    pub fn icon(&self) -> &'static str {
        self.band.icon_name()
    }

    /// Returns true if the record is flagged stale.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Number of writes applied to this record, creation included.
    #[must_use]
    pub fn writes(&self) -> u32 {
        self.writes
    }

    fn patch(&mut self, patch: &DevicePatch) {
        if let Some(level) = patch.level {
            self.level = level;
        }
        if let Some(band) = patch.band {
            self.band = band;
        }
        if let Some(stale) = patch.stale {
            self.stale = stale;
        }
        self.writes += 1;
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<NodeId, DeviceRecord>,
    rejections: HashMap<NodeId, String>,
}

/// A [`DeviceRegistry`](super::DeviceRegistry) keeping records in memory.
///
/// Every applied action is also published to subscribers.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::reconcile::NodeAction;
/// use batterylevel_lib::registry::{DeviceRegistry, MemoryRegistry};
/// use batterylevel_lib::types::{Band, BatteryLevel, NodeId};
///
/// # #[tokio::main]
/// # async fn main() {
/// let registry = MemoryRegistry::new();
/// let node = NodeId::new(5);
///
/// registry
///     .apply(node, &NodeAction::Create {
///         name: "Door".to_string(),
///         level: BatteryLevel::new(80).unwrap(),
///         band: Band::Full,
///     })
///     .await
///     .unwrap();
/// registry.apply(node, &NodeAction::MarkStale).await.unwrap();
///
/// let record = registry.record(node).unwrap();
/// assert_eq!(record.icon(), "batterylevelfull");
/// assert!(record.is_stale());
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryRegistry {
    inner: Mutex<Inner>,
    sender: broadcast::Sender<PlannedAction>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            sender,
        }
    }

    /// Returns a copy of the record of `node`.
    #[must_use]
    pub fn record(&self, node: NodeId) -> Option<DeviceRecord> {
        self.inner.lock().records.get(&node).cloned()
    }

    /// Returns a copy of every record, in node order.
    #[must_use]
    pub fn records(&self) -> Vec<(NodeId, DeviceRecord)> {
        self.inner
            .lock()
            .records
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Deletes the record of `node`, as a user would from the host UI.
    pub fn remove(&self, node: NodeId) -> Option<DeviceRecord> {
        self.inner.lock().records.remove(&node)
    }

    /// Makes the next action for `node` fail with `ApplyError::Rejected`.
    pub fn reject_next(&self, node: NodeId, reason: impl Into<String>) {
        self.inner.lock().rejections.insert(node, reason.into());
    }

    /// Subscribes to applied actions.
    ///
    /// Only actions applied after the subscription are received.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlannedAction> {
        self.sender.subscribe()
    }

    fn apply_sync(&self, node: NodeId, action: &NodeAction) -> Result<(), ApplyError> {
        let mut inner = self.inner.lock();

        if let Some(reason) = inner.rejections.remove(&node) {
            return Err(ApplyError::Rejected { node, reason });
        }

        match action {
            NodeAction::Create { name, level, band } => {
                inner.records.insert(
                    node,
                    DeviceRecord {
                        name: name.clone(),
                        level: *level,
                        band: *band,
                        stale: false,
                        writes: 1,
                    },
                );
            }
            NodeAction::Update(_) | NodeAction::MarkStale => {
                let record = inner
                    .records
                    .get_mut(&node)
                    .ok_or(ApplyError::NotFound(node))?;
                record.patch(&action.patch());
            }
        }
        drop(inner);

        // No subscribers is fine
        let _ = self.sender.send(PlannedAction::new(node, action.clone()));
        Ok(())
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl super::DeviceRegistry for MemoryRegistry {
    async fn apply(&self, node: NodeId, action: &NodeAction) -> Result<(), ApplyError> {
        let result = self.apply_sync(node, action);
        match &result {
            Ok(()) => tracing::debug!(node = %node, action = %action, "Applied action"),
            Err(e) => tracing::debug!(node = %node, action = %action, error = %e, "Rejected action"),
        }
        result
    }
}
