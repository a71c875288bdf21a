// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-node change detection.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::ApplyError;
use crate::source::{NodeReading, Reading, Snapshot};
use crate::types::{Band, BandThresholds, BatteryLevel, NodeId};

use super::{DevicePatch, NodeAction, PlannedAction};

/// Lifecycle of a node already known to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Reported a valid level on its last observation.
    Known,
    /// Missing or unknown since its last valid level.
    Stale,
}

/// Last known state of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    name: String,
    level: BatteryLevel,
    band: Band,
    stale: bool,
    pending_write: bool,
}

impl NodeState {
    fn new(name: &str, level: BatteryLevel, band: Band) -> Self {
        Self {
            name: name.to_string(),
            level,
            band,
            stale: false,
            pending_write: false,
        }
    }

    /// Display name given at creation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last known percentage.
    #[must_use]
    pub fn level(&self) -> BatteryLevel {
        self.level
    }

    /// Band of the last known percentage.
    #[must_use]
    pub fn band(&self) -> Band {
        self.band
    }

    /// Returns true if the node is flagged stale.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        if self.stale {
            NodeStatus::Stale
        } else {
            NodeStatus::Known
        }
    }

    fn observe(&mut self, level: BatteryLevel, band: Band) -> Option<DevicePatch> {
        if std::mem::take(&mut self.pending_write) {
            self.level = level;
            self.band = band;
            self.stale = false;
            return Some(DevicePatch::full(level, band));
        }

        let mut patch = DevicePatch::default();
        if level != self.level {
            self.level = level;
            patch.level = Some(level);
            if band != self.band {
                self.band = band;
                patch.band = Some(band);
            }
        }
        if self.stale {
            self.stale = false;
            patch.stale = Some(false);
        }

        (!patch.is_empty()).then_some(patch)
    }

    fn mark_stale(&mut self) -> bool {
        !std::mem::replace(&mut self.stale, true)
    }
}

/// Tracks the last known state of every node and derives the minimal set
/// of host actions for each snapshot.
///
/// Nodes are never forgotten: once created, a node that stops reporting is
/// marked stale and stays tracked until it reappears.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::reconcile::{NodeAction, Reconciler};
/// use batterylevel_lib::source::{NodeReading, Reading, Snapshot};
/// use batterylevel_lib::types::{BandThresholds, NodeId};
///
/// let mut reconciler = Reconciler::new(BandThresholds::default());
/// let snapshot: Snapshot = [NodeReading::from_raw(NodeId::new(5), "Door", 80)]
///     .into_iter()
///     .collect();
///
/// let actions = reconciler.reconcile(&snapshot);
/// assert!(actions[0].action.is_create());
///
/// // Nothing changed: nothing to do.
/// assert!(reconciler.reconcile(&snapshot).is_empty());
///
/// // Node 5 went missing.
/// let actions = reconciler.reconcile(&Snapshot::empty());
/// assert_eq!(actions[0].action, NodeAction::MarkStale);
/// ```
#[derive(Debug, Clone)]
pub struct Reconciler {
    thresholds: BandThresholds,
    nodes: BTreeMap<NodeId, NodeState>,
}

impl Reconciler {
    /// Creates a reconciler with no known nodes.
    #[must_use]
    pub fn new(thresholds: BandThresholds) -> Self {
        Self {
            thresholds,
            nodes: BTreeMap::new(),
        }
    }

    /// Thresholds used for classification.
    #[must_use]
    pub fn thresholds(&self) -> &BandThresholds {
        &self.thresholds
    }

    /// Returns the state of `node`, if known.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&NodeState> {
        self.nodes.get(&node)
    }

    /// Iterates over the known nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeState)> {
        self.nodes.iter().map(|(id, state)| (*id, state))
    }

    /// Number of known nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Seeds the state of a node whose host record already exists, so
    /// that a restarted reconciler does not recreate it.
    pub fn restore(&mut self, node: NodeId, name: &str, level: BatteryLevel, stale: bool) {
        let band = self.thresholds.classify(level);
        let mut state = NodeState::new(name, level, band);
        state.stale = stale;
        self.nodes.insert(node, state);
    }

    /// Compares a snapshot with the known state and returns the actions
    /// needed to bring the host in line, in node id order.
    ///
    /// When a node appears several times in one snapshot the last reading
    /// is used.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> Vec<PlannedAction> {
        let mut latest: BTreeMap<NodeId, &NodeReading> = BTreeMap::new();
        for reading in snapshot.readings() {
            latest.insert(reading.id(), reading);
        }

        let mut actions = Vec::new();
        for (&id, reading) in &latest {
            let action = match (self.nodes.entry(id), reading.reading()) {
                (Entry::Vacant(entry), Reading::Level(level)) => {
                    let band = self.thresholds.classify(level);
                    entry.insert(NodeState::new(reading.name(), level, band));
                    tracing::info!(node = %id, name = reading.name(), level = %level, band = %band, "New battery node");
                    Some(NodeAction::Create {
                        name: reading.name().to_string(),
                        level,
                        band,
                    })
                }
                (Entry::Vacant(_), Reading::Unknown) => {
                    tracing::debug!(node = %id, "Ignoring node without a known level");
                    None
                }
                (Entry::Occupied(mut entry), Reading::Level(level)) => {
                    let band = self.thresholds.classify(level);
                    entry.get_mut().observe(level, band).map(NodeAction::Update)
                }
                (Entry::Occupied(mut entry), Reading::Unknown) => {
                    entry.get_mut().mark_stale().then_some(NodeAction::MarkStale)
                }
            };

            if let Some(action) = action {
                tracing::debug!(node = %id, action = %action, "Planned action");
                actions.push(PlannedAction::new(id, action));
            }
        }

        for (&id, state) in &mut self.nodes {
            if !latest.contains_key(&id) && state.mark_stale() {
                tracing::debug!(node = %id, "Node missing from snapshot");
                actions.push(PlannedAction::new(id, NodeAction::MarkStale));
            }
        }

        actions.sort_by_key(|planned| planned.node);
        actions
    }

    /// Treats every known node as missing, for a tick whose fetch failed.
    pub fn reconcile_missing(&mut self) -> Vec<PlannedAction> {
        self.nodes
            .iter_mut()
            .filter_map(|(&id, state)| {
                state
                    .mark_stale()
                    .then(|| PlannedAction::new(id, NodeAction::MarkStale))
            })
            .collect()
    }

    /// Rolls back the bookkeeping of an action the host failed to apply.
    ///
    /// A failed creation, or an update whose record no longer exists,
    /// forgets the node so the next valid reading creates it again. A
    /// rejected stale mark is retried on the next tick the node is missing.
    /// Any other rejected update forces a full rewrite on the next valid
    /// reading.
    pub fn invalidate(&mut self, planned: &PlannedAction, error: &ApplyError) {
        let forget = planned.action.is_create() || matches!(error, ApplyError::NotFound(_));
        if forget {
            if self.nodes.remove(&planned.node).is_some() {
                tracing::debug!(node = %planned.node, "Forgetting node after failed write");
            }
            return;
        }

        let Some(state) = self.nodes.get_mut(&planned.node) else {
            return;
        };
        match planned.action {
            NodeAction::MarkStale => state.stale = false,
            _ => state.pending_write = true,
        }
    }
}
