// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A source fed directly by the host.

use std::collections::VecDeque;

use crate::error::FetchError;

use super::{NodeSource, Snapshot};

/// Source that replays snapshots (or failures) pushed by the host.
///
/// Each fetch consumes the oldest queued outcome. With nothing queued the
/// fetch yields an empty snapshot, which the reconciler treats as every
/// node missing.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::source::{NodeReading, NodeSource, QueuedSource, Snapshot};
/// use batterylevel_lib::types::NodeId;
///
/// # async fn example() {
/// let mut source = QueuedSource::new();
/// source.push(Snapshot::new(vec![NodeReading::from_raw(NodeId::new(5), "Door", 80)]));
///
/// let snapshot = source.fetch_snapshot().await.unwrap();
/// assert_eq!(snapshot.len(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct QueuedSource {
    pending: VecDeque<Result<Snapshot, FetchError>>,
}

impl QueuedSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a snapshot.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.pending.push_back(Ok(snapshot));
    }

    /// Queues a failure.
    pub fn push_error(&mut self, error: FetchError) {
        self.pending.push_back(Err(error));
    }

    /// Returns the number of queued outcomes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl NodeSource for QueuedSource {
    async fn fetch_snapshot(&mut self) -> Result<Snapshot, FetchError> {
        self.pending.pop_front().unwrap_or_else(|| Ok(Snapshot::empty()))
    }
}
