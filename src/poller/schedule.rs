// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use tokio::time::Instant;

/// Fixed-interval tick schedule.
///
/// The first tick is due immediately. Each following tick is due one
/// interval after the previous tick started, however long that tick took.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use batterylevel_lib::poller::Schedule;
/// use tokio::time::Instant;
///
/// let mut schedule = Schedule::new(Duration::from_secs(3600));
/// let start = Instant::now();
/// assert!(schedule.is_due(start));
///
/// schedule.mark_started(start);
/// assert!(!schedule.is_due(start + Duration::from_secs(60)));
/// assert!(schedule.is_due(start + Duration::from_secs(3600)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Schedule {
    /// Creates a schedule whose first tick is due now.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Time between tick starts.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next tick is due, or `None` if no tick ran yet.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Returns true if a tick should start at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_none_or(|due| now >= due)
    }

    /// Records that a tick started at `now`.
    pub fn mark_started(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }
}
