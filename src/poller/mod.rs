// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The periodic tick: fetch, reconcile, apply.
//!
//! A [`Poller`] owns one source, one registry and the reconciler state. The
//! host either forwards its own heartbeat to [`Poller::on_heartbeat`] or lets
//! [`Poller::run_until`] drive the ticks. Ticks never overlap: each one runs
//! to completion before the next can start.
//!
//! # Examples
//!
//! ```no_run
//! use batterylevel_lib::config::Settings;
//! use batterylevel_lib::poller::Poller;
//! use batterylevel_lib::registry::MemoryRegistry;
//! use batterylevel_lib::source::DomoticzConfig;
//!
//! #[tokio::main]
//! async fn main() -> batterylevel_lib::Result<()> {
//!     let source = DomoticzConfig::new("192.168.1.10", "3").into_source()?;
//!     let mut poller = Poller::new(source, MemoryRegistry::new(), &Settings::default());
//!
//!     // Poll for a day
//!     poller
//!         .run_until(tokio::time::sleep(std::time::Duration::from_secs(24 * 3600)))
//!         .await;
//!     Ok(())
//! }
//! ```

mod schedule;

use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

pub use schedule::Schedule;

use crate::config::Settings;
use crate::error::{ApplyError, FetchError};
use crate::reconcile::Reconciler;
use crate::registry::DeviceRegistry;
use crate::source::{FRESHNESS_WINDOW, NodeSource, Snapshot};

/// Outcome of one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Actions the registry accepted.
    pub applied: usize,
    /// Actions the registry rejected.
    pub failed: Vec<ApplyError>,
    /// Why the snapshot could not be obtained, if it could not.
    pub fetch_error: Option<FetchError>,
}

impl TickReport {
    /// Returns true if the fetch succeeded and every action was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.fetch_error.is_none()
    }
}

/// Runs ticks against a source and a registry.
#[derive(Debug)]
pub struct Poller<S, R> {
    source: S,
    registry: R,
    reconciler: Reconciler,
    schedule: Schedule,
}

impl<S: NodeSource, R: DeviceRegistry> Poller<S, R> {
    /// Creates a poller using the thresholds and interval of `settings`.
    #[must_use]
    pub fn new(source: S, registry: R, settings: &Settings) -> Self {
        Self::with_reconciler(
            source,
            registry,
            Reconciler::new(settings.thresholds),
            Schedule::new(settings.poll_interval()),
        )
    }

    /// Creates a poller around an existing reconciler, for example one
    /// restored from the host's records.
    #[must_use]
    pub fn with_reconciler(
        source: S,
        registry: R,
        reconciler: Reconciler,
        schedule: Schedule,
    ) -> Self {
        Self {
            source,
            registry,
            reconciler,
            schedule,
        }
    }

    /// The reconciler state.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// The source, mutably.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// The schedule.
    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Runs a tick if one is due at `now`.
    ///
    /// Returns `None` when the schedule says it is too early.
    pub async fn on_heartbeat(&mut self, now: Instant) -> Option<TickReport> {
        if !self.schedule.is_due(now) {
            return None;
        }
        self.schedule.mark_started(now);
        Some(self.tick(Utc::now()).await)
    }

    /// Runs one tick unconditionally.
    ///
    /// A fetch failure, or a snapshot older than the freshness window, makes
    /// every known node missing for this tick. A rejected action is logged
    /// and skipped; the remaining actions still go through.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        let actions = match self.fetch(now).await {
            Ok(snapshot) => {
                tracing::debug!(nodes = snapshot.len(), "Fetched snapshot");
                for reading in snapshot.readings() {
                    tracing::debug!(node = %reading.id(), name = reading.name(), reading = ?reading.reading(), "Node reading");
                }
                self.reconciler.reconcile(&snapshot)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch battery levels");
                report.fetch_error = Some(e);
                self.reconciler.reconcile_missing()
            }
        };

        for planned in actions {
            match self.registry.apply(planned.node, &planned.action).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    tracing::warn!(node = %planned.node, action = %planned.action, error = %e, "Failed to apply action");
                    self.reconciler.invalidate(&planned, &e);
                    report.failed.push(e);
                }
            }
        }

        tracing::debug!(applied = report.applied, failed = report.failed.len(), "Tick complete");
        report
    }

    /// Drives ticks on the schedule until `shutdown` completes.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = Instant::now();
            self.on_heartbeat(now).await;
            let next = self.schedule.next_due().unwrap_or(now);

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Poller stopped");
                    break;
                }
                () = tokio::time::sleep_until(next) => {}
            }
        }
    }

    async fn fetch(&mut self, now: DateTime<Utc>) -> Result<Snapshot, FetchError> {
        let snapshot = self.source.fetch_snapshot().await?;
        let age = snapshot.age(now);
        if age > FRESHNESS_WINDOW {
            return Err(FetchError::Stale {
                age_minutes: i64::try_from(age.as_secs() / 60).unwrap_or(i64::MAX),
            });
        }
        Ok(snapshot)
    }
}
