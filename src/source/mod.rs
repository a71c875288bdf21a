// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node sources: where battery readings come from.
//!
//! A [`NodeSource`] produces one [`Snapshot`] per tick. The reconciler does
//! not care about the transport; every source reports failures through
//! [`FetchError`] and leaves the retry to the next tick.
//!
//! # Sources
//!
//! - [`DomoticzSource`]: polls the Domoticz JSON API (feature `http`)
//! - [`OzwCacheSource`]: parses the OpenZWave controller cache file (feature `ozw`)
//! - [`MqttSource`]: follows battery levels published by an MQTT gateway (feature `mqtt`)
//! - [`QueuedSource`]: snapshots handed over by the host

#[cfg(feature = "http")]
mod domoticz;
#[cfg(feature = "mqtt")]
mod mqtt;
#[cfg(feature = "ozw")]
mod ozw_cache;
mod queued;
mod reading;

#[cfg(feature = "http")]
pub use domoticz::{
    DomoticzConfig, DomoticzEndpoint, DomoticzSource, MIN_BATTERY_LEVELS_VERSION,
    supports_battery_levels,
};
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttSource, MqttSourceConfig};
#[cfg(feature = "ozw")]
pub use ozw_cache::{OzwCacheConfig, OzwCacheSource};
pub use queued::QueuedSource;
pub use reading::{FRESHNESS_WINDOW, NodeReading, Reading, Snapshot};

use crate::error::FetchError;

/// A provider of battery snapshots.
///
/// Called at most once per tick, never concurrently with itself.
#[allow(async_fn_in_trait)]
pub trait NodeSource {
    /// Obtains the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the source is unreachable or its data could
    /// not be decoded.
    async fn fetch_snapshot(&mut self) -> Result<Snapshot, FetchError>;
}
