// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `BatteryLevel` Lib - Battery level tracking for Z-Wave nodes.
//!
//! This library periodically reads the battery percentage of Z-Wave nodes,
//! classifies each level into one of four bands, and tells the host which
//! device records to create, update or flag as stale. Nothing is written
//! when nothing changed.
//!
//! # Components
//!
//! - **Classification**: [`classify`] maps a [`BatteryLevel`] to a [`Band`]
//!   using configurable [`BandThresholds`]
//! - **Configuration**: [`config`] clamps host-provided settings into their
//!   valid ranges and reports what it changed
//! - **Sources**: [`source`] obtains snapshots from the Domoticz JSON API,
//!   the OpenZWave cache file, or an MQTT gateway
//! - **Reconciliation**: [`Reconciler`] turns snapshots into minimal
//!   [`NodeAction`]s
//! - **Registry**: [`DeviceRegistry`] is the host side receiving those actions
//! - **Scheduling**: [`Poller`] ties a source and a registry to a fixed
//!   interval
//!
//! # Feature Flags
//!
//! - `http` (default): Domoticz JSON API source
//! - `mqtt` (default): MQTT gateway source
//! - `ozw` (default): OpenZWave cache file source
//!
//! # Quick Start
//!
//! ## Reconciling snapshots by hand
//!
//! ```
//! use batterylevel_lib::{BandThresholds, NodeAction, NodeId, Reconciler};
//! use batterylevel_lib::source::{NodeReading, Snapshot};
//!
//! let mut reconciler = Reconciler::new(BandThresholds::default());
//!
//! let snapshot: Snapshot = [NodeReading::from_raw(NodeId::new(5), "Front door", 80)]
//!     .into_iter()
//!     .collect();
//! for planned in reconciler.reconcile(&snapshot) {
//!     match planned.action {
//!         NodeAction::Create { name, band, .. } => {
//!             println!("create {name} with icon {}", band.icon_name());
//!         }
//!         NodeAction::Update(patch) => println!("update {}: {patch:?}", planned.node),
//!         NodeAction::MarkStale => println!("{} went quiet", planned.node),
//!     }
//! }
//! ```
//!
//! ## Polling Domoticz
//!
//! ```no_run
//! use batterylevel_lib::{MemoryRegistry, Poller, RawSettings};
//! use batterylevel_lib::source::DomoticzConfig;
//!
//! #[tokio::main]
//! async fn main() -> batterylevel_lib::Result<()> {
//!     let settings = RawSettings::from_json(r#"{"Mode1": "60", "Mode2": 75}"#)?
//!         .resolve()
//!         .value;
//!
//!     let source = DomoticzConfig::new("192.168.1.10", "3")
//!         .with_credentials("admin", "secret")
//!         .into_source()?;
//!     let mut poller = Poller::new(source, MemoryRegistry::new(), &settings);
//!
//!     let report = poller.tick(chrono::Utc::now()).await;
//!     println!("{} actions applied", report.applied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod poller;
pub mod reconcile;
pub mod registry;
pub mod source;
pub mod types;

pub use config::{ConfigWarning, Loaded, RawSettings, Settings};
pub use error::{ApplyError, ConfigError, Error, FetchError, Result, ValueError};
pub use poller::{Poller, Schedule, TickReport};
pub use reconcile::{DevicePatch, NodeAction, NodeState, NodeStatus, PlannedAction, Reconciler};
pub use registry::{DeviceRecord, DeviceRegistry, MemoryRegistry};
pub use source::{NodeReading, NodeSource, Reading, Snapshot};
pub use types::{
    Band, BandThresholds, BatteryLevel, NodeId, NodeIdStrategy, PackedId, classify,
    derive_node_id,
};
