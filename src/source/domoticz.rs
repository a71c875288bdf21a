// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node source backed by the Domoticz JSON API.
//!
//! The `zwavegetbatterylevels` call only exists since Domoticz 4.11253, so
//! that endpoint asks the server for its version once before the first
//! poll. Domoticz switched to `<year>.<n>` numbering in March 2020; any
//! such version is recent enough.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::{ConfigError, FetchError};
use crate::types::{NodeIdStrategy, PackedId};

use super::{NodeReading, NodeSource, Reading, Snapshot};

// ============================================================================
// DomoticzConfig - Connection parameters
// ============================================================================

/// Which Domoticz API call provides the battery levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomoticzEndpoint {
    /// `type=command&param=zwavegetbatterylevels`, one entry per Z-Wave node
    /// with its native node id. Requires Domoticz 4.11253 or later.
    #[default]
    BatteryLevels,
    /// `type=devices`, one entry per Domoticz device with its packed hub
    /// identifier and `BatteryLevel`. Node ids are recovered with the given
    /// strategy.
    DeviceList(NodeIdStrategy),
}

/// Configuration for a Domoticz source.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::source::DomoticzConfig;
/// use std::time::Duration;
///
/// let config = DomoticzConfig::new("192.168.1.20", "3")
///     .with_port(8443)
///     .with_https()
///     .with_credentials("admin", "secret")
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.base_url(), "https://192.168.1.20:8443");
/// ```
#[derive(Debug, Clone)]
pub struct DomoticzConfig {
    host: String,
    port: u16,
    use_https: bool,
    credentials: Option<(String, String)>,
    hardware_idx: String,
    endpoint: DomoticzEndpoint,
    timeout: Duration,
}

impl DomoticzConfig {
    /// Default Domoticz HTTP port.
    pub const DEFAULT_PORT: u16 = 8080;
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the given host and Z-Wave controller
    /// hardware index.
    #[must_use]
    pub fn new(host: impl Into<String>, hardware_idx: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            use_https: false,
            credentials: None,
            hardware_idx: hardware_idx.into(),
            endpoint: DomoticzEndpoint::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets a custom port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables HTTPS.
    #[must_use]
    pub fn with_https(mut self) -> Self {
        self.use_https = true;
        self
    }

    /// Sets basic authentication credentials.
    ///
    /// An empty username leaves the requests unauthenticated.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        self.credentials = if username.is_empty() {
            None
        } else {
            Some((username, password.into()))
        };
        self
    }

    /// Selects the API call used to list battery levels.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: DomoticzEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the controller hardware index.
    #[must_use]
    pub fn hardware_idx(&self) -> &str {
        &self.hardware_idx
    }

    /// Returns the selected endpoint.
    #[must_use]
    pub fn endpoint(&self) -> DomoticzEndpoint {
        self.endpoint
    }

    /// Builds the base URL from this configuration.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        let port_suffix =
            if (self.use_https && self.port == 443) || (!self.use_https && self.port == 80) {
                String::new()
            } else {
                format!(":{}", self.port)
            };
        format!("{scheme}://{}{port_suffix}", self.host)
    }

    /// Creates a [`DomoticzSource`] from this configuration.
    ///
    /// With [`DomoticzEndpoint::DeviceList`] the hardware index selects which
    /// controller's devices are kept; an empty index keeps all of them.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created, or if the device
    /// list is used with a hardware index that is not a number.
    pub fn into_source(self) -> crate::Result<DomoticzSource> {
        let hardware_filter = match self.endpoint {
            DomoticzEndpoint::DeviceList(_) => parse_hardware_filter(&self.hardware_idx)?,
            DomoticzEndpoint::BatteryLevels => None,
        };

        let base_url = self.base_url();
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(FetchError::Http)?;

        Ok(DomoticzSource {
            base_url,
            client,
            credentials: self.credentials,
            hardware_idx: self.hardware_idx,
            endpoint: self.endpoint,
            hardware_filter,
            version_checked: false,
        })
    }
}

fn parse_hardware_filter(hardware_idx: &str) -> Result<Option<u32>, ConfigError> {
    let trimmed = hardware_idx.trim();
    if trimmed.is_empty() {
        tracing::info!("No hardware index given, keeping devices of every controller");
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::NotNumeric {
            field: "hardware index",
            value: hardware_idx.to_string(),
        })
}

// ============================================================================
// Version gate
// ============================================================================

/// Oldest Domoticz release providing `zwavegetbatterylevels`.
pub const MIN_BATTERY_LEVELS_VERSION: &str = "4.11253";

const MIN_LEGACY_MAJOR: u32 = 4;
const MIN_LEGACY_MINOR: u32 = 11253;
const FIRST_YEAR_MAJOR: u32 = 2020;

/// Returns true if a Domoticz version string provides the battery level call.
///
/// Accepts `4.11253` and later in the legacy numbering, and every
/// `<year>.<n>` release.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::source::supports_battery_levels;
///
/// assert!(supports_battery_levels("4.11253"));
/// assert!(supports_battery_levels("2020.2"));
/// assert!(!supports_battery_levels("4.10717"));
/// ```
#[must_use]
pub fn supports_battery_levels(version: &str) -> bool {
    let mut parts = version.trim().split('.');
    let major: Option<u32> = parts.next().and_then(|p| p.trim().parse().ok());
    let minor: Option<u32> = parts
        .next()
        .and_then(|p| p.split(|c: char| !c.is_ascii_digit()).next())
        .and_then(|p| p.parse().ok());

    match (major, minor) {
        (Some(major), _) if major >= FIRST_YEAR_MAJOR => true,
        (Some(major), Some(minor)) => major >= MIN_LEGACY_MAJOR && minor >= MIN_LEGACY_MINOR,
        _ => false,
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct VersionResponse {
    status: String,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    result: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct BatteryEntry {
    #[serde(rename = "nodeID")]
    node_id: u32,
    #[serde(rename = "nodeName", default)]
    node_name: String,
    battery: i64,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "BatteryLevel")]
    battery_level: Option<i64>,
    #[serde(rename = "HardwareID")]
    hardware_id: Option<u32>,
}

// ============================================================================
// DomoticzSource
// ============================================================================

/// Polls battery levels from a Domoticz server.
///
/// # Examples
///
/// ```no_run
/// use batterylevel_lib::source::{DomoticzConfig, NodeSource};
///
/// # async fn example() -> batterylevel_lib::Result<()> {
/// let mut source = DomoticzConfig::new("localhost", "3").into_source()?;
/// let snapshot = source.fetch_snapshot().await?;
/// println!("{} battery nodes", snapshot.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DomoticzSource {
    base_url: String,
    client: Client,
    credentials: Option<(String, String)>,
    hardware_idx: String,
    endpoint: DomoticzEndpoint,
    hardware_filter: Option<u32>,
    version_checked: bool,
}

impl DomoticzSource {
    /// Returns the base URL of the server.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query(&self) -> String {
        match self.endpoint {
            DomoticzEndpoint::BatteryLevels => format!(
                "type=command&param=zwavegetbatterylevels&idx={}",
                urlencoding::encode(&self.hardware_idx)
            ),
            DomoticzEndpoint::DeviceList(_) => "type=devices&filter=all&used=true".to_string(),
        }
    }

    async fn call(&self, query: &str) -> Result<String, FetchError> {
        let url = format!("{}/json.htm?{query}", self.base_url);

        tracing::debug!(url = %url, "Calling Domoticz API");

        let mut request = self.client.get(&url);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await.map_err(FetchError::Http)?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::Status("authentication failed".to_string()));
        }

        if !response.status().is_success() {
            return Err(FetchError::Unreachable(format!(
                "HTTP {} - {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response.text().await.map_err(FetchError::Http)
    }

    /// Asks the server for its version and fails if it predates the
    /// battery level call.
    async fn check_version(&self) -> Result<(), FetchError> {
        let body = self.call("type=command&param=getversion").await?;
        let response: VersionResponse = serde_json::from_str(&body)?;
        if response.status != "OK" {
            return Err(FetchError::Status(response.status));
        }
        let version = response
            .version
            .ok_or_else(|| FetchError::Malformed("version missing from reply".to_string()))?;

        if !supports_battery_levels(&version) {
            tracing::error!(version = %version, required = MIN_BATTERY_LEVELS_VERSION, "Domoticz too old for battery level call");
            return Err(FetchError::UnsupportedVersion {
                found: version,
                required: MIN_BATTERY_LEVELS_VERSION,
            });
        }

        tracing::info!(version = %version, "Domoticz version accepted");
        Ok(())
    }

    fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<Vec<T>, FetchError> {
        let response: ApiResponse<T> = serde_json::from_str(body)?;
        if response.status != "OK" {
            return Err(FetchError::Status(response.status));
        }
        Ok(response.result.unwrap_or_default())
    }

    fn battery_levels(body: &str) -> Result<Vec<NodeReading>, FetchError> {
        let entries: Vec<BatteryEntry> = Self::decode(body)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                NodeReading::new(
                    entry.node_id.into(),
                    entry.node_name,
                    Reading::from_raw(entry.battery),
                )
            })
            .collect())
    }

    fn device_list(
        body: &str,
        hardware_filter: Option<u32>,
        strategy: NodeIdStrategy,
    ) -> Result<Vec<NodeReading>, FetchError> {
        let entries: Vec<DeviceEntry> = Self::decode(body)?;

        let mut readings = Vec::new();
        for entry in entries {
            if hardware_filter.is_some() && entry.hardware_id != hardware_filter {
                continue;
            }
            let Some(battery) = entry.battery_level else {
                continue;
            };
            let packed: PackedId = match entry.id.parse() {
                Ok(packed) => packed,
                Err(e) => {
                    tracing::warn!(device = %entry.name, error = %e, "Skipping device with non-standard ID");
                    continue;
                }
            };
            readings.push(NodeReading::new(
                strategy.resolve(packed.value()),
                entry.name,
                Reading::from_raw(battery),
            ));
        }
        Ok(readings)
    }
}

impl NodeSource for DomoticzSource {
    async fn fetch_snapshot(&mut self) -> Result<Snapshot, FetchError> {
        if self.endpoint == DomoticzEndpoint::BatteryLevels && !self.version_checked {
            self.check_version().await?;
            self.version_checked = true;
        }

        let body = self.call(&self.query()).await?;

        let readings = match self.endpoint {
            DomoticzEndpoint::BatteryLevels => Self::battery_levels(&body)?,
            DomoticzEndpoint::DeviceList(strategy) => {
                Self::device_list(&body, self.hardware_filter, strategy)?
            }
        };

        tracing::debug!(count = readings.len(), "Domoticz battery levels received");

        Ok(Snapshot::new(readings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;

    #[test]
    fn base_url_omits_default_ports() {
        assert_eq!(
            DomoticzConfig::new("localhost", "1").base_url(),
            "http://localhost:8080"
        );
        assert_eq!(
            DomoticzConfig::new("localhost", "1").with_port(80).base_url(),
            "http://localhost"
        );
        assert_eq!(
            DomoticzConfig::new("example.org", "1")
                .with_https()
                .with_port(443)
                .base_url(),
            "https://example.org"
        );
    }

    #[test]
    fn empty_username_disables_auth() {
        let config = DomoticzConfig::new("localhost", "1").with_credentials("", "pw");
        assert!(config.credentials.is_none());
    }

    #[test]
    fn battery_levels_decode() {
        let body = r#"{"status":"OK","result":[
            {"nodeID":5,"nodeName":"Front door","battery":80},
            {"nodeID":7,"nodeName":"","battery":255}
        ]}"#;
        let readings = DomoticzSource::battery_levels(body).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].id(), NodeId::new(5));
        assert_eq!(readings[0].reading().level().unwrap().value(), 80);
        assert_eq!(readings[1].name(), "Node 7");
        assert_eq!(readings[1].reading(), Reading::Unknown);
    }

    #[test]
    fn missing_result_is_empty() {
        let readings = DomoticzSource::battery_levels(r#"{"status":"OK"}"#).unwrap();
        assert!(readings.is_empty());
    }

    #[test]
    fn error_status_is_reported() {
        let err = DomoticzSource::battery_levels(r#"{"status":"ERR"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s == "ERR"));
    }

    #[test]
    fn garbage_is_json_error() {
        let err = DomoticzSource::battery_levels("<html>").unwrap_err();
        assert!(matches!(err, FetchError::Json(_)));
    }

    #[test]
    fn device_list_decodes_packed_ids() {
        let body = r#"{"status":"OK","result":[
            {"ID":"00000501","Name":"Motion","BatteryLevel":64,"HardwareID":3},
            {"ID":"00120034","Name":"Thermostat","BatteryLevel":90,"HardwareID":3},
            {"ID":"0000000C","Name":"Legacy","BatteryLevel":40,"HardwareID":3},
            {"ID":"Zone 1","Name":"Odd","BatteryLevel":40,"HardwareID":3},
            {"ID":"00000601","Name":"Other hw","BatteryLevel":10,"HardwareID":9},
            {"ID":"00000701","Name":"Mains","HardwareID":3}
        ]}"#;
        let readings =
            DomoticzSource::device_list(body, Some(3), NodeIdStrategy::Packed).unwrap();
        let ids: Vec<_> = readings.iter().map(NodeReading::id).collect();
        assert_eq!(
            ids,
            vec![NodeId::new(0x05), NodeId::new(0x1200), NodeId::new(0x0C)]
        );
    }

    #[test]
    fn device_list_rejects_non_numeric_hardware_idx() {
        let err = DomoticzConfig::new("localhost", "zwave")
            .with_endpoint(DomoticzEndpoint::DeviceList(NodeIdStrategy::Packed))
            .into_source()
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::NotNumeric { field: "hardware index", .. })
        ));
    }

    #[test]
    fn device_list_empty_hardware_idx_keeps_all() {
        let source = DomoticzConfig::new("localhost", " ")
            .with_endpoint(DomoticzEndpoint::DeviceList(NodeIdStrategy::Packed))
            .into_source()
            .unwrap();
        assert_eq!(source.hardware_filter, None);

        let body = r#"{"status":"OK","result":[
            {"ID":"00000501","Name":"Motion","BatteryLevel":64,"HardwareID":3},
            {"ID":"00000601","Name":"Other hw","BatteryLevel":10,"HardwareID":9}
        ]}"#;
        let readings = DomoticzSource::device_list(body, None, NodeIdStrategy::Packed).unwrap();
        assert_eq!(readings.len(), 2);
    }

    #[test]
    fn battery_levels_ignore_hardware_idx_format() {
        let source = DomoticzConfig::new("localhost", "zwave").into_source().unwrap();
        assert_eq!(source.hardware_filter, None);
    }

    #[test]
    fn legacy_version_numbering() {
        assert!(supports_battery_levels("4.11253"));
        assert!(supports_battery_levels("4.11786"));
        assert!(!supports_battery_levels("4.10717"));
        assert!(!supports_battery_levels("3.8153"));
    }

    #[test]
    fn year_version_numbering() {
        assert!(supports_battery_levels("2020.1"));
        assert!(supports_battery_levels("2020.2"));
        assert!(supports_battery_levels("2024.7"));
        assert!(supports_battery_levels("2023.2 (build 15457)"));
    }

    #[test]
    fn unreadable_version_is_rejected() {
        assert!(!supports_battery_levels(""));
        assert!(!supports_battery_levels("beta"));
        assert!(!supports_battery_levels("4"));
    }

    #[test]
    fn device_list_direct_strategy() {
        let body = r#"{"status":"OK","result":[
            {"ID":"00000501","Name":"Motion","BatteryLevel":64,"HardwareID":3}
        ]}"#;
        let readings =
            DomoticzSource::device_list(body, Some(3), NodeIdStrategy::Direct).unwrap();
        assert_eq!(readings[0].id(), NodeId::new(0x0501));
    }
}
