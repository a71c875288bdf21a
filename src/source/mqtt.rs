// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node source following battery levels published over MQTT.
//!
//! Targets the Z-Wave JS UI gateway with node-id topics: battery levels
//! appear on `<prefix>/[<location>/]nodeID_<id>/128/0/level` with either a
//! bare number or a `{"time": <ms>, "value": <n>}` payload.
//!
//! Messages are pushed by the broker at any time. The event loop folds
//! each one into a latest-value table, newest reading per node, and never
//! waits on the poller. A snapshot is a copy of that table taken under its
//! lock, so reconciliation always works on a consistent view.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::FetchError;
use crate::types::NodeId;

use super::{NodeReading, NodeSource, Reading, Snapshot};

/// Configuration for an MQTT source.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::source::MqttSourceConfig;
///
/// let config = MqttSourceConfig::new("192.168.1.50")
///     .with_credentials("user", "password")
///     .with_topic_prefix("zwave");
/// assert_eq!(config.subscription(), "zwave/#");
/// ```
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    topic_prefix: String,
    keep_alive: Duration,
    connection_timeout: Duration,
}

impl MqttSourceConfig {
    /// Default MQTT port.
    pub const DEFAULT_PORT: u16 = 1883;
    /// Default topic prefix of the Z-Wave JS UI gateway.
    pub const DEFAULT_TOPIC_PREFIX: &'static str = "zwave";

    /// Creates a configuration for the given broker host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            credentials: None,
            topic_prefix: Self::DEFAULT_TOPIC_PREFIX.to_string(),
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the broker port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the broker credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the gateway topic prefix.
    #[must_use]
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets how long [`connect`](Self::connect) waits for the broker.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Returns the topic filter subscribed to.
    #[must_use]
    pub fn subscription(&self) -> String {
        format!("{}/#", self.topic_prefix)
    }

    /// Connects to the broker and starts following battery levels.
    ///
    /// # Errors
    ///
    /// Returns error if the host is empty or the broker does not accept the
    /// connection within the connection timeout.
    pub async fn connect(self) -> Result<MqttSource, FetchError> {
        if self.host.is_empty() {
            return Err(FetchError::Unreachable(
                "MQTT broker host is required".to_string(),
            ));
        }

        let client_id = format!("batterylevel_{}", Uuid::new_v4().simple());
        let mut mqtt_options = MqttOptions::new(client_id, &self.host, self.port);
        mqtt_options.set_keep_alive(self.keep_alive);
        mqtt_options.set_clean_session(true);
        if let Some((username, password)) = &self.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        let latest = Arc::new(Mutex::new(BTreeMap::new()));
        let (connack_tx, connack_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(false));

        let listener = Listener {
            client: client.clone(),
            subscription: self.subscription(),
            prefix: self.topic_prefix.clone(),
            connected: Arc::clone(&connected),
            latest: Arc::clone(&latest),
        };
        let listener = tokio::spawn(listener.run(event_loop, connack_tx));

        match tokio::time::timeout(self.connection_timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(host = %self.host, port = self.port, "Connected to MQTT broker");
            }
            Ok(Err(_)) => {
                listener.abort();
                return Err(FetchError::Unreachable(
                    "MQTT event loop terminated unexpectedly".to_string(),
                ));
            }
            Err(_) => {
                listener.abort();
                return Err(FetchError::Unreachable(format!(
                    "MQTT connection timeout after {}s",
                    self.connection_timeout.as_secs()
                )));
            }
        }

        Ok(MqttSource {
            client,
            latest,
            connected,
            listener,
        })
    }
}

/// Battery levels received over MQTT.
///
/// # Examples
///
/// ```no_run
/// use batterylevel_lib::source::{MqttSourceConfig, NodeSource};
///
/// # async fn example() -> batterylevel_lib::Result<()> {
/// let mut source = MqttSourceConfig::new("192.168.1.50").connect().await?;
/// let snapshot = source.fetch_snapshot().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MqttSource {
    client: AsyncClient,
    latest: Arc<Mutex<BTreeMap<NodeId, NodeReading>>>,
    connected: Arc<AtomicBool>,
    listener: JoinHandle<()>,
}

impl MqttSource {
    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Disconnects from the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), FetchError> {
        self.client.disconnect().await.map_err(FetchError::Mqtt)
    }

    /// Number of nodes heard from since connecting.
    #[must_use]
    pub fn known_nodes(&self) -> usize {
        self.latest.lock().len()
    }
}

impl Drop for MqttSource {
    fn drop(&mut self) {
        // The event loop owns the broker connection
        self.listener.abort();
    }
}

impl NodeSource for MqttSource {
    async fn fetch_snapshot(&mut self) -> Result<Snapshot, FetchError> {
        if !self.is_connected() {
            return Err(FetchError::Unreachable(
                "MQTT broker connection lost".to_string(),
            ));
        }

        let readings = self.latest.lock().values().cloned().collect();
        Ok(Snapshot::new(readings))
    }
}

/// Background task keeping the latest-value table current.
struct Listener {
    client: AsyncClient,
    subscription: String,
    prefix: String,
    connected: Arc<AtomicBool>,
    latest: Arc<Mutex<BTreeMap<NodeId, NodeReading>>>,
}

impl Listener {
    /// Folds one message into the table; the newest reading of a node wins.
    fn on_publish(&self, topic: &str, payload: &[u8]) {
        let Ok(payload) = std::str::from_utf8(payload) else {
            return;
        };
        let Some(reading) = parse_message(&self.prefix, topic, payload) else {
            return;
        };
        tracing::debug!(
            node = %reading.id(),
            reading = ?reading.reading(),
            "Battery level received"
        );
        self.latest.lock().insert(reading.id(), reading);
    }

    async fn run(self, mut event_loop: EventLoop, connack_tx: oneshot::Sender<()>) {
        use rumqttc::{Event, Packet};

        let mut connack_tx = Some(connack_tx);

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    tracing::debug!(?connack, "MQTT broker connected");
                    self.connected.store(true, Ordering::Release);
                    // Clean sessions drop subscriptions, renew on every connect
                    if let Err(e) = self
                        .client
                        .try_subscribe(&self.subscription, QoS::AtLeastOnce)
                    {
                        tracing::error!(error = %e, "MQTT subscription failed");
                    }
                    if let Some(tx) = connack_tx.take() {
                        let _ = tx.send(());
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    tracing::debug!(?suback, "MQTT subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.on_publish(&publish.topic, &publish.payload);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::info!("MQTT broker disconnected");
                    self.connected.store(false, Ordering::Release);
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::Release);
                    if connack_tx.is_some() {
                        tracing::error!(error = %e, "MQTT event loop error");
                        break;
                    }
                    tracing::warn!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LevelPayload {
    Bare(Option<i64>),
    Wrapped { value: Option<i64> },
}

/// Decodes a gateway message into a reading; `None` for unrelated topics.
fn parse_message(prefix: &str, topic: &str, payload: &str) -> Option<NodeReading> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let path = rest.strip_suffix("/128/0/level")?;
    let node_segment = path.rsplit('/').next()?;
    let id: u32 = node_segment.strip_prefix("nodeID_")?.parse().ok()?;

    let reading = match serde_json::from_str::<LevelPayload>(payload.trim()) {
        Ok(LevelPayload::Bare(Some(raw)) | LevelPayload::Wrapped { value: Some(raw) }) => {
            Reading::from_raw(raw)
        }
        Ok(_) => Reading::Unknown,
        Err(e) => {
            tracing::warn!(topic = %topic, error = %e, "Unreadable battery payload");
            Reading::Unknown
        }
    };

    Some(NodeReading::new(NodeId::new(id), "", reading))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> Listener {
        let (client, _event_loop) =
            AsyncClient::new(MqttOptions::new("test", "localhost", 1883), 10);
        Listener {
            client,
            subscription: "zwave/#".to_string(),
            prefix: "zwave".to_string(),
            connected: Arc::new(AtomicBool::new(true)),
            latest: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn source_of(listener: &Listener) -> MqttSource {
        MqttSource {
            client: listener.client.clone(),
            latest: Arc::clone(&listener.latest),
            connected: Arc::clone(&listener.connected),
            listener: tokio::spawn(async {}),
        }
    }

    #[tokio::test]
    async fn newest_message_per_node_wins() {
        let listener = listener();
        let mut source = source_of(&listener);

        listener.on_publish("zwave/nodeID_5/128/0/level", br#"{"value":80}"#);
        listener.on_publish("zwave/nodeID_7/128/0/level", b"55");
        listener.on_publish("zwave/nodeID_5/128/0/level", br#"{"value":78}"#);
        listener.on_publish("zwave/nodeID_5/49/0/Air_temperature", b"21");

        let snapshot = source.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.readings()[0].id(), NodeId::new(5));
        assert_eq!(snapshot.readings()[0].reading().level().unwrap().value(), 78);
        assert_eq!(source.known_nodes(), 2);
    }

    #[tokio::test]
    async fn unknown_replaces_known_level() {
        let listener = listener();
        let mut source = source_of(&listener);

        listener.on_publish("zwave/nodeID_5/128/0/level", br#"{"value":80}"#);
        listener.on_publish("zwave/nodeID_5/128/0/level", br#"{"value":null}"#);

        let snapshot = source.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.readings()[0].reading(), Reading::Unknown);
    }

    #[tokio::test]
    async fn many_messages_never_block() {
        let listener = listener();
        let mut source = source_of(&listener);

        for i in 0..10_000u32 {
            let topic = format!("zwave/nodeID_{}/128/0/level", i % 300);
            listener.on_publish(&topic, b"50");
        }

        assert_eq!(source.fetch_snapshot().await.unwrap().len(), 300);
    }

    #[tokio::test]
    async fn lost_connection_is_unreachable() {
        let listener = listener();
        let mut source = source_of(&listener);
        listener.connected.store(false, Ordering::Release);

        assert!(matches!(
            source.fetch_snapshot().await,
            Err(FetchError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn dropping_source_stops_listener() {
        let listener = listener();
        let mut source = source_of(&listener);
        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        source.listener = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });

        drop(source);
        assert!(alive_rx.await.is_err());
    }

    #[test]
    fn subscription_uses_prefix() {
        let config = MqttSourceConfig::new("broker").with_topic_prefix("home/zwave/");
        assert_eq!(config.subscription(), "home/zwave/#");
    }

    #[test]
    fn parses_wrapped_payload() {
        let reading =
            parse_message("zwave", "zwave/nodeID_5/128/0/level", r#"{"time":1700000000000,"value":80}"#)
                .unwrap();
        assert_eq!(reading.id(), NodeId::new(5));
        assert_eq!(reading.name(), "Node 5");
        assert_eq!(reading.reading().level().unwrap().value(), 80);
    }

    #[test]
    fn parses_bare_payload_with_location() {
        let reading = parse_message("zwave", "zwave/Kitchen/nodeID_12/128/0/level", "35").unwrap();
        assert_eq!(reading.id(), NodeId::new(12));
        assert_eq!(reading.reading().level().unwrap().value(), 35);
    }

    #[test]
    fn null_or_garbage_value_is_unknown() {
        let reading =
            parse_message("zwave", "zwave/nodeID_5/128/0/level", r#"{"value":null}"#).unwrap();
        assert_eq!(reading.reading(), Reading::Unknown);
        let reading = parse_message("zwave", "zwave/nodeID_5/128/0/level", "n/a").unwrap();
        assert_eq!(reading.reading(), Reading::Unknown);
        let reading = parse_message("zwave", "zwave/nodeID_5/128/0/level", "255").unwrap();
        assert_eq!(reading.reading(), Reading::Unknown);
    }

    #[test]
    fn ignores_unrelated_topics() {
        assert!(parse_message("zwave", "zwave/nodeID_5/49/0/Air_temperature", "21").is_none());
        assert!(parse_message("zwave", "other/nodeID_5/128/0/level", "21").is_none());
        assert!(parse_message("zwave", "zwave/Front_door/128/0/level", "21").is_none());
        assert!(parse_message("zwave", "zwave/nodeID_x/128/0/level", "21").is_none());
    }
}
