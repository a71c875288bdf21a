// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the Domoticz source using wiremock.

#![cfg(feature = "http")]

use batterylevel_lib::source::{
    DomoticzConfig, DomoticzEndpoint, DomoticzSource, MIN_BATTERY_LEVELS_VERSION, NodeSource,
};
use batterylevel_lib::{
    Band, FetchError, MemoryRegistry, NodeId, NodeIdStrategy, Poller, RawSettings, Reading,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source_for(server: &MockServer, config: DomoticzConfig) -> DomoticzSource {
    config
        .with_port(server.address().port())
        .into_source()
        .unwrap()
}

fn config() -> DomoticzConfig {
    DomoticzConfig::new("127.0.0.1", "3")
}

fn battery_levels(entries: &serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "status": "OK",
        "title": "ZWaveGetBatteryLevels",
        "result": entries,
    }))
}

/// Answers the version query the battery level endpoint makes first.
async fn mount_version(server: &MockServer, version: &str) {
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("type", "command"))
        .and(query_param("param", "getversion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "title": "GetVersion",
            "version": version,
        })))
        .mount(server)
        .await;
}

// ============================================================================
// Battery level API
// ============================================================================

mod battery_levels {
    use super::*;

    #[tokio::test]
    async fn fetch_battery_levels() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .and(path("/json.htm"))
            .and(query_param("type", "command"))
            .and(query_param("param", "zwavegetbatterylevels"))
            .and(query_param("idx", "3"))
            .respond_with(battery_levels(&serde_json::json!([
                {"nodeID": 5, "nodeName": "Front door", "battery": 80},
                {"nodeID": 9, "nodeName": "", "battery": 255},
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut source = source_for(&mock_server, config());
        let snapshot = source.fetch_snapshot().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        let door = &snapshot.readings()[0];
        assert_eq!(door.id(), NodeId::new(5));
        assert_eq!(door.name(), "Front door");
        assert_eq!(door.reading().level().unwrap().value(), 80);

        let sleeper = &snapshot.readings()[1];
        assert_eq!(sleeper.name(), "Node 9");
        assert_eq!(sleeper.reading(), Reading::Unknown);
    }

    #[tokio::test]
    async fn sends_basic_auth() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .and(path("/json.htm"))
            .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(battery_levels(&serde_json::json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut source = source_for(&mock_server, config().with_credentials("admin", "secret"));
        let snapshot = source.fetch_snapshot().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn missing_result_is_empty() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "title": "ZWaveGetBatteryLevels",
            })))
            .mount(&mock_server)
            .await;

        let mut source = source_for(&mock_server, config());
        assert!(source.fetch_snapshot().await.unwrap().is_empty());
    }
}

// ============================================================================
// Error handling
// ============================================================================

mod errors {
    use super::*;

    #[tokio::test]
    async fn error_status() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ERR",
            })))
            .mount(&mock_server)
            .await;

        let mut source = source_for(&mock_server, config());
        let err = source.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, FetchError::Status(status) if status == "ERR"));
    }

    #[tokio::test]
    async fn unauthorized() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let mut source = source_for(&mock_server, config());
        assert!(matches!(
            source.fetch_snapshot().await,
            Err(FetchError::Status(_))
        ));
    }

    #[tokio::test]
    async fn server_error() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let mut source = source_for(&mock_server, config());
        assert!(matches!(
            source.fetch_snapshot().await,
            Err(FetchError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn html_body() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&mock_server)
            .await;

        let mut source = source_for(&mock_server, config());
        assert!(matches!(
            source.fetch_snapshot().await,
            Err(FetchError::Json(_))
        ));
    }
}

// ============================================================================
// Device list API
// ============================================================================

mod device_list {
    use super::*;

    #[tokio::test]
    async fn packed_ids_filtered_by_hardware() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json.htm"))
            .and(query_param("type", "devices"))
            .and(query_param("used", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "result": [
                    {"ID": "00000501", "Name": "Motion", "BatteryLevel": 64, "HardwareID": 3},
                    {"ID": "00000601", "Name": "Elsewhere", "BatteryLevel": 10, "HardwareID": 4},
                    {"ID": "00000701", "Name": "Mains", "BatteryLevel": 255, "HardwareID": 3},
                ],
            })))
            .mount(&mock_server)
            .await;

        let mut source = source_for(
            &mock_server,
            config().with_endpoint(DomoticzEndpoint::DeviceList(NodeIdStrategy::Packed)),
        );
        let snapshot = source.fetch_snapshot().await.unwrap();

        let ids: Vec<_> = snapshot.readings().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![NodeId::new(5), NodeId::new(7)]);
        assert_eq!(snapshot.readings()[1].reading(), Reading::Unknown);
    }
}

// ============================================================================
// Poller over Domoticz
// ============================================================================

mod poller {
    use super::*;

    #[tokio::test]
    async fn level_drop_updates_band() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .respond_with(battery_levels(&serde_json::json!([
                {"nodeID": 5, "nodeName": "Front door", "battery": 80},
            ])))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(battery_levels(&serde_json::json!([
                {"nodeID": 5, "nodeName": "Front door", "battery": 20},
            ])))
            .mount(&mock_server)
            .await;

        let settings = RawSettings::from_json(r#"{"Mode2": "80", "Mode3": "50", "Mode4": "25"}"#)
            .unwrap()
            .resolve();
        assert!(settings.warnings.is_empty());

        let mut poller = Poller::new(
            source_for(&mock_server, config()),
            MemoryRegistry::new(),
            &settings.value,
        );

        let report = poller.tick(chrono::Utc::now()).await;
        assert_eq!(report.applied, 1);
        assert_eq!(poller.registry().record(NodeId::new(5)).unwrap().band(), Band::Full);

        let report = poller.tick(chrono::Utc::now()).await;
        assert_eq!(report.applied, 0);

        let report = poller.tick(chrono::Utc::now()).await;
        assert_eq!(report.applied, 1);
        let record = poller.registry().record(NodeId::new(5)).unwrap();
        assert_eq!(record.level().value(), 20);
        assert_eq!(record.icon(), "batterylevelempty");
    }

    #[tokio::test]
    async fn outage_marks_nodes_stale() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;

        Mock::given(method("GET"))
            .respond_with(battery_levels(&serde_json::json!([
                {"nodeID": 5, "nodeName": "Front door", "battery": 80},
            ])))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let mut poller = Poller::new(
            source_for(&mock_server, config()),
            MemoryRegistry::new(),
            &batterylevel_lib::Settings::default(),
        );

        poller.tick(chrono::Utc::now()).await;
        let report = poller.tick(chrono::Utc::now()).await;

        assert!(report.fetch_error.is_some());
        assert!(poller.registry().record(NodeId::new(5)).unwrap().is_stale());
    }
}

// ============================================================================
// Version gate
// ============================================================================

mod version_gate {
    use super::*;

    async fn mount_levels(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/json.htm"))
            .and(query_param("param", "zwavegetbatterylevels"))
            .respond_with(battery_levels(&serde_json::json!([
                {"nodeID": 5, "nodeName": "Front door", "battery": 80},
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn legacy_numbering_accepted() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "4.11253").await;
        mount_levels(&mock_server).await;

        let mut source = source_for(&mock_server, config());
        assert_eq!(source.fetch_snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn year_numbering_accepted() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "2020.2").await;
        mount_levels(&mock_server).await;

        let mut source = source_for(&mock_server, config());
        assert_eq!(source.fetch_snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn old_version_rejected_before_polling() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "4.10717").await;
        Mock::given(method("GET"))
            .and(query_param("param", "zwavegetbatterylevels"))
            .respond_with(battery_levels(&serde_json::json!([])))
            .expect(0)
            .mount(&mock_server)
            .await;

        let mut source = source_for(&mock_server, config());
        let err = source.fetch_snapshot().await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::UnsupportedVersion { ref found, required }
                if found == "4.10717" && required == MIN_BATTERY_LEVELS_VERSION
        ));
    }

    #[tokio::test]
    async fn version_checked_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("param", "getversion"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "version": "2023.2",
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        mount_levels(&mock_server).await;

        let mut source = source_for(&mock_server, config());
        source.fetch_snapshot().await.unwrap();
        source.fetch_snapshot().await.unwrap();
    }

    #[tokio::test]
    async fn device_list_skips_version_check() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("param", "getversion"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("type", "devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "result": [],
            })))
            .mount(&mock_server)
            .await;

        let mut source = source_for(
            &mock_server,
            config().with_endpoint(DomoticzEndpoint::DeviceList(NodeIdStrategy::Packed)),
        );
        assert!(source.fetch_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outdated_server_marks_nothing_created() {
        let mock_server = MockServer::start().await;
        mount_version(&mock_server, "4.9700").await;
        mount_levels(&mock_server).await;

        let mut poller = Poller::new(
            source_for(&mock_server, config()),
            MemoryRegistry::new(),
            &batterylevel_lib::Settings::default(),
        );

        let report = poller.tick(chrono::Utc::now()).await;
        assert!(matches!(
            report.fetch_error,
            Some(FetchError::UnsupportedVersion { .. })
        ));
        assert!(poller.registry().is_empty());
    }
}
