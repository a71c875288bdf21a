// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the battery level library.
//!
//! Failures fall into three families that are all recoverable from the
//! point of view of a long-lived host process:
//!
//! - [`ConfigError`]: a setting could not be interpreted; the field falls
//!   back to its default.
//! - [`FetchError`]: no snapshot could be obtained this tick; every known
//!   node moves toward stale and the fetch is retried on the next tick.
//! - [`ApplyError`]: the host refused an action for one node; the rest of
//!   the tick's actions still go through.

use thiserror::Error;

use crate::types::NodeId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// A configuration field could not be interpreted.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The node source failed to produce a snapshot.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The host registry rejected an action.
    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },

    /// A packed hub identifier was not valid hexadecimal.
    #[error("invalid packed identifier: {0}")]
    InvalidPackedId(String),
}

/// Errors related to interpreting configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field expected an integer and got something else.
    #[error("invalid {field} parameter: {value:?} is not a number")]
    NotNumeric {
        /// The setting that failed to parse.
        field: &'static str,
        /// The raw value as provided.
        value: String,
    },

    /// A boolean field got an unrecognized value.
    #[error("invalid {field} parameter: {value:?} is not a flag")]
    NotFlag {
        /// The setting that failed to parse.
        field: &'static str,
        /// The raw value as provided.
        value: String,
    },

    /// The settings document itself could not be parsed.
    #[error("settings document error: {0}")]
    Document(String),
}

/// Errors raised while obtaining a snapshot from a node source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT connection or communication failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON payload could not be decoded.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML payload could not be decoded.
    #[cfg(feature = "ozw")]
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The source could not be reached.
    #[error("source unreachable: {0}")]
    Unreachable(String),

    /// The source answered but reported a failure.
    #[error("source returned an error status: {0}")]
    Status(String),

    /// The server runs a version lacking the API call in use.
    #[error("unsupported server version {found}, {required} or later is required")]
    UnsupportedVersion {
        /// Version reported by the server.
        found: String,
        /// Oldest version providing the call.
        required: &'static str,
    },

    /// The payload was readable but did not have the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The source data is older than the freshness window.
    #[error("source data is stale ({age_minutes} minutes old)")]
    Stale {
        /// Age of the data in minutes.
        age_minutes: i64,
    },
}

/// Errors returned by a host registry when applying an action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The host has no record for this node (for example it was deleted).
    #[error("no device record for node {0}")]
    NotFound(NodeId),

    /// The host refused the update.
    #[error("update of node {node} rejected: {reason}")]
    Rejected {
        /// The node whose update failed.
        node: NodeId,
        /// Host-provided reason.
        reason: String,
    },
}

impl ApplyError {
    /// Returns the node this error refers to.
    #[must_use]
    pub fn node(&self) -> NodeId {
        match self {
            Self::NotFound(node) | Self::Rejected { node, .. } => *node,
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            min: 0,
            max: 100,
            actual: 150,
        };
        assert_eq!(err.to_string(), "value 150 is out of range [0, 100]");
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::NotNumeric {
            field: "full",
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid full parameter: \"abc\" is not a number"
        );
    }

    #[test]
    fn unsupported_version_display() {
        let err = FetchError::UnsupportedVersion {
            found: "4.10717".to_string(),
            required: "4.11253",
        };
        assert_eq!(
            err.to_string(),
            "unsupported server version 4.10717, 4.11253 or later is required"
        );
    }

    #[test]
    fn fetch_error_stale_display() {
        let err = FetchError::Stale { age_minutes: 180 };
        assert_eq!(err.to_string(), "source data is stale (180 minutes old)");
    }

    #[test]
    fn apply_error_node() {
        let err = ApplyError::Rejected {
            node: NodeId::new(7),
            reason: "locked".to_string(),
        };
        assert_eq!(err.node(), NodeId::new(7));
        assert_eq!(ApplyError::NotFound(NodeId::new(3)).node(), NodeId::new(3));
    }

    #[test]
    fn error_from_fetch_error() {
        let err: Error = FetchError::Malformed("empty".to_string()).into();
        assert!(matches!(err, Error::Fetch(FetchError::Malformed(_))));
    }
}
