// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node source reading the OpenZWave controller cache file.
//!
//! OpenZWave persists its view of the network to
//! `zwcfg_0x<home id>.xml` (before 1.6) or `ozwcache_0x<home id>.xml`
//! (1.6). Battery devices carry command class 128 (`BATTERY_LEVEL`) whose
//! first value holds the last reported percentage.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::FetchError;

use super::{NodeReading, NodeSource, Reading, Snapshot};

const BATTERY_COMMAND_CLASS: &str = "128";

/// Configuration for an OpenZWave cache source.
///
/// # Examples
///
/// ```
/// use batterylevel_lib::source::OzwCacheConfig;
///
/// let config = OzwCacheConfig::new().with_directory("/var/lib/domoticz");
/// assert_eq!(config.directories().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct OzwCacheConfig {
    directories: Vec<PathBuf>,
}

impl OzwCacheConfig {
    /// Creates a configuration searching the standard Domoticz locations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            directories: vec![
                PathBuf::from("./Config"),
                PathBuf::from("/volume1/@appstore/domoticz/var"),
            ],
        }
    }

    /// Creates a configuration searching only `directory`.
    #[must_use]
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directories: vec![directory.into()],
        }
    }

    /// Adds a directory to search, after the existing ones.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directories.push(directory.into());
        self
    }

    /// Returns the directories searched, in order.
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Creates the source.
    #[must_use]
    pub fn into_source(self) -> OzwCacheSource {
        OzwCacheSource {
            directories: self.directories,
        }
    }
}

impl Default for OzwCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache file generation, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CacheFormat {
    Ozw16,
    Legacy,
}

impl CacheFormat {
    fn of(file_name: &str) -> Option<Self> {
        let (format, rest) = if let Some(rest) = file_name.strip_prefix("ozwcache_0x") {
            (Self::Ozw16, rest)
        } else if let Some(rest) = file_name.strip_prefix("zwcfg_0x") {
            (Self::Legacy, rest)
        } else {
            return None;
        };

        let home_id = rest.strip_suffix(".xml")?;
        (home_id.len() == 8 && home_id.chars().all(|c| c.is_ascii_hexdigit())).then_some(format)
    }
}

/// Reads battery levels from the OpenZWave controller cache.
///
/// The snapshot timestamp is the cache file's modification time, so a
/// controller that stopped updating its cache trips the poller's freshness
/// window.
#[derive(Debug, Clone)]
pub struct OzwCacheSource {
    directories: Vec<PathBuf>,
}

impl OzwCacheSource {
    /// Locates the controller cache file.
    ///
    /// OpenZWave 1.6 files win over legacy ones; within a format the most
    /// recently modified file is used. Only the first existing directory is
    /// searched.
    async fn locate(&self) -> Result<(PathBuf, DateTime<Utc>), FetchError> {
        let Some(directory) = self.first_existing_directory().await else {
            return Err(FetchError::Unreachable(
                "cannot locate the OpenZWave cache directory".to_string(),
            ));
        };

        let mut best: Option<(CacheFormat, DateTime<Utc>, PathBuf)> = None;
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(format) = file_name.to_str().and_then(CacheFormat::of) else {
                continue;
            };
            let modified: DateTime<Utc> = entry.metadata().await?.modified()?.into();

            let better = match &best {
                None => true,
                Some((best_format, best_modified, _)) => {
                    format < *best_format || (format == *best_format && modified > *best_modified)
                }
            };
            if better {
                best = Some((format, modified, entry.path()));
            }
        }

        best.map(|(_, modified, path)| (path, modified)).ok_or_else(|| {
            FetchError::Unreachable(format!(
                "no zwave controller cache file in {}",
                directory.display()
            ))
        })
    }

    async fn first_existing_directory(&self) -> Option<&Path> {
        for directory in &self.directories {
            if tokio::fs::metadata(directory)
                .await
                .is_ok_and(|m| m.is_dir())
            {
                return Some(directory.as_path());
            }
        }
        None
    }
}

impl NodeSource for OzwCacheSource {
    async fn fetch_snapshot(&mut self) -> Result<Snapshot, FetchError> {
        let (path, modified) = self.locate().await?;

        tracing::debug!(path = %path.display(), modified = %modified, "Reading OpenZWave cache");

        let xml = tokio::fs::read_to_string(&path).await?;
        let readings = parse_cache(&xml)?;

        Ok(Snapshot::with_timestamp(readings, modified))
    }
}

fn is_element(node: roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// Extracts the battery nodes from a cache document.
fn parse_cache(xml: &str) -> Result<Vec<NodeReading>, FetchError> {
    // OpenZWave truncates the file while rebuilding it at startup
    if xml.trim().is_empty() {
        return Err(FetchError::Malformed(
            "OpenZWave cache file is empty".to_string(),
        ));
    }

    let document = roxmltree::Document::parse(xml)?;

    let mut readings = Vec::new();
    for node in document
        .root_element()
        .children()
        .filter(|n| is_element(*n, "Node"))
    {
        let Some(battery) = node.descendants().find(|n| {
            is_element(*n, "CommandClass") && n.attribute("id") == Some(BATTERY_COMMAND_CLASS)
        }) else {
            continue;
        };

        let id: u32 = node
            .attribute("id")
            .and_then(|id| id.trim().parse().ok())
            .ok_or_else(|| FetchError::Malformed("node without a numeric id".to_string()))?;

        let level = battery
            .children()
            .find(|n| is_element(*n, "Value"))
            .and_then(|value| value.attribute("value"))
            .and_then(|value| value.trim().parse::<i64>().ok());

        readings.push(NodeReading::new(
            id.into(),
            node.attribute("name").unwrap_or_default(),
            level.map_or(Reading::Unknown, Reading::from_raw),
        ));
    }

    Ok(readings)
}
