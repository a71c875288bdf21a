// SPDX-License-Identifier: MPL-2.0

//! Demo program: track battery levels of a Domoticz Z-Wave controller.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example monitor -- <host> <hardware idx> [settings.json]
//! ```
//!
//! # Example
//!
//! ```bash
//! cargo run --example monitor -- 192.168.1.10 3 battery.json
//! ```
//!
//! The optional settings file holds the plugin parameters, for example
//! `{"interval": 30, "full": 80, "ok": 50, "low": 20, "debug": "Debug"}`.

use std::env;
use std::sync::Arc;

use batterylevel_lib::source::DomoticzConfig;
use batterylevel_lib::{MemoryRegistry, NodeAction, Poller, RawSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 || args.len() > 4 {
        eprintln!("Usage: {} <host> <hardware idx> [settings.json]", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --example monitor -- 192.168.1.10 3 battery.json");
        std::process::exit(1);
    }

    let raw = match args.get(3) {
        Some(path) => RawSettings::from_json(&std::fs::read_to_string(path)?)?,
        None => RawSettings::default(),
    };

    let loaded = raw.resolve();
    let settings = loaded.value;

    tracing_subscriber::fmt()
        .with_max_level(if settings.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    // Resolved before the subscriber existed
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    let source = DomoticzConfig::new(&args[1], &args[2]).into_source()?;
    let registry = Arc::new(MemoryRegistry::new());

    let mut events = registry.subscribe();
    tokio::spawn(async move {
        while let Ok(planned) = events.recv().await {
            match planned.action {
                NodeAction::Create { name, level, band } => {
                    println!("{}: new device {name} at {level} ({band})", planned.node);
                }
                NodeAction::Update(patch) => {
                    let level = patch.level.map_or_else(|| "-".to_string(), |l| l.to_string());
                    println!("{}: now {level}", planned.node);
                }
                NodeAction::MarkStale => println!("{}: no recent reading", planned.node),
            }
        }
    });

    println!(
        "Polling {} every {} minutes...",
        args[1], settings.poll_interval_minutes
    );

    let mut poller = Poller::new(source, registry, &settings);
    poller.run_until(std::future::pending()).await;

    Ok(())
}
