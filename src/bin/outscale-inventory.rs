// Copyright (c) 2025 - Cowboy AI, Inc.

//! Outscale inventory CLI
//!
//! Resolves one inventory source against the live Outscale API and prints
//! the graph in the conventional dynamic-inventory JSON shape.
//!
//! Run with: cargo run --bin outscale-inventory --features client -- config.outscale.yml
//!
//! Credentials come from the config file or the OSC_ACCESS_KEY /
//! OSC_SECRET_KEY / OSC_REGION environment variables.

use anyhow::{Context, Result};
use tracing::info;

use outscale_inventory::adapters::{OutscaleClient, OutscaleConfig};
use outscale_inventory::{InventoryConfig, InventoryResolver};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: outscale-inventory <config.outscale.yml>")?;
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {path}"))?;
    let config = InventoryConfig::from_yaml_str(&text)?;

    let client = OutscaleClient::new(OutscaleConfig::from_inventory_config(&config)?)?;
    let resolver = InventoryResolver::new(config)?;

    let graph = resolver.resolve(&client).await?;
    info!(
        hosts = graph.hosts().count(),
        groups = graph.groups().count(),
        "inventory resolved"
    );

    println!("{}", serde_json::to_string_pretty(&graph.to_json())?);
    Ok(())
}
