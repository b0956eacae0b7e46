//! Development server for working on the dashboard without the real
//! platform.
//!
//! This binary serves the mock API on a fixed address, seeded with the
//! development dataset, then checks that the client can log in and read
//! through it.
//!
//! Usage: cargo run -p dev-server
//!
//! Environment (also read from `.env`):
//! - IP_ADDRESS: interface to bind (default 127.0.0.1)
//! - PORT: port to bind (default 8000)

use std::sync::Arc;

use anyhow::Result;
use client::telemetry::{self, LogFormat};
use client::models::Project;
use client::{ClientContext, Config, Entity, use_entity_list};
use test_helpers::mock::DevDataset;
use test_helpers::{MockState, alice_login_credentials, server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let subscriber = telemetry::get_subscriber("info", LogFormat::Pretty);
    telemetry::init_subscriber(subscriber)?;

    info!("🚀 Starting monitoring platform development server");

    let ip =
        std::env::var("IP_ADDRESS").unwrap_or_else(|_| "127.0.0.1".into());
    let port = match std::env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => 8000,
    };

    info!("📊 Setting up development data...");
    let state = Arc::new(MockState::default());
    let dataset = DevDataset::create(&state)?;

    let (server, port) = server::build(state, &ip, port)?;
    tokio::spawn(server);
    let address = format!("http://{ip}:{port}");
    info!("✅ Mock API running on {address}");

    if let Err(e) = smoke_test(&address).await {
        telemetry::log_error(e);
    }

    info!("🎯 Development server ready!");
    info!("   API: {address}/api/v2/");
    info!("   Client: API_ADDRESS={address}");
    info!("");
    dataset.print_summary();
    info!("");
    info!("👋 Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutting down development server");
    Ok(())
}

/// Log in and list projects through the client, as the dashboard would.
async fn smoke_test(address: &str) -> Result<()> {
    let mut config = Config::from_env()?;
    config.api_address = address.to_string();
    let ctx = ClientContext::new(config)?;
    client::login(&ctx, &alice_login_credentials()).await?;
    let projects = use_entity_list::<Project>(&ctx, Project::list_spec());
    let page = projects.fetch().await?;
    info!("🔑 Client check passed: {} projects visible", page.count);
    Ok(())
}
