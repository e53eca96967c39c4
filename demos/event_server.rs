//! Event Server - a TCP event stream with a synthetic provider.
//!
//! This example demonstrates:
//! - Registering providers with `ProviderTable::register`
//! - Serving sessions with `driver::serve_tcp`
//! - Producing events from another task with `EventServer::write_event`
//!
//! ```text
//! cargo run --example event_server -- 127.0.0.1:7878 [config.json]
//! RUST_LOG=tracewire=debug cargo run --example event_server
//! ```
//!
//! A client enables the `ticker` provider by allocating an update block,
//! writing a record for provider 1 with mask `0x01` into it, and applying
//! it. Tick events then stream as event data payloads.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use tracewire::provider::{EventDescriptor, ProviderDescriptor};
use tracewire::transfer::BlockManager;
use tracewire::{driver, EventServer, ProviderTable, ServerConfig, TracewireError};

const TICKER_PROVIDER: u32 = 1;
const TICK_EVENT: u32 = 0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:7878".to_string());
    let config = match args.next() {
        Some(path) => ServerConfig::from_json_file(path)?,
        None => ServerConfig::default(),
    };

    let transfer = Arc::new(BlockManager::new());
    let providers = Arc::new(ProviderTable::new(transfer.clone()));
    providers.register(
        ProviderDescriptor::new(TICKER_PROVIDER, "ticker").with_event(
            EventDescriptor::new(TICK_EVENT, "tick").with_description("monotonic counter"),
        ),
    )?;
    let server = EventServer::new(config, providers, transfer)?;

    let producer = {
        let server = server.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(100));
            for seq in 0u64.. {
                interval.tick().await;
                match server.write_event(TICKER_PROVIDER, TICK_EVENT, &seq.to_be_bytes()) {
                    Ok(true) => {
                        server.flush_events();
                    }
                    Ok(false) => {}
                    Err(TracewireError::PoolExhausted) => {
                        tracing::warn!(seq, "Dropping tick, no free chunks");
                    }
                    Err(e) => {
                        tracing::error!("Producer stopped: {}", e);
                        break;
                    }
                }
            }
        })
    };

    let listener = TcpListener::bind(&addr).await?;
    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });

    driver::serve_tcp(listener, server, stop_rx).await?;
    producer.abort();
    Ok(())
}
