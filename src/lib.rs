//! # tracewire
//!
//! Server-side session layer for a developer-tooling event stream.
//!
//! An external tool connects, asks which instrumentation providers exist,
//! writes a bulk provider configuration into a transfer block, applies it,
//! and then receives a continuous, flow-controlled stream of event data.
//!
//! ## Architecture
//!
//! - **Control path**: request/response payloads (query providers, allocate
//!   an update block, apply it), one in flight at a time
//! - **Event path**: producers pack event records into pooled chunks; the
//!   session slices queued chunks into event data payloads whenever the
//!   client has nothing to say, resuming mid-chunk after backpressure
//! - **Transfer blocks**: numbered byte buffers carrying what does not fit in
//!   a payload (discovery descriptors, provider update records)
//!
//! Sessions are cooperative: [`Session::pump`] advances one step and never
//! blocks. The [`driver`] module runs pump loops on tokio.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tracewire::transfer::BlockManager;
//! use tracewire::{driver, EventServer, ProviderTable, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> tracewire::error::Result<()> {
//!     let transfer = Arc::new(BlockManager::new());
//!     let providers = Arc::new(ProviderTable::new(transfer.clone()));
//!     let server = EventServer::new(ServerConfig::default(), providers, transfer)?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:7878").await?;
//!     let (_stop, stop_rx) = tokio::sync::oneshot::channel();
//!     driver::serve_tcp(listener, server, stop_rx).await
//! }
//! ```

pub mod chunk;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod provider;
pub mod session;
pub mod transfer;
pub mod transport;

mod backpressure;
mod server;

pub use config::{ServerConfig, SessionConfig, StreamConfig};
pub use error::{Result, TracewireError};
pub use provider::{ProviderRegistry, ProviderTable};
pub use server::EventServer;
pub use session::{Session, SessionState, SessionStats};
pub use transport::{Transport, TransportStatus};
