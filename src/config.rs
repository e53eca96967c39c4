//! Server configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it changes:
//!
//! ```
//! use tracewire::ServerConfig;
//!
//! let config = ServerConfig::from_json_str(r#"{ "session": { "max_event_sends_per_pump": 4 } }"#)
//!     .unwrap();
//! assert_eq!(config.session.max_event_sends_per_pump, 4);
//! assert_eq!(config.chunk_size, tracewire::chunk::DEFAULT_CHUNK_SIZE);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::error::{Result, TracewireError};
use crate::protocol::{EVENT_RECORD_HEADER_SIZE, MAX_EVENT_DATA_SIZE, MAX_PAYLOAD_SIZE};

/// Default number of event payloads a session sends per pump.
pub const DEFAULT_MAX_EVENT_SENDS_PER_PUMP: usize = 16;

/// Default outbound byte window of a stream transport.
pub const DEFAULT_SEND_WINDOW: usize = 64 * 1024;

/// Default size of a single stream read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Default driver sleep when a session has nothing to do.
pub const DEFAULT_IDLE_POLL_INTERVAL_MS: u64 = 1;

/// Top-level configuration of an [`EventServer`](crate::EventServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Capacity of each event chunk in bytes.
    pub chunk_size: usize,
    /// Upper bound on chunks alive at once; unbounded when absent.
    pub max_chunks: Option<usize>,
    /// Per-session tuning.
    pub session: SessionConfig,
    /// Stream transport tuning.
    pub stream: StreamConfig,
    /// How long the driver sleeps after a pump that made no progress.
    pub idle_poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks: None,
            session: SessionConfig::default(),
            stream: StreamConfig::default(),
            idle_poll_interval_ms: DEFAULT_IDLE_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = Some(max_chunks);
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    #[inline]
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Reject settings the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(TracewireError::Config("chunk_size must be non-zero".into()));
        }
        if self.chunk_size < EVENT_RECORD_HEADER_SIZE {
            return Err(TracewireError::Config(format!(
                "chunk_size {} is smaller than an event record header ({})",
                self.chunk_size, EVENT_RECORD_HEADER_SIZE
            )));
        }
        if self.max_chunks == Some(0) {
            return Err(TracewireError::Config("max_chunks must be non-zero".into()));
        }
        self.session.validate()?;
        self.stream.validate()
    }
}

/// Session event-loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest chunk slice carried by one event data payload.
    pub max_event_data_size: usize,
    /// Event payloads sent per pump before control returns to the caller.
    pub max_event_sends_per_pump: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_event_data_size: MAX_EVENT_DATA_SIZE,
            max_event_sends_per_pump: DEFAULT_MAX_EVENT_SENDS_PER_PUMP,
        }
    }
}

impl SessionConfig {
    pub fn with_max_event_data_size(mut self, size: usize) -> Self {
        self.max_event_data_size = size;
        self
    }

    pub fn with_max_event_sends_per_pump(mut self, sends: usize) -> Self {
        self.max_event_sends_per_pump = sends;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_event_data_size == 0 || self.max_event_data_size > MAX_EVENT_DATA_SIZE {
            return Err(TracewireError::Config(format!(
                "session.max_event_data_size must be in 1..={}, got {}",
                MAX_EVENT_DATA_SIZE, self.max_event_data_size
            )));
        }
        if self.max_event_sends_per_pump == 0 {
            return Err(TracewireError::Config(
                "session.max_event_sends_per_pump must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Stream transport tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Outbound bytes buffered before sends report not-ready.
    pub send_window: usize,
    /// Bytes requested from the socket per read.
    pub read_buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            send_window: DEFAULT_SEND_WINDOW,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl StreamConfig {
    pub fn with_send_window(mut self, bytes: usize) -> Self {
        self.send_window = bytes;
        self
    }

    pub fn with_read_buffer_size(mut self, bytes: usize) -> Self {
        self.read_buffer_size = bytes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.send_window < MAX_PAYLOAD_SIZE {
            return Err(TracewireError::Config(format!(
                "stream.send_window must hold at least one payload ({} bytes), got {}",
                MAX_PAYLOAD_SIZE, self.send_window
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(TracewireError::Config(
                "stream.read_buffer_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
