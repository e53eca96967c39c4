//! Unix domain socket binding.
//!
//! # Example
//!
//! ```ignore
//! use tracewire::transport::{generate_socket_path, UnixSocketListener};
//!
//! let listener = UnixSocketListener::bind(generate_socket_path())?;
//! let stream = listener.accept().await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::net::{UnixListener, UnixStream};

use crate::error::Result;

/// Unique socket path under the system temp directory.
///
/// Format: `{tmp}/tracewire-{pid}-{seq}-{nanos:x}.sock`
pub fn generate_socket_path() -> PathBuf {
    static SEQ: AtomicU32 = AtomicU32::new(0);

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let name = format!(
        "tracewire-{}-{}-{:x}.sock",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed),
        nanos
    );
    std::env::temp_dir().join(name)
}

/// Listener owning its socket file; the file is removed on drop.
#[derive(Debug)]
pub struct UnixSocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixSocketListener {
    /// Bind to `path`, replacing a stale socket file left at it.
    ///
    /// Must be called inside a tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        tracing::debug!(path = %path.display(), "Bound unix socket");
        Ok(Self { listener, path })
    }

    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
