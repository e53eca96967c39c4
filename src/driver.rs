//! Tokio drivers: pump loops and accept loops.
//!
//! A session does nothing on its own; something has to call
//! [`Session::pump`] repeatedly. [`run_session`] does that on a task,
//! sleeping after pumps that made no progress. [`serve_tcp`] and
//! [`serve_unix`] accept connections, wrap them in a [`StreamTransport`] and
//! spawn a pump task per session until shutdown is signalled.
//!
//! # Example
//!
//! ```ignore
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
//! tokio::spawn(serve_tcp(listener, server.clone(), stop_rx));
//! // ...
//! let _ = stop_tx.send(());
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use crate::error::{Result, TracewireError};
use crate::server::EventServer;
use crate::session::{Session, SessionStats};
use crate::transport::{NonBlockingStream, StreamTransport, Transport};

/// Pump `session` until the client goes away.
///
/// Protocol violations are logged by the session and do not stop the loop.
/// End of stream is a normal exit.
///
/// # Errors
///
/// Returns the first fatal error other than `EndOfStream`.
pub async fn run_session<T: Transport>(
    mut session: Session<T>,
    idle_interval: Duration,
) -> Result<SessionStats> {
    loop {
        match session.pump() {
            Ok(()) => {}
            Err(TracewireError::EndOfStream) => {
                tracing::debug!(session_id = session.id(), "Client disconnected");
                return Ok(session.stats());
            }
            Err(e) if !e.is_fatal() => {}
            Err(e) => {
                tracing::error!(
                    session_id = session.id(),
                    state = %session.state(),
                    "Session failed: {}",
                    e
                );
                return Err(e);
            }
        }

        if session.is_idle() {
            tokio::time::sleep(idle_interval).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

/// Accept TCP clients until `shutdown` fires (or its sender is dropped).
///
/// Connections arriving while a session is active are refused. Running
/// sessions are aborted on shutdown.
pub async fn serve_tcp(
    listener: TcpListener,
    server: Arc<EventServer>,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Event server listening");
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%peer, "Failed to set TCP_NODELAY: {}", e);
                    }
                    start_session(&server, stream, &peer.to_string(), &mut sessions);
                }
                Err(e) => tracing::warn!("Accept failed: {}", e),
            },
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }

    sessions.shutdown().await;
    tracing::info!("Event server stopped");
    Ok(())
}

/// Accept Unix socket clients until `shutdown` fires.
///
/// Same policy as [`serve_tcp`]. The socket file is removed when the
/// listener is dropped on return.
#[cfg(unix)]
pub async fn serve_unix(
    listener: crate::transport::UnixSocketListener,
    server: Arc<EventServer>,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<()> {
    tracing::info!(path = %listener.path().display(), "Event server listening");
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(stream) => start_session(&server, stream, "unix", &mut sessions),
                Err(e) => tracing::warn!("Accept failed: {}", e),
            },
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }

    sessions.shutdown().await;
    tracing::info!("Event server stopped");
    Ok(())
}

fn start_session<S: NonBlockingStream + 'static>(
    server: &Arc<EventServer>,
    stream: S,
    peer: &str,
    sessions: &mut JoinSet<()>,
) {
    let transport = StreamTransport::with_config(stream, server.config().stream);
    match server.accept_session(transport) {
        Ok(session) => {
            tracing::info!(session_id = session.id(), peer, "Client connected");
            let idle_interval = server.config().idle_poll_interval();
            sessions.spawn(async move {
                if let Ok(stats) = run_session(session, idle_interval).await {
                    tracing::debug!(?stats, "Session finished");
                }
            });
        }
        Err(e) => tracing::warn!(peer, "Refusing connection: {}", e),
    }
}
