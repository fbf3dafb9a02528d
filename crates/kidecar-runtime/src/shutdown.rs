//! Graceful shutdown with signal handling

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels a token when the process receives SIGINT or SIGTERM
#[derive(Debug, Clone)]
pub struct SignalHandler {
    token: CancellationToken,
}

impl SignalHandler {
    /// Create a new signal handler
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Token cancelled on shutdown
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait for a signal, then cancel the token
    ///
    /// Returns early without cancelling if the token is cancelled elsewhere.
    pub async fn run(self) {
        tokio::select! {
            received = wait_for_signal() => {
                match received {
                    Ok(name) => info!(signal = name, "Received shutdown signal"),
                    Err(e) => error!(error = %e, "Failed to listen for shutdown signals"),
                }
                self.token.cancel();
            }
            _ = self.token.cancelled() => {}
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
