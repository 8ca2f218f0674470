//! Operator stop requests.

use std::fmt;

use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::TRACING_TARGET_SHUTDOWN;

/// Signal that asked the running job to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Ctrl+C on the controlling terminal.
    Interrupt,
    /// SIGTERM from a supervisor.
    Terminate,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// Resolves with the first stop request.
///
/// A handler that cannot be installed never resolves, so the job keeps
/// running until the other signal or its own completion.
pub async fn stop_signal() -> StopSignal {
    let interrupt = async {
        match ctrl_c().await {
            Ok(()) => StopSignal::Interrupt,
            Err(error) => unavailable(StopSignal::Interrupt, error).await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                StopSignal::Terminate
            }
            Err(error) => unavailable(StopSignal::Terminate, error).await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<StopSignal>();

    tokio::select! {
        stop = interrupt => stop,
        stop = terminate => stop,
    }
}

async fn unavailable(signal: StopSignal, error: std::io::Error) -> StopSignal {
    tracing::warn!(
        target: TRACING_TARGET_SHUTDOWN,
        %signal,
        error = %error,
        "Cannot listen for stop signal"
    );
    std::future::pending().await
}
