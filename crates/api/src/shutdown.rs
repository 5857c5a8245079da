//! Graceful-shutdown trigger for `axum::serve`.

use std::future::Future;

/// Resolves on ctrl-c or (unix) SIGTERM.
///
/// A listener that cannot be installed never fires, so a failed install does
/// not stop the server right after startup.
pub async fn shutdown_signal() {
    let ctrl_c = or_pending("ctrl-c", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

async fn or_pending<F, E>(signal: &'static str, listener: F)
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    if let Err(e) = listener.await {
        tracing::error!(error = %e, signal, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn failed_listener_never_fires() {
        let failed = or_pending("test", async { Err::<(), _>("no signal handler") });
        assert!(tokio::time::timeout(Duration::from_millis(50), failed).await.is_err());
    }

    #[tokio::test]
    async fn delivered_signal_fires() {
        let delivered = or_pending("test", async { Ok::<(), &str>(()) });
        assert!(tokio::time::timeout(Duration::from_millis(50), delivered).await.is_ok());
    }
}
