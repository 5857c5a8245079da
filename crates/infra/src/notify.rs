//! Outbound notifications. Delivery is best effort.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::waitlist::WaitlistEntry;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn waitlist_joined(&self, entry: &WaitlistEntry) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn waitlist_joined(&self, entry: &WaitlistEntry) -> Result<(), NotifyError> {
        tracing::info!(email = %entry.email, "waitlist confirmation queued");
        Ok(())
    }
}

/// Fire and forget: run the notification on its own task and log failures.
pub fn spawn_waitlist_joined(notifier: Arc<dyn Notifier>, entry: WaitlistEntry) {
    tokio::spawn(async move {
        if let Err(e) = notifier.waitlist_joined(&entry).await {
            tracing::warn!(error = %e, email = %entry.email, "waitlist notification failed");
        }
    });
}
