//! Public waitlist signup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use agrolog_core::{DomainError, DomainResult, ExpectedVersion, OwnerId};

use crate::error::ServiceResult;
use crate::notify::{Notifier, spawn_waitlist_joined};
use crate::rate_limit::RateLimiter;
use crate::store::{DocumentStore, StoreError};

pub const WAITLIST_COLLECTION: &str = "waitlist";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    /// Trimmed and lowercased; also the document key.
    pub email: String,
    pub name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// Trim and lowercase, then require a `local@domain.tld` shape.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(DomainError::validation("email is malformed"))
    }
}

/// Outcome of a signup; `created` is false when the email was already listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signup {
    pub entry: WaitlistEntry,
    pub created: bool,
}

/// Waitlist entries are not owned by a user; they live under the system owner.
#[derive(Clone)]
pub struct WaitlistService {
    store: Arc<dyn DocumentStore<String, WaitlistEntry>>,
    limiter: RateLimiter,
    notifier: Arc<dyn Notifier>,
}

impl WaitlistService {
    pub fn new(
        store: Arc<dyn DocumentStore<String, WaitlistEntry>>,
        limiter: RateLimiter,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            limiter,
            notifier,
        }
    }

    /// Idempotent: a repeated signup returns the stored entry and sends nothing.
    #[instrument(skip(self, email, name), err)]
    pub async fn join(&self, email: &str, name: Option<String>) -> ServiceResult<Signup> {
        let email = normalize_email(email)?;
        self.limiter.check(&format!("waitlist:{email}")).await?;

        let entry = WaitlistEntry {
            email: email.clone(),
            name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            joined_at: Utc::now(),
        };

        match self
            .store
            .put(OwnerId::system(), email.clone(), entry.clone(), ExpectedVersion::Exact(0))
            .await
        {
            Ok(_) => {
                tracing::info!("waitlist signup recorded");
                spawn_waitlist_joined(self.notifier.clone(), entry.clone());
                Ok(Signup {
                    entry,
                    created: true,
                })
            }
            Err(StoreError::Conflict(_)) => {
                let existing = self
                    .store
                    .get(OwnerId::system(), &email)
                    .await?
                    .map(|v| v.value)
                    .unwrap_or(entry);
                Ok(Signup {
                    entry: existing,
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::ServiceError;
    use crate::notify::NotifyError;
    use crate::rate_limit::InMemoryCounterStore;
    use crate::store::InMemoryDocumentStore;

    #[derive(Default)]
    struct CountingNotifier {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn waitlist_joined(&self, _entry: &WaitlistEntry) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn waitlist_joined(&self, _entry: &WaitlistEntry) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp unreachable".to_string()))
        }
    }

    fn service(limit: u64, notifier: Arc<dyn Notifier>) -> WaitlistService {
        WaitlistService::new(
            Arc::new(InMemoryDocumentStore::<String, WaitlistEntry>::new()),
            RateLimiter::new(Arc::new(InMemoryCounterStore::new()), limit, Duration::from_secs(3600)),
            notifier,
        )
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ana@Finca.ES ").unwrap(), "ana@finca.es");
        assert!(normalize_email("ana").is_err());
        assert!(normalize_email("@finca.es").is_err());
        assert!(normalize_email("ana@finca").is_err());
        assert!(normalize_email("ana@@finca.es").is_err());
        assert!(normalize_email("a na@finca.es").is_err());
    }

    #[tokio::test]
    async fn repeated_signup_is_idempotent_and_notifies_once() {
        let notifier = Arc::new(CountingNotifier::default());
        let svc = service(10, notifier.clone());

        let first = svc.join("ana@finca.es", Some("Ana".to_string())).await.unwrap();
        let second = svc.join("ANA@finca.es", None).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.entry, first.entry);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_signup() {
        let svc = service(10, Arc::new(FailingNotifier));
        assert!(svc.join("ana@finca.es", None).await.unwrap().created);
    }

    #[tokio::test]
    async fn signup_is_rate_limited_per_email() {
        let svc = service(2, Arc::new(CountingNotifier::default()));
        svc.join("ana@finca.es", None).await.unwrap();
        svc.join("ana@finca.es", None).await.unwrap();
        let err = svc.join("ana@finca.es", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited { .. }));

        svc.join("luis@finca.es", None).await.unwrap();
    }
}
