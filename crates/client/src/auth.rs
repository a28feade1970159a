//! Account id resolution for the signed-in identity.
//!
//! The identity provider knows a user by uid and email; the backend keys
//! everything by a numeric account id. Right after sign-up the backend row
//! may not exist yet, so the lookup by email is retried with exponential
//! backoff before giving up.
//!
//! # Session rules
//!
//! - The id is looked up lazily, at most once per identity, and kept in
//!   memory for the session
//! - Concurrent callers share a single in-flight resolution
//! - A new identity (or sign-out) drops the cached id; a resolution that was
//!   running for the previous identity is discarded
//! - Registration can store the id it just created with
//!   [`AccountResolver::set_account_id`], skipping the lookup

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use cardtrade_core::{AccountId, Email, ExternalUid};

use crate::api::{ApiClient, ApiError};
use crate::error::{clear_sentry_user, set_sentry_user};

/// Looks up the account id registered for an email.
pub trait AccountLookup: Send + Sync + 'static {
    /// `Ok(None)` means "not registered yet".
    fn find_account_id(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<AccountId>, ApiError>> + Send;
}

impl AccountLookup for ApiClient {
    fn find_account_id(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<AccountId>, ApiError>> + Send {
        Self::find_account_id(self, email)
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Factor applied to the wait after each further failure.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based), or `None` after
    /// the last attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.checked_pow(attempt - 1).unwrap_or(u32::MAX);
        Some(self.initial_delay.saturating_mul(factor))
    }

    /// Every wait of a fully failed resolution, in order.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .filter_map(|attempt| self.delay_after(attempt))
            .collect()
    }
}

/// Signed-in identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: ExternalUid,
    pub email: Email,
}

#[derive(Debug, Default)]
struct Session {
    identity: Option<Identity>,
    account_id: Option<AccountId>,
    /// Bumped on every identity change.
    generation: u64,
}

/// Resolves and caches the account id of the current identity.
///
/// Cheap to clone; clones share the session.
pub struct AccountResolver<L> {
    inner: Arc<ResolverInner<L>>,
}

impl<L> Clone for AccountResolver<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ResolverInner<L> {
    lookup: L,
    policy: RetryPolicy,
    session: Mutex<Session>,
    /// Held for the whole duration of a resolution.
    in_flight: Mutex<()>,
}

impl<L: AccountLookup> AccountResolver<L> {
    #[must_use]
    pub fn new(lookup: L, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                lookup,
                policy,
                session: Mutex::new(Session::default()),
                in_flight: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Report the identity provider's current user (`None` = signed out).
    ///
    /// Switching to a different identity clears the cached account id.
    /// Reporting the same identity again is a no-op.
    pub async fn identity_changed(&self, identity: Option<Identity>) {
        let mut session = self.inner.session.lock().await;
        if session.identity == identity {
            return;
        }
        debug!(signed_in = identity.is_some(), "Identity changed");
        session.identity = identity;
        session.account_id = None;
        session.generation += 1;
        if session.identity.is_none() {
            clear_sentry_user();
        }
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.inner.session.lock().await.identity.clone()
    }

    /// Cached account id, without triggering a lookup.
    pub async fn account_id(&self) -> Option<AccountId> {
        self.inner.session.lock().await.account_id
    }

    /// Store an id obtained elsewhere (e.g. just created by registration).
    pub async fn set_account_id(&self, id: AccountId) {
        let mut session = self.inner.session.lock().await;
        session.account_id = Some(id);
        if let Some(identity) = &session.identity {
            set_sentry_user(&id, Some(identity.email.as_str()));
        }
    }

    /// The account id of the current identity, resolving it if needed.
    ///
    /// Returns `None` when signed out, or when every lookup attempt failed.
    /// A later call will try again.
    #[instrument(skip(self))]
    pub async fn ensure_account_id(&self) -> Option<AccountId> {
        if let Some(id) = self.account_id().await {
            return Some(id);
        }

        let _in_flight = self.inner.in_flight.lock().await;

        // Another caller may have finished while we waited.
        let (email, generation) = {
            let session = self.inner.session.lock().await;
            if session.account_id.is_some() {
                return session.account_id;
            }
            let identity = session.identity.as_ref()?;
            (identity.email.clone(), session.generation)
        };

        let resolved = resolve_with_retry(&self.inner.lookup, &email, self.inner.policy).await?;

        let mut session = self.inner.session.lock().await;
        if session.generation != generation {
            debug!("Identity changed during resolution, discarding result");
            return None;
        }
        session.account_id = Some(resolved);
        set_sentry_user(&resolved, Some(email.as_str()));
        Some(resolved)
    }
}

/// Look up `email` until it resolves or the policy is exhausted.
async fn resolve_with_retry<L: AccountLookup>(
    lookup: &L,
    email: &Email,
    policy: RetryPolicy,
) -> Option<AccountId> {
    for attempt in 1..=policy.max_attempts {
        match lookup.find_account_id(email).await {
            Ok(Some(id)) => {
                info!(attempt, account_id = %id, "Account id resolved");
                return Some(id);
            }
            Ok(None) => warn!(attempt, "Account not found yet"),
            Err(e) => warn!(attempt, error = %e, "Account lookup failed"),
        }
        if let Some(delay) = policy.delay_after(attempt) {
            tokio::time::sleep(delay).await;
        }
    }
    warn!(
        attempts = policy.max_attempts,
        "Giving up on account id resolution"
    );
    None
}
