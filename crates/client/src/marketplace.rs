//! Marketplace listing feed.
//!
//! [`MarketplaceFeed::refresh`] fetches once. [`MarketplaceFeed::watch`]
//! spawns a polling task and pushes every result to subscribers through a
//! `watch` channel:
//!
//! - the next fetch starts one interval after the previous one finished, so
//!   fetches never overlap
//! - after a failure the interval doubles, up to a cap, and resets on the
//!   next success
//! - a failed fetch keeps the last listings; only the failure fields change
//! - listings are re-checked against the query locally, so a lenient
//!   backend cannot leak non-matching rows into the feed
//! - dropping the [`FeedHandle`] stops the task

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use cardtrade_core::filter::MarketplaceQuery;
use cardtrade_core::listing::Listing;

use crate::api::{ApiClient, ApiError};
use crate::config::PollSettings;

/// Source of marketplace listings.
pub trait ListingSource: Send + Sync + 'static {
    fn fetch_listings(
        &self,
        query: &MarketplaceQuery,
    ) -> impl Future<Output = Result<Vec<Listing>, ApiError>> + Send;
}

impl ListingSource for ApiClient {
    fn fetch_listings(
        &self,
        query: &MarketplaceQuery,
    ) -> impl Future<Output = Result<Vec<Listing>, ApiError>> + Send {
        self.search_listings(query)
    }
}

/// Latest state of a feed.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Listings of the last successful fetch.
    pub listings: Vec<Listing>,
    /// When the last successful fetch completed.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Failed fetches since the last success.
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl FeedSnapshot {
    /// Whether the feed has produced at least one successful result.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.fetched_at.is_some()
    }

    fn record_success(&mut self, listings: Vec<Listing>) {
        self.listings = listings;
        self.fetched_at = Some(Utc::now());
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    fn record_failure(&mut self, error: &ApiError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.to_string());
    }
}

/// Wait before the next fetch given the number of consecutive failures.
#[must_use]
pub fn next_delay(interval: Duration, failures: u32, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
    interval.saturating_mul(factor).min(cap.max(interval))
}

/// Listing feed over a [`ListingSource`].
pub struct MarketplaceFeed<S> {
    source: Arc<S>,
    poll: PollSettings,
}

impl<S> Clone for MarketplaceFeed<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            poll: self.poll,
        }
    }
}

impl<S: ListingSource> MarketplaceFeed<S> {
    #[must_use]
    pub fn new(source: S, poll: PollSettings) -> Self {
        Self::from_shared(Arc::new(source), poll)
    }

    #[must_use]
    pub const fn from_shared(source: Arc<S>, poll: PollSettings) -> Self {
        Self { source, poll }
    }

    /// Fetch listings once.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails.
    pub async fn refresh(&self, query: &MarketplaceQuery) -> Result<Vec<Listing>, ApiError> {
        fetch(self.source.as_ref(), query).await
    }

    /// Start polling `query` until the returned handle is stopped or dropped.
    ///
    /// The first fetch happens immediately.
    #[must_use]
    pub fn watch(&self, query: MarketplaceQuery) -> FeedHandle {
        let (tx, rx) = watch::channel(FeedSnapshot::default());
        let task = tokio::spawn(poll_loop(Arc::clone(&self.source), query, self.poll, tx));
        FeedHandle { rx, task }
    }
}

/// Fetch and keep only the listings the query really matches.
async fn fetch<S: ListingSource>(
    source: &S,
    query: &MarketplaceQuery,
) -> Result<Vec<Listing>, ApiError> {
    let mut listings = source.fetch_listings(query).await?;
    let fetched = listings.len();
    listings.retain(|listing| query.matches(listing));
    if listings.len() < fetched {
        debug!(dropped = fetched - listings.len(), "Dropped listings outside the query");
    }
    Ok(listings)
}

#[instrument(skip_all, fields(query = %query.query_string()))]
async fn poll_loop<S: ListingSource>(
    source: Arc<S>,
    query: MarketplaceQuery,
    poll: PollSettings,
    tx: watch::Sender<FeedSnapshot>,
) {
    loop {
        let result = fetch(source.as_ref(), &query).await;
        let failures = match result {
            Ok(listings) => {
                debug!(count = listings.len(), "Feed refreshed");
                tx.send_modify(|snapshot| snapshot.record_success(listings));
                0
            }
            Err(e) => {
                let mut failures = 0;
                tx.send_modify(|snapshot| {
                    snapshot.record_failure(&e);
                    failures = snapshot.consecutive_failures;
                });
                warn!(error = %e, failures, "Feed refresh failed");
                failures
            }
        };

        if tx.is_closed() {
            debug!("All feed subscribers gone, stopping");
            return;
        }
        tokio::time::sleep(next_delay(poll.interval, failures, poll.max_backoff)).await;
    }
}

/// Running feed. Stops polling when dropped.
#[derive(Debug)]
pub struct FeedHandle {
    rx: watch::Receiver<FeedSnapshot>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// A new receiver for the feed's snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.rx.clone()
    }

    /// Current snapshot.
    #[must_use]
    pub fn latest(&self) -> FeedSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the polling task has stopped.
    pub async fn changed(&mut self) -> Option<FeedSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stop polling.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
