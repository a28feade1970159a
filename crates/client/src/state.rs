//! Service container shared by every screen.

use std::sync::Arc;

use cardtrade_core::cart::Cart;

use crate::api::{ApiClient, ApiError};
use crate::auth::AccountResolver;
use crate::checkout::CheckoutSession;
use crate::collection::CollectionService;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::marketplace::MarketplaceFeed;
use crate::messaging::Messenger;

/// Every client service, built once from a [`ClientConfig`].
///
/// This struct is cheaply cloneable via `Arc`; clones share the HTTP
/// connection pool, the response cache and the signed-in session.
#[derive(Clone)]
pub struct Services {
    inner: Arc<ServicesInner>,
}

struct ServicesInner {
    config: ClientConfig,
    api: ApiClient,
    accounts: AccountResolver<ApiClient>,
    messenger: Messenger<ApiClient>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Create the services.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config)?;
        let accounts = AccountResolver::new(api.clone(), config.lookup_retry);
        let messenger = Messenger::new(api.clone(), config.admin_account_id);

        Ok(Self {
            inner: Arc::new(ServicesInner {
                config,
                api,
                accounts,
                messenger,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the backend client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Signed-in identity and its account id.
    #[must_use]
    pub fn accounts(&self) -> &AccountResolver<ApiClient> {
        &self.inner.accounts
    }

    #[must_use]
    pub fn messenger(&self) -> &Messenger<ApiClient> {
        &self.inner.messenger
    }

    /// A listing feed polling with the configured settings.
    #[must_use]
    pub fn marketplace_feed(&self) -> MarketplaceFeed<ApiClient> {
        MarketplaceFeed::new(self.inner.api.clone(), self.inner.config.poll)
    }

    /// Collection and card-creation flows.
    #[must_use]
    pub fn collection(&self) -> CollectionService {
        CollectionService::new(self.inner.api.clone())
    }

    /// Start a checkout for the signed-in buyer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotSignedIn`] when no account id can be
    /// resolved, or an error if loading the checkout data fails.
    pub async fn checkout(&self, cart: Cart) -> Result<CheckoutSession, ClientError> {
        let buyer = self
            .accounts()
            .ensure_account_id()
            .await
            .ok_or(ClientError::NotSignedIn)?;
        CheckoutSession::load(self.inner.api.clone(), buyer, cart).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checkout_requires_sign_in() {
        let services = Services::new(ClientConfig::new("http://127.0.0.1:9").unwrap()).unwrap();
        assert!(services.accounts().identity().await.is_none());
        assert!(matches!(
            services.checkout(Cart::new()).await,
            Err(ClientError::NotSignedIn)
        ));
    }

    #[test]
    fn test_messenger_uses_configured_admin() {
        let mut config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        config.admin_account_id = Some(cardtrade_core::AccountId::new(1));
        let services = Services::new(config).unwrap();
        assert_eq!(
            services.messenger().admin(),
            Some(cardtrade_core::AccountId::new(1))
        );
    }
}
