//! Command implementations.

pub mod account;
pub mod cards;
pub mod checkout;
pub mod collection;
pub mod conversations;
pub mod marketplace;
pub mod shipping;

use cardtrade_client::messaging::{Contact, MessagingError};
use cardtrade_client::{ApiError, ClientError, ConfigError, Services};
use cardtrade_core::AccountId;
use cardtrade_core::cart::CartError;
use cardtrade_core::checkout::{CheckoutBlocker, CheckoutError};
use cardtrade_core::collection::CollectionError;
use cardtrade_core::listing::DraftError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A command-line value was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

macro_rules! from_client_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for CliError {
                fn from(err: $source) -> Self {
                    Self::Client(err.into())
                }
            }
        )*
    };
}

from_client_error!(
    ApiError,
    ConfigError,
    MessagingError,
    CheckoutError,
    CheckoutBlocker,
    CartError,
    DraftError,
    CollectionError,
);

/// Account id of the signed-in user.
pub async fn signed_in(services: &Services) -> Result<AccountId, CliError> {
    services
        .accounts()
        .ensure_account_id()
        .await
        .ok_or(CliError::Client(ClientError::NotSignedIn))
}

/// The signed-in user with their pseudonym, for conversation headers.
pub async fn me(services: &Services) -> Result<Contact, CliError> {
    let id = signed_in(services).await?;
    let pseudonym = match services.api().get_profile(id).await {
        Ok(profile) => profile.pseudo,
        Err(e) => {
            tracing::warn!(error = %e, "Profile unavailable, sending without pseudonym");
            None
        }
    };
    Ok(Contact {
        id: id.into(),
        pseudonym,
    })
}
