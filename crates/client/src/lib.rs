//! Cardtrade client library.
//!
//! Services a marketplace front end calls, built on the pure logic of
//! `cardtrade-core`:
//! - `api` - REST backend client with response caching
//! - `auth` - Account id resolution for the signed-in identity
//! - `messaging` - Conversations, unread counters and admin contact
//! - `marketplace` - Polling listing feed
//! - `checkout` - Checkout session against the backend
//! - `collection` - Card creation, collection categories and marketplace transfer
//! - `state` - The `Services` container wiring it all from `ClientConfig`

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod checkout;
pub mod collection;
pub mod config;
pub mod error;
pub mod marketplace;
pub mod messaging;
pub mod state;

pub use api::{ApiClient, ApiError};
pub use auth::{AccountResolver, Identity, RetryPolicy};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, UserMessage};
pub use state::Services;
