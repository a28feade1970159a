//! User lookup and profiles.

use cardtrade_core::checkout::DeliveryProfile;
use cardtrade_core::{AccountId, Email};
use serde::Serialize;
use tracing::{debug, instrument};

use super::cache::{CacheKey, CacheValue};
use super::wire::UserRecord;
use super::{ApiClient, ApiError, segment};

/// Public profile plus delivery details of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: AccountId,
    pub pseudo: Option<String>,
    pub email: Option<String>,
    /// Payout address for sales.
    pub paypal: Option<String>,
    pub delivery: DeliveryProfile,
}

/// Editable public fields of a profile. Every field is sent; an empty
/// string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub pseudo: String,
    pub address: String,
    pub paypal: String,
}

impl From<&UserProfile> for ProfileUpdate {
    fn from(profile: &UserProfile) -> Self {
        Self {
            pseudo: profile.pseudo.clone().unwrap_or_default(),
            address: profile.delivery.address.clone(),
            paypal: profile.paypal.clone().unwrap_or_default(),
        }
    }
}

impl UserProfile {
    /// Pseudonym, or `fallback` when the account has none.
    #[must_use]
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.pseudo
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(fallback)
    }
}

impl ApiClient {
    /// Look up the account id registered for an email.
    ///
    /// Returns `Ok(None)` when the backend does not know the email yet (404,
    /// or a record without an id).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any other reason.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn find_account_id(&self, email: &Email) -> Result<Option<AccountId>, ApiError> {
        let url = self.endpoint(&format!("users/email/{}", segment(email.as_str())))?;
        match self.get_json::<Option<UserRecord>>(url).await {
            Ok(record) => Ok(record.and_then(|r| r.id).map(AccountId::new)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get a profile by account id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for unknown accounts, or an error if the
    /// request fails.
    #[instrument(skip(self), fields(account_id = %id))]
    pub async fn get_profile(&self, id: AccountId) -> Result<UserProfile, ApiError> {
        let cache_key = CacheKey::Profile(id);

        if let Some(CacheValue::Profile(profile)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for profile");
            return Ok(*profile);
        }

        let url = self.endpoint(&format!("users/id/{id}"))?;
        let record: Option<UserRecord> = self.get_json(url).await?;
        let record = record.ok_or_else(|| ApiError::NotFound(format!("user {id}")))?;
        let profile = UserProfile::from_record(id, record);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Profile(Box::new(profile.clone())))
            .await;

        Ok(profile)
    }

    /// Save profile edits and drop the cached copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, update), fields(account_id = %id))]
    pub async fn update_profile(
        &self,
        id: AccountId,
        update: &ProfileUpdate,
    ) -> Result<(), ApiError> {
        self.put_unit(self.endpoint(&format!("users/{id}"))?, update)
            .await?;
        self.inner.cache.invalidate(&CacheKey::Profile(id)).await;
        Ok(())
    }
}
