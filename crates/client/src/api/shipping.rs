//! Shipping option endpoints.

use tracing::{debug, instrument};

use cardtrade_core::shipping::{PostalCode, ShippingOption};

use super::cache::{CacheKey, CacheValue};
use super::conversions::convert_shipping_option;
use super::wire::ShippingOptionRecord;
use super::{ApiClient, ApiError};

impl ApiClient {
    /// Shipping options on offer, including the generic relay entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn shipping_options(&self) -> Result<Vec<ShippingOption>, ApiError> {
        if let Some(CacheValue::ShippingOptions(options)) =
            self.inner.cache.get(&CacheKey::ShippingOptions).await
        {
            debug!("Cache hit for shipping options");
            return Ok(options);
        }

        let url = self.endpoint("shipping-options")?;
        let records: Option<Vec<ShippingOptionRecord>> = self.get_json(url).await?;
        let options: Vec<ShippingOption> = records
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| convert_shipping_option(record, None))
            .collect();

        self.inner
            .cache
            .insert(
                CacheKey::ShippingOptions,
                CacheValue::ShippingOptions(options.clone()),
            )
            .await;

        Ok(options)
    }

    /// Located relay points around a postal code.
    ///
    /// Only located points are returned; anything else in the answer is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(postal_code = %postal_code))]
    pub async fn relay_points(
        &self,
        postal_code: &PostalCode,
    ) -> Result<Vec<ShippingOption>, ApiError> {
        let url = self.endpoint_with_query(
            "shipping-options/relay-points",
            &[("postalCode", postal_code.as_str())],
        )?;
        let records: Option<Vec<ShippingOptionRecord>> = self.get_json(url).await?;
        Ok(records
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| convert_shipping_option(record, Some(postal_code)))
            .filter(ShippingOption::is_located_relay_point)
            .collect())
    }
}
