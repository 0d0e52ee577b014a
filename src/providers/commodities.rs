// src/providers/commodities.rs
use chrono::Utc;
use reqwest::Url;
use rust_decimal::Decimal;

use super::{decimal_at, endpoint, get_json, PriceSource, ProviderError};
use crate::config::Secret;
use crate::types::{ProviderId, RawObservation};

pub const DEFAULT_BASE_URL: &str = "https://commodities-api.com/";

/// commodities-api.com `latest` rates.
///
/// Rates are quoted as units of `symbol` per one `base`; with `base=USD,
/// symbols=NG` the USD price of NG is `1 / rate`, hence `invert`.
pub struct CommoditiesApi {
    pub http: reqwest::Client,
    pub base_url: Url,
    pub api_key: Secret,
    pub base: String,
    pub symbol: String,
    pub invert: bool,
}

#[async_trait::async_trait]
impl PriceSource for CommoditiesApi {
    fn id(&self) -> ProviderId {
        ProviderId::Commodities
    }

    async fn fetch(&self) -> Result<RawObservation, ProviderError> {
        let url = endpoint(&self.base_url, "api/latest")?;
        let req = self.http.get(url).query(&[
            ("access_key", self.api_key.expose()),
            ("base", self.base.as_str()),
            ("symbols", self.symbol.as_str()),
        ]);
        let doc = get_json(req).await?;

        // errors come back in-band with a 200
        if let Some(err) = doc.pointer("/data/error").or_else(|| doc.pointer("/error")) {
            return Err(ProviderError::Malformed(format!("provider error: {err}")));
        }

        let rate = decimal_at(&doc, &format!("/data/rates/{}", self.symbol))?;
        let value = if self.invert {
            Decimal::ONE
                .checked_div(rate)
                .ok_or_else(|| ProviderError::Malformed(format!("cannot invert rate {rate}")))?
        } else {
            rate
        };
        tracing::debug!(base = %self.base, symbol = %self.symbol, %rate, %value, "commodities-api rate");

        Ok(RawObservation { value, provider: ProviderId::Commodities, observed_at: Utc::now() })
    }
}
