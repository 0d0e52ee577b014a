// src/providers/ninjas.rs
use chrono::Utc;
use reqwest::Url;

use super::{decimal_at, endpoint, get_json, PriceSource, ProviderError};
use crate::config::Secret;
use crate::types::{ProviderId, RawObservation};

pub const DEFAULT_BASE_URL: &str = "https://api.api-ninjas.com/";

pub struct Ninjas {
    pub http: reqwest::Client,
    pub base_url: Url,
    pub api_key: Secret,
    /// e.g. `natural_gas`, `lean_hogs`
    pub commodity: String,
}

#[async_trait::async_trait]
impl PriceSource for Ninjas {
    fn id(&self) -> ProviderId {
        ProviderId::Ninjas
    }

    async fn fetch(&self) -> Result<RawObservation, ProviderError> {
        let url = endpoint(&self.base_url, "v1/commodityprice")?;
        let req = self
            .http
            .get(url)
            .header("X-Api-Key", self.api_key.expose())
            .query(&[("name", self.commodity.as_str())]);
        let doc = get_json(req).await?;

        let value = decimal_at(&doc, "/price")?;
        Ok(RawObservation { value, provider: ProviderId::Ninjas, observed_at: Utc::now() })
    }
}
