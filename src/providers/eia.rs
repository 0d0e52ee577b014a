// src/providers/eia.rs
use chrono::Utc;
use reqwest::Url;

use super::{decimal_at, endpoint, get_json, PriceSource, ProviderError};
use crate::config::Secret;
use crate::types::{ProviderId, RawObservation};

pub const DEFAULT_BASE_URL: &str = "https://api.eia.gov/";

/// EIA API v2 series data, newest period first.
pub struct Eia {
    pub http: reqwest::Client,
    pub base_url: Url,
    pub api_key: Secret,
    /// e.g. `natural-gas/pri/fut`
    pub route: String,
    /// e.g. `RNGWHHD` (Henry Hub spot)
    pub series: String,
    pub frequency: String,
}

#[async_trait::async_trait]
impl PriceSource for Eia {
    fn id(&self) -> ProviderId {
        ProviderId::Eia
    }

    async fn fetch(&self) -> Result<RawObservation, ProviderError> {
        let path = format!("v2/{}/data/", self.route.trim_matches('/'));
        let url = endpoint(&self.base_url, &path)?;
        let req = self.http.get(url).query(&[
            ("api_key", self.api_key.expose()),
            ("frequency", self.frequency.as_str()),
            ("data[0]", "value"),
            ("facets[series][]", self.series.as_str()),
            ("sort[0][column]", "period"),
            ("sort[0][direction]", "desc"),
            ("offset", "0"),
            ("length", "1"),
        ]);
        let doc = get_json(req).await?;

        let value = decimal_at(&doc, "/response/data/0/value")?;
        Ok(RawObservation { value, provider: ProviderId::Eia, observed_at: Utc::now() })
    }
}
