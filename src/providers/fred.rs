// src/providers/fred.rs
use chrono::Utc;
use reqwest::Url;

use super::{decimal_at, endpoint, get_json, PriceSource, ProviderError};
use crate::config::Secret;
use crate::types::{ProviderId, RawObservation};

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/";

/// Latest observation of a FRED series (e.g. `PNGASJPUSDM`, LNG Japan, USD/MMBtu).
pub struct Fred {
    pub http: reqwest::Client,
    pub base_url: Url,
    pub api_key: Secret,
    pub series_id: String,
}

#[async_trait::async_trait]
impl PriceSource for Fred {
    fn id(&self) -> ProviderId {
        ProviderId::Fred
    }

    async fn fetch(&self) -> Result<RawObservation, ProviderError> {
        let url = endpoint(&self.base_url, "fred/series/observations")?;
        let req = self.http.get(url).query(&[
            ("series_id", self.series_id.as_str()),
            ("api_key", self.api_key.expose()),
            ("file_type", "json"),
            ("sort_order", "desc"),
            ("limit", "1"),
        ]);
        let doc = get_json(req).await?;

        // FRED reports a missing observation as "."
        let value = decimal_at(&doc, "/observations/0/value")?;
        if let Some(date) = doc.pointer("/observations/0/date").and_then(|d| d.as_str()) {
            tracing::debug!(series = %self.series_id, %date, %value, "fred observation");
        }

        Ok(RawObservation { value, provider: ProviderId::Fred, observed_at: Utc::now() })
    }
}
