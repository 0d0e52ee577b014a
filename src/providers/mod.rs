// src/providers/mod.rs
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, RequestBuilder, Url};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{OracleConfig, ProviderConfig};
use crate::types::{ProviderId, RawObservation};

pub mod commodities;
pub mod eia;
pub mod fred;
pub mod ninjas;

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    /// Transport failure or non-success HTTP status.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// Response arrived but the expected field is absent or not a number.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Fetch(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Fetch(e.to_string())
        }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn id(&self) -> ProviderId;
    /// Fetch the latest reference price.
    async fn fetch(&self) -> Result<RawObservation, ProviderError>;
}

/// Build the one provider this deployment is configured for.
pub fn from_config(cfg: &OracleConfig) -> Result<Arc<dyn PriceSource>, ProviderError> {
    let http = Client::builder()
        .timeout(cfg.http_timeout)
        .user_agent(concat!("autonom-price-updater/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Fetch(format!("http client: {e}")))?;
    let base = |default: &str| match &cfg.provider_base_url {
        Some(url) => Ok(url.clone()),
        None => Url::parse(default).map_err(|e| ProviderError::Fetch(format!("bad base url {default}: {e}"))),
    };

    let source: Arc<dyn PriceSource> = match &cfg.provider {
        ProviderConfig::Commodities { api_key, base: quote_base, symbol, invert } => {
            Arc::new(commodities::CommoditiesApi {
                http,
                base_url: base(commodities::DEFAULT_BASE_URL)?,
                api_key: api_key.clone(),
                base: quote_base.clone(),
                symbol: symbol.clone(),
                invert: *invert,
            })
        }
        ProviderConfig::Fred { api_key, series_id } => Arc::new(fred::Fred {
            http,
            base_url: base(fred::DEFAULT_BASE_URL)?,
            api_key: api_key.clone(),
            series_id: series_id.clone(),
        }),
        ProviderConfig::Eia { api_key, route, series, frequency } => Arc::new(eia::Eia {
            http,
            base_url: base(eia::DEFAULT_BASE_URL)?,
            api_key: api_key.clone(),
            route: route.clone(),
            series: series.clone(),
            frequency: frequency.clone(),
        }),
        ProviderConfig::Ninjas { api_key, commodity } => Arc::new(ninjas::Ninjas {
            http,
            base_url: base(ninjas::DEFAULT_BASE_URL)?,
            api_key: api_key.clone(),
            commodity: commodity.clone(),
        }),
    };
    Ok(source)
}

/// Fetch with bounded exponential backoff on transport errors only.
pub async fn fetch_with_retry(source: &dyn PriceSource, retries: usize) -> Result<RawObservation, ProviderError> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(retries);

    (|| source.fetch())
        .retry(backoff)
        .when(ProviderError::is_transient)
        .notify(|err: &ProviderError, dur: Duration| {
            tracing::warn!(provider = %source.id(), "fetch failed, retrying in {dur:?}: {err}");
        })
        .await
}

/// Join a relative path onto a provider root, keeping any path prefix the
/// root already carries.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, ProviderError> {
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        let p = format!("{}/", root.path());
        root.set_path(&p);
    }
    root.join(path.trim_start_matches('/'))
        .map_err(|e| ProviderError::Fetch(format!("bad endpoint {base}{path}: {e}")))
}

/// Send the request and decode a JSON body, mapping HTTP failures to `Fetch`.
pub(crate) async fn get_json(req: RequestBuilder) -> Result<Value, ProviderError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Fetch(format!("HTTP {status}: {}", truncate(&body, 200))));
    }
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| ProviderError::Malformed(format!("invalid JSON: {e}")))
}

/// Read a numeric field (JSON number or numeric string) at `pointer`.
///
/// Absent, null, empty, `"."`, NaN, infinite or otherwise non-numeric values
/// are rejected; nothing is defaulted.
pub(crate) fn decimal_at(doc: &Value, pointer: &str) -> Result<Decimal, ProviderError> {
    let field = doc
        .pointer(pointer)
        .ok_or_else(|| ProviderError::Malformed(format!("field `{pointer}` absent")))?;
    let text = match field {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Null => return Err(ProviderError::Malformed(format!("field `{pointer}` is null"))),
        other => {
            return Err(ProviderError::Malformed(format!("field `{pointer}` is not numeric: {other}")))
        }
    };
    parse_decimal(&text)
        .ok_or_else(|| ProviderError::Malformed(format!("field `{pointer}` is not numeric: `{text}`")))
}

// Plain decimal or scientific notation only; `Decimal::from_str` would also
// take digit separators like `1_000`.
fn parse_decimal(text: &str) -> Option<Decimal> {
    if !text.bytes().any(|b| b.is_ascii_digit())
        || !text.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
