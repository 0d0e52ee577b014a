// src/config.rs
use alloy::primitives::Address;
use reqwest::Url;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::market::{parse_hour, parse_weekday, MarketCalendar, Reopen};
use crate::types::{ProviderId, ValueType, MAX_EXPO};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// String that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Per-provider query shape and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Commodities { api_key: Secret, base: String, symbol: String, invert: bool },
    Fred { api_key: Secret, series_id: String },
    Eia { api_key: Secret, route: String, series: String, frequency: String },
    Ninjas { api_key: Secret, commodity: String },
}

impl ProviderConfig {
    pub fn id(&self) -> ProviderId {
        match self {
            ProviderConfig::Commodities { .. } => ProviderId::Commodities,
            ProviderConfig::Fred { .. } => ProviderId::Fred,
            ProviderConfig::Eia { .. } => ProviderId::Eia,
            ProviderConfig::Ninjas { .. } => ProviderId::Ninjas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub rpc_url: Url,
    pub private_key: Secret,
    pub contract: Address,
    pub confirmations: u64,
    pub submit_timeout: Duration,
    pub confirm_timeout: Duration,
}

/// Immutable runtime configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    pub expo: u32,
    pub value_type: ValueType,
    pub provider: ProviderConfig,
    pub provider_base_url: Option<Url>,
    pub http_timeout: Duration,
    pub fetch_retries: usize,
    pub update_interval: Duration,
    pub cycle_timeout: Duration,
    pub market: MarketCalendar,
    /// `None` in dry-run / probe mode.
    pub chain: Option<ChainConfig>,
    pub metrics_addr: Option<SocketAddr>,
}

fn d_interval_secs() -> u64 { 300 }
fn d_http_timeout_secs() -> u64 { 30 }
fn d_fetch_retries() -> usize { 2 }
fn d_submit_timeout_secs() -> u64 { 60 }
fn d_confirm_timeout_secs() -> u64 { 180 }
fn d_confirmations() -> u64 { 1 }
fn d_cycle_timeout_secs() -> u64 { 600 }

#[inline]
pub fn secs(s: u64) -> Duration { Duration::from_secs(s) }

impl OracleConfig {
    /// Load from the process environment (after `.env`).
    pub fn from_env(with_chain: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), with_chain)
    }

    /// Load from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F, with_chain: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let expo: u32 = env.required_parsed("CHAINLINK_DECIMALS")?;
        if expo > MAX_EXPO {
            return Err(ConfigError::Invalid {
                key: "CHAINLINK_DECIMALS",
                reason: format!("{expo} exceeds {MAX_EXPO}"),
            });
        }
        let value_type = env.parsed_or("PRICE_VALUE_TYPE", ValueType::Int256)?;

        let provider_id = env.parsed_or("PRICE_PROVIDER", ProviderId::Commodities)?;
        let provider = match provider_id {
            ProviderId::Commodities => ProviderConfig::Commodities {
                api_key: env.secret("API_KEY")?,
                base: env.or("COMMODITIES_BASE", "USD"),
                symbol: env.or("COMMODITIES_SYMBOL", "NG"),
                invert: env.flag("COMMODITIES_INVERT", true)?,
            },
            ProviderId::Fred => ProviderConfig::Fred {
                api_key: env.secret("FRED_API_KEY")?,
                series_id: env.or("FRED_SERIES_ID", "PNGASJPUSDM"),
            },
            ProviderId::Eia => ProviderConfig::Eia {
                api_key: env.secret("EIA_API_KEY")?,
                route: env.or("EIA_ROUTE", "natural-gas/pri/fut"),
                series: env.or("EIA_SERIES", "RNGWHHD"),
                frequency: env.or("EIA_FREQUENCY", "daily"),
            },
            ProviderId::Ninjas => ProviderConfig::Ninjas {
                api_key: env.secret("API_NINJAS_KEY")?,
                commodity: env.or("NINJAS_COMMODITY", "natural_gas"),
            },
        };
        let provider_base_url = env.optional_parsed::<Url>("PROVIDER_BASE_URL")?;

        let market = if env.flag("MARKET_HOURS_GUARD", true)? {
            let mut cal = MarketCalendar::default();
            if let Some(days) = env.get("MARKET_CLOSED_DAYS") {
                cal.closed_days = split_list(&days)
                    .map(parse_weekday)
                    .collect::<Result<_, _>>()
                    .map_err(|reason| ConfigError::Invalid { key: "MARKET_CLOSED_DAYS", reason })?;
            }
            match env.get("MARKET_MAINTENANCE_HOURS") {
                Some(hours) if hours.eq_ignore_ascii_case("none") => cal.maintenance_hours.clear(),
                Some(hours) => {
                    cal.maintenance_hours = split_list(&hours)
                        .map(parse_hour)
                        .collect::<Result<_, _>>()
                        .map_err(|reason| ConfigError::Invalid { key: "MARKET_MAINTENANCE_HOURS", reason })?;
                }
                None => {}
            }
            cal.reopen = env.optional_parsed::<Reopen>("MARKET_REOPEN")?;
            cal
        } else {
            MarketCalendar::always_open()
        };

        let chain = if with_chain {
            let rpc_url = env.required_parsed::<Url>("RPC_URL")?;
            let private_key = env.secret("PRIVATE_KEY")?;
            let contract = env.required_parsed::<Address>("CONTRACT_ADDRESS")?;
            Some(ChainConfig {
                rpc_url,
                private_key,
                contract,
                confirmations: env.positive("CONFIRMATIONS", d_confirmations())?,
                submit_timeout: secs(env.positive("SUBMIT_TIMEOUT_SECS", d_submit_timeout_secs())?),
                confirm_timeout: secs(env.positive("CONFIRM_TIMEOUT_SECS", d_confirm_timeout_secs())?),
            })
        } else {
            None
        };

        Ok(Self {
            expo,
            value_type,
            provider,
            provider_base_url,
            http_timeout: secs(env.positive("HTTP_TIMEOUT_SECS", d_http_timeout_secs())?),
            fetch_retries: env.parsed_or("FETCH_RETRIES", d_fetch_retries())?,
            update_interval: secs(env.positive("UPDATE_INTERVAL_SECS", d_interval_secs())?),
            cycle_timeout: secs(env.positive("CYCLE_TIMEOUT_SECS", d_cycle_timeout_secs())?),
            market,
            chain,
            metrics_addr: env.optional_parsed::<SocketAddr>("METRICS_ADDR")?,
        })
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|p| !p.is_empty())
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn secret(&self, key: &'static str) -> Result<Secret, ConfigError> {
        self.get(key).map(Secret).ok_or(ConfigError::Missing(key))
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { key, reason: format!("`{v}` is not a boolean") }),
            },
        }
    }

    fn optional_parsed<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|v| v.parse::<T>().map_err(|e| ConfigError::Invalid { key, reason: e.to_string() }))
            .transpose()
    }

    fn required_parsed<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.optional_parsed(key)?.ok_or(ConfigError::Missing(key))
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        Ok(self.optional_parsed(key)?.unwrap_or(default))
    }

    /// Counts and durations where zero would stall or fail every cycle.
    fn positive<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + Default + PartialEq,
        T::Err: fmt::Display,
    {
        let value = self.parsed_or(key, default)?;
        if value == T::default() {
            return Err(ConfigError::Invalid { key, reason: "must be > 0".into() });
        }
        Ok(value)
    }
}
