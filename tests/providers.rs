use autonom::config::OracleConfig;
use autonom::providers::{self, fetch_with_retry, PriceSource, ProviderError};
use autonom::types::ProviderId;
use httpmock::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

fn source_for(server: &MockServer, pairs: &[(&str, &str)]) -> Arc<dyn PriceSource> {
    let mut map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    map.insert("CHAINLINK_DECIMALS".into(), "8".into());
    map.insert("PROVIDER_BASE_URL".into(), server.base_url());
    map.insert("HTTP_TIMEOUT_SECS".into(), "5".into());
    let cfg = OracleConfig::from_lookup(|k| map.get(k).cloned(), false).unwrap();
    providers::from_config(&cfg).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ---- commodities-api ----

#[tokio::test]
async fn commodities_inverts_usd_based_rate() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/latest")
                .query_param("access_key", "ck")
                .query_param("base", "USD")
                .query_param("symbols", "NG");
            then.status(200)
                .json_body(json!({"data": {"success": true, "base": "USD", "rates": {"NG": 0.25, "USD": 1}}}));
        })
        .await;

    let source = source_for(&server, &[("API_KEY", "ck")]);
    let obs = source.fetch().await.unwrap();

    mock.assert_async().await;
    assert_eq!(source.id(), ProviderId::Commodities);
    assert_eq!(obs.provider, ProviderId::Commodities);
    assert_eq!(obs.value, dec("4"));
}

#[tokio::test]
async fn commodities_reads_direct_quote_when_not_inverted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/latest").query_param("base", "NG").query_param("symbols", "USD");
            then.status(200).json_body(json!({"data": {"rates": {"USD": 3.85}}}));
        })
        .await;

    let source = source_for(
        &server,
        &[("API_KEY", "ck"), ("COMMODITIES_BASE", "NG"), ("COMMODITIES_SYMBOL", "USD"), ("COMMODITIES_INVERT", "false")],
    );
    assert_eq!(source.fetch().await.unwrap().value, dec("3.85"));
}

#[tokio::test]
async fn commodities_rate_keeps_digits_beyond_float_precision() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/latest");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data": {"rates": {"USD": 3.8512345678901234567891}}}"#);
        })
        .await;

    let source = source_for(
        &server,
        &[("API_KEY", "ck"), ("COMMODITIES_BASE", "NG"), ("COMMODITIES_SYMBOL", "USD"), ("COMMODITIES_INVERT", "false")],
    );
    assert_eq!(source.fetch().await.unwrap().value, dec("3.8512345678901234567891"));
}

#[tokio::test]
async fn commodities_missing_rate_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/latest");
            then.status(200).json_body(json!({"data": {"success": true, "rates": {}}}));
        })
        .await;

    let source = source_for(&server, &[("API_KEY", "ck")]);
    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)), "{err}");
}

#[tokio::test]
async fn commodities_in_band_error_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/latest");
            then.status(200)
                .json_body(json!({"data": {"success": false, "error": {"code": 101, "info": "invalid access key"}}}));
        })
        .await;

    let source = source_for(&server, &[("API_KEY", "bad")]);
    let err = source.fetch().await.unwrap_err();
    assert!(err.to_string().contains("invalid access key"), "{err}");
}

#[tokio::test]
async fn commodities_zero_rate_cannot_be_inverted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/latest");
            then.status(200).json_body(json!({"data": {"rates": {"NG": 0}}}));
        })
        .await;

    let source = source_for(&server, &[("API_KEY", "ck")]);
    assert!(matches!(source.fetch().await, Err(ProviderError::Malformed(_))));
}

// ---- FRED ----

#[tokio::test]
async fn fred_reads_latest_observation_string() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/fred/series/observations")
                .query_param("series_id", "PNGASJPUSDM")
                .query_param("api_key", "fk")
                .query_param("file_type", "json")
                .query_param("sort_order", "desc")
                .query_param("limit", "1");
            then.status(200)
                .json_body(json!({"observations": [{"date": "2024-05-01", "value": "11.784615"}]}));
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "fred"), ("FRED_API_KEY", "fk")]);
    let obs = source.fetch().await.unwrap();

    mock.assert_async().await;
    assert_eq!(obs.provider, ProviderId::Fred);
    assert_eq!(obs.value, dec("11.784615"));
}

#[tokio::test]
async fn fred_missing_observation_marker_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/fred/series/observations");
            then.status(200).json_body(json!({"observations": [{"date": "2024-06-01", "value": "."}]}));
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "fred"), ("FRED_API_KEY", "fk")]);
    assert!(matches!(source.fetch().await, Err(ProviderError::Malformed(_))));
}

#[tokio::test]
async fn fred_empty_series_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/fred/series/observations");
            then.status(200).json_body(json!({"observations": []}));
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "fred"), ("FRED_API_KEY", "fk")]);
    assert!(matches!(source.fetch().await, Err(ProviderError::Malformed(_))));
}

// ---- EIA ----

#[tokio::test]
async fn eia_reads_newest_period_value() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/natural-gas/pri/fut/data/")
                .query_param("api_key", "ek")
                .query_param("frequency", "daily")
                .query_param("length", "1");
            then.status(200).json_body(json!({
                "response": {"total": 1, "data": [{"period": "2024-06-03", "series": "RNGWHHD", "value": 2.59}]}
            }));
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "eia"), ("EIA_API_KEY", "ek")]);
    let obs = source.fetch().await.unwrap();

    mock.assert_async().await;
    assert_eq!(obs.provider, ProviderId::Eia);
    assert_eq!(obs.value, dec("2.59"));
}

#[tokio::test]
async fn eia_null_value_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/natural-gas/pri/fut/data/");
            then.status(200).json_body(json!({"response": {"data": [{"period": "2024-06-03", "value": null}]}}));
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "eia"), ("EIA_API_KEY", "ek")]);
    assert!(matches!(source.fetch().await, Err(ProviderError::Malformed(_))));
}

// ---- API Ninjas ----

#[tokio::test]
async fn ninjas_sends_key_header_and_reads_price() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/commodityprice")
                .header("x-api-key", "nk")
                .query_param("name", "natural_gas");
            then.status(200)
                .json_body(json!({"exchange": "NYMEX", "name": "Natural Gas", "price": 2.913, "updated": 1717430400}));
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "ninjas"), ("API_NINJAS_KEY", "nk")]);
    let obs = source.fetch().await.unwrap();

    mock.assert_async().await;
    assert_eq!(obs.value, dec("2.913"));
}

#[tokio::test]
async fn ninjas_non_numeric_price_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/commodityprice");
            then.status(200).json_body(json!({"price": "NaN"}));
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "ninjas"), ("API_NINJAS_KEY", "nk")]);
    assert!(matches!(source.fetch().await, Err(ProviderError::Malformed(_))));
}

// ---- transport ----

#[tokio::test]
async fn http_error_status_is_a_fetch_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/fred/series/observations");
            then.status(500).body("upstream down");
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "fred"), ("FRED_API_KEY", "fk")]);
    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, ProviderError::Fetch(_)), "{err}");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/commodityprice");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "ninjas"), ("API_NINJAS_KEY", "nk")]);
    assert!(matches!(source.fetch().await, Err(ProviderError::Malformed(_))));
}

#[tokio::test]
async fn transport_failures_are_retried_then_surface() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/commodityprice");
            then.status(503);
        })
        .await;

    let source = source_for(&server, &[("PRICE_PROVIDER", "ninjas"), ("API_NINJAS_KEY", "nk")]);
    let err = fetch_with_retry(source.as_ref(), 1).await.unwrap_err();

    assert!(matches!(err, ProviderError::Fetch(_)));
    assert_eq!(mock.hits_async().await, 2);
}
