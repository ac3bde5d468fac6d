use std::fs;
use std::time::{Duration, Instant};

use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const BALANCE_BODY: &str =
        r#"{"status":"1","message":"OK","result":"1500000000000000000"}"#;

    pub const TXLIST_BODY: &str = r#"{"status":"1","message":"OK","result":[
        {"hash":"0xa","from":"0xF1","value":"1000000000000000000","timeStamp":"1700000000"},
        {"hash":"0xb","from":"0xF2","value":"500000000000000000","timeStamp":"1699999000"}
    ]}"#;

    /// Explorer mock serving both the balance and txlist actions.
    pub async fn create_explorer_mock() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("action", "balance"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BALANCE_BODY))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("action", "txlist"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TXLIST_BODY))
            .mount(&server)
            .await;
        server
    }

    pub fn config_yaml(explorer_uri: &str, liquidity_uri: &str) -> String {
        format!(
            r#"
wallet_address: "0xWallet"
conversion_rate: 3000.0
explorer:
  base_url: "{explorer_uri}"
liquidity:
  base_url: "{liquidity_uri}"
  pair_address: "0xPair"
  network: "ethereum"
http:
  timeout_ms: 2000
  max_attempts: 2
  backoff_base_ms: 50
"#
        )
    }
}

fn service_from_yaml(yaml: &str) -> prestat::stats::StatsService {
    let config: prestat::config::AppConfig = serde_yaml::from_str(yaml).expect("valid config");
    prestat::stats::StatsService::from_config(config).expect("service builds")
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let server = test_utils::create_explorer_mock().await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = test_utils::config_yaml(&server.uri(), &server.uri());
    fs::write(config_file.path(), &config_content).expect("Failed to write config file");

    let result = prestat::run_command(
        prestat::AppCommand::Stats,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Stats command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_presale_stats_end_to_end() {
    let server = test_utils::create_explorer_mock().await;
    let svc = service_from_yaml(&test_utils::config_yaml(&server.uri(), &server.uri()));

    let result = svc.get_presale_stats().await.unwrap();
    info!(?result, "Aggregated presale stats");
    assert!(!result.degraded);
    assert_eq!(result.data.total_native_amount, "1.5");
    assert_eq!(result.data.total_usd_amount, 4500);
    assert_eq!(result.data.contributor_count, 2);
    assert_eq!(result.max_age_secs, 30);
}

#[test_log::test(tokio::test)]
async fn test_timeout_then_success_stays_within_latency_bounds() {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    let server = test_utils::create_explorer_mock().await;
    // The first balance attempt stalls past the per-attempt deadline.
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", "balance"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(test_utils::BALANCE_BODY)
                .set_delay(Duration::from_millis(800)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    let yaml = format!(
        r#"
wallet_address: "0xWallet"
conversion_rate: 3000.0
explorer:
  base_url: "{uri}"
liquidity:
  base_url: "{uri}"
  pair_address: "0xPair"
http:
  timeout_ms: 150
  max_attempts: 2
  backoff_base_ms: 100
"#,
        uri = server.uri()
    );
    let svc = service_from_yaml(&yaml);

    let started = Instant::now();
    let result = svc.get_presale_stats().await.unwrap();
    let elapsed = started.elapsed();

    assert!(!result.degraded);
    assert_eq!(result.data.total_usd_amount, 4500);
    // Attempt 1 timed out, so at least one backoff delay passed...
    assert!(elapsed >= Duration::from_millis(100), "elapsed: {elapsed:?}");
    // ...and the whole query stayed within timeout + backoff + timeout + slack.
    assert!(elapsed <= Duration::from_millis(1200), "elapsed: {elapsed:?}");
}

#[test_log::test(tokio::test)]
async fn test_rate_limited_upstream_surfaces_hint() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "20")
                .set_body_string("rate limited"),
        )
        .mount(&server)
        .await;

    let svc = service_from_yaml(&test_utils::config_yaml(&server.uri(), &server.uri()));
    let err = svc.get_presale_stats().await.unwrap_err();
    assert_eq!(err.status, 429);
    assert_eq!(err.retry_after, Some(20));
}

#[test_log::test(tokio::test)]
async fn test_liquidity_end_to_end() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let explorer = test_utils::create_explorer_mock().await;
    let liquidity = MockServer::start().await;
    let body = r#"{"pairs":[
        {"pairAddress":"0xPair","liquidity":{"usd":250000.4,"base":10.0,"quote":5.0},
         "baseToken":{"symbol":"PSALE"},"quoteToken":{"symbol":"WETH"}}
    ]}"#;
    Mock::given(method("GET"))
        .and(path("/latest/dex/pairs/ethereum/0xPair"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&liquidity)
        .await;

    let svc = service_from_yaml(&test_utils::config_yaml(&explorer.uri(), &liquidity.uri()));
    let result = svc.get_liquidity().await.unwrap();
    assert_eq!(result.data.locked_usd_amount, 250_000);
    assert_eq!(result.data.provider_name, "dexscreener");
    assert_eq!(result.data.base_token_symbol.as_deref(), Some("PSALE"));
}
