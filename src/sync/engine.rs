//! Periodic rate sync cycle
//!
//! One cycle: read the configured pairs, issue one batched GET, parse the
//! payload, stamp every row with the cycle's normalized today, bulk-insert,
//! prune to the retention horizon, persist the status and completion time,
//! and hand the fresh rows to the alert evaluator. Network and parse failures
//! are recovered locally and surface only through the persisted status code.

use crate::config::{ConfigStore, SyncStatus};
use crate::db::models::NewRate;
use crate::db::resource::{days_before, today_normalized};
use crate::db::ForexDb;
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::sync::alert::AlertEvaluator;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default remote rate source
pub const DEFAULT_API_URL: &str = "https://free.currencyconverterapi.com/api/v7/convert";

/// Rows older than this many days are pruned after each successful cycle.
pub const RETENTION_DAYS: i64 = 40;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct SyncResponse {
    results: Option<HashMap<String, WireRate>>,
}

#[derive(Debug, Deserialize)]
struct WireRate {
    fr: String,
    to: String,
    val: f64,
}

/// Drives one fetch/parse/write/prune cycle against the remote rate source
pub struct SyncEngine {
    db: Arc<ForexDb>,
    config: Arc<ConfigStore>,
    events: EventBus,
    alert: AlertEvaluator,
    client: reqwest::Client,
    api_url: Url,
}

impl SyncEngine {
    pub fn new(
        db: Arc<ForexDb>,
        config: Arc<ConfigStore>,
        events: EventBus,
        api_url: Url,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let alert = AlertEvaluator::new(db.clone(), config.clone(), events.clone());

        Ok(Self {
            db,
            config,
            events,
            alert,
            client,
            api_url,
        })
    }

    /// Run one sync cycle, returning the status it ended with.
    ///
    /// Never fails: every failure path is logged, persisted as a status code
    /// and announced on the event bus. With no pairs configured the cycle
    /// ends immediately without a network call or a status change.
    pub async fn run_cycle(&self) -> SyncStatus {
        let pairs = self.config.sync_pairs();
        if pairs.is_empty() {
            tracing::debug!("No currency pairs configured, skipping sync cycle");
            return self.config.forex_status();
        }

        tracing::debug!("Starting sync cycle for {} pairs", pairs.len());
        let status = self.cycle(&pairs).await;

        if let Err(e) = self.config.set_forex_status(status) {
            tracing::error!("Failed to persist sync status: {e}");
        }
        self.events.publish(Event::DataUpdated { status });
        tracing::info!("Sync cycle finished: {status:?}");
        status
    }

    async fn cycle(&self, pairs: &[String]) -> SyncStatus {
        let body = match self.fetch(pairs).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Rate fetch failed: {e}");
                return SyncStatus::ServerDown;
            }
        };

        // One normalized date per cycle; every row is stamped with it.
        let today = today_normalized();
        let rows = match parse_payload(&body, pairs, today) {
            Ok(rows) => rows,
            Err(status) => return status,
        };

        let inserted = match self.db.bulk_insert_rates(&rows) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Bulk insert failed: {e}");
                return self.config.forex_status();
            }
        };

        if inserted > 0 {
            match self.db.delete_rates_before(days_before(today, RETENTION_DAYS)) {
                Ok(pruned) if pruned > 0 => tracing::debug!("Pruned {pruned} stale rate rows"),
                Ok(_) => {}
                Err(e) => tracing::warn!("Retention pruning failed: {e}"),
            }

            if let Err(e) = self.config.set_last_sync_millis(Utc::now().timestamp_millis()) {
                tracing::warn!("Failed to persist sync time: {e}");
            }

            if let Err(e) = self.alert.evaluate(&rows, today) {
                tracing::warn!("Alert evaluation failed: {e}");
            }
        }

        SyncStatus::Ok
    }

    async fn fetch(&self, pairs: &[String]) -> std::result::Result<String, reqwest::Error> {
        let mut url = self.api_url.clone();
        url.query_pairs_mut().append_pair("q", &pairs.join(","));

        let response = self.client.get(url).send().await?.error_for_status()?;
        response.text().await
    }
}

/// Parse the wire payload into rate rows stamped with `today`.
///
/// Malformed JSON is `ServerInvalid`; parseable JSON missing the `results`
/// field is `Invalid`; a requested pair absent from `results` is treated as a
/// fatal parse error (`ServerInvalid`).
fn parse_payload(
    body: &str,
    pairs: &[String],
    today: i64,
) -> std::result::Result<Vec<NewRate>, SyncStatus> {
    let response: SyncResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Malformed rate payload: {e}");
            return Err(SyncStatus::ServerInvalid);
        }
    };

    let results = match response.results {
        Some(r) => r,
        None => {
            tracing::warn!("Rate payload missing results field");
            return Err(SyncStatus::Invalid);
        }
    };

    let mut rows = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Some(quote) = results.get(pair) else {
            tracing::warn!("Requested pair {pair} absent from rate payload");
            return Err(SyncStatus::ServerInvalid);
        };
        rows.push(NewRate {
            from_code: quote.fr.clone(),
            to_code: quote.to.clone(),
            date: today,
            value: quote.val,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertConfig;
    use crate::db::models::{NewCurrency, QueryResult};
    use crate::db::resource::{RateResource, SortOrder};
    use crate::events::{AlertNotification, FluctuationDirection};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DAY: i64 = 24 * 60 * 60 * 1000;

    fn currency(code: &str) -> NewCurrency {
        NewCurrency {
            code: code.to_string(),
            name: code.to_string(),
            symbol: "$".to_string(),
            country_code: code[..2].to_string(),
            country_name: code.to_string(),
            country_flag_url: format!("https://flagcdn.com/w320/{}.png", &code[..2]),
        }
    }

    struct Harness {
        engine: SyncEngine,
        db: Arc<ForexDb>,
        config: Arc<ConfigStore>,
        events: EventBus,
        server: MockServer,
    }

    async fn harness(pairs: &[&str]) -> Harness {
        let events = EventBus::new();
        let db = Arc::new(ForexDb::open_in_memory(events.clone()).unwrap());
        db.insert_currency(&currency("USD")).unwrap();
        db.insert_currency(&currency("ZAR")).unwrap();
        db.insert_currency(&currency("EUR")).unwrap();

        let config = Arc::new(ConfigStore::in_memory());
        config
            .set_sync_pairs(&pairs.iter().map(|p| p.to_string()).collect::<Vec<_>>())
            .unwrap();

        let server = MockServer::start().await;
        let api_url = Url::parse(&format!("{}/api/v7/convert", server.uri())).unwrap();
        let engine =
            SyncEngine::new(db.clone(), config.clone(), events.clone(), api_url).unwrap();

        Harness {
            engine,
            db,
            config,
            events,
            server,
        }
    }

    fn drain_alerts(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<AlertNotification> {
        let mut alerts = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::Alert(n) = event {
                alerts.push(n);
            }
        }
        alerts
    }

    #[tokio::test]
    async fn successful_cycle_writes_and_persists_status() {
        let h = harness(&["USD_ZAR", "USD_EUR"]).await;
        Mock::given(method("GET"))
            .and(path("/api/v7/convert"))
            .and(query_param("q", "USD_ZAR,USD_EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"results":{"USD_ZAR":{"fr":"USD","to":"ZAR","val":14.1},"USD_EUR":{"fr":"USD","to":"EUR","val":0.92}}}"#,
            ))
            .expect(1)
            .mount(&h.server)
            .await;

        let status = h.engine.run_cycle().await;

        assert_eq!(status, SyncStatus::Ok);
        assert_eq!(h.config.forex_status(), SyncStatus::Ok);
        assert!(h.config.last_sync_millis().is_some());

        match h
            .db
            .query(&RateResource::Rates, SortOrder::Unsorted)
            .unwrap()
        {
            QueryResult::Rates(rows) => {
                assert_eq!(rows.len(), 2);
                assert!(rows.iter().all(|r| r.date == today_normalized()));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_server_down() {
        let h = harness(&["USD_ZAR"]).await;
        // Drop the mock server so the request has nowhere to go.
        let uri = h.server.uri();
        drop(h.server);

        let engine = SyncEngine::new(
            h.db.clone(),
            h.config.clone(),
            h.events.clone(),
            Url::parse(&format!("{uri}/api/v7/convert")).unwrap(),
        )
        .unwrap();

        let status = engine.run_cycle().await;
        assert_eq!(status, SyncStatus::ServerDown);
        assert_eq!(h.config.forex_status(), SyncStatus::ServerDown);
    }

    #[tokio::test]
    async fn http_error_status_is_server_down() {
        let h = harness(&["USD_ZAR"]).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&h.server)
            .await;

        assert_eq!(h.engine.run_cycle().await, SyncStatus::ServerDown);
    }

    #[tokio::test]
    async fn malformed_body_is_server_invalid() {
        let h = harness(&["USD_ZAR"]).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&h.server)
            .await;

        let status = h.engine.run_cycle().await;
        assert_eq!(status, SyncStatus::ServerInvalid);
        assert_eq!(h.config.forex_status(), SyncStatus::ServerInvalid);
    }

    #[tokio::test]
    async fn missing_results_field_is_invalid() {
        let h = harness(&["USD_ZAR"]).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"error":"quota"}"#))
            .mount(&h.server)
            .await;

        assert_eq!(h.engine.run_cycle().await, SyncStatus::Invalid);
    }

    #[tokio::test]
    async fn missing_requested_pair_is_server_invalid() {
        let h = harness(&["USD_ZAR", "USD_EUR"]).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"results":{"USD_ZAR":{"fr":"USD","to":"ZAR","val":14.1}}}"#,
            ))
            .mount(&h.server)
            .await;

        assert_eq!(h.engine.run_cycle().await, SyncStatus::ServerInvalid);
    }

    #[tokio::test]
    async fn empty_pair_set_skips_the_network() {
        let h = harness(&[]).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let status = h.engine.run_cycle().await;
        assert_eq!(status, SyncStatus::Unknown);
        assert_eq!(h.config.forex_status(), SyncStatus::Unknown);
    }

    #[tokio::test]
    async fn cycle_prunes_rows_past_the_retention_horizon() {
        let h = harness(&["USD_ZAR"]).await;
        let today = today_normalized();
        let horizon = days_before(today, RETENTION_DAYS);
        h.db.insert_rate(&NewRate {
            from_code: "USD".into(),
            to_code: "ZAR".into(),
            date: horizon - DAY,
            value: 13.0,
        })
        .unwrap();
        h.db.insert_rate(&NewRate {
            from_code: "USD".into(),
            to_code: "ZAR".into(),
            date: horizon,
            value: 13.5,
        })
        .unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"results":{"USD_ZAR":{"fr":"USD","to":"ZAR","val":14.1}}}"#,
            ))
            .mount(&h.server)
            .await;

        assert_eq!(h.engine.run_cycle().await, SyncStatus::Ok);

        match h
            .db
            .query(&RateResource::parse("rate/USD/ZAR").unwrap(), SortOrder::DateAsc)
            .unwrap()
        {
            QueryResult::PairRates(rows) => {
                // The row at exactly the horizon survives; older is pruned.
                let dates: Vec<i64> = rows.iter().map(|r| r.date).collect();
                assert_eq!(dates, vec![horizon, today]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cycle_hands_fresh_value_to_the_alert() {
        let h = harness(&["USD_ZAR"]).await;
        let today = today_normalized();
        h.config
            .set_alert(AlertConfig {
                enabled: true,
                from_code: "USD".into(),
                to_code: "ZAR".into(),
                period_days: 30,
                threshold: 5.0,
                notifications_enabled: true,
                rate_average: Some(15.0),
                average_day: Some(today),
            })
            .unwrap();
        let mut rx = h.events.subscribe();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"results":{"USD_ZAR":{"fr":"USD","to":"ZAR","val":14.1}}}"#,
            ))
            .mount(&h.server)
            .await;

        assert_eq!(h.engine.run_cycle().await, SyncStatus::Ok);

        let alerts = drain_alerts(&mut rx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].from_code, "USD");
        assert_eq!(alerts[0].to_code, "ZAR");
        assert_eq!(alerts[0].direction, FluctuationDirection::Negative);
        assert!((alerts[0].fluctuation - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_cycle_announces_its_status() {
        let h = harness(&["USD_ZAR"]).await;
        let mut rx = h.events.subscribe();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{"))
            .mount(&h.server)
            .await;

        h.engine.run_cycle().await;

        let mut saw_update = false;
        while let Ok(event) = rx.try_recv() {
            if let Event::DataUpdated { status } = event {
                assert_eq!(status, SyncStatus::ServerInvalid);
                saw_update = true;
            }
        }
        assert!(saw_update);
    }
}
