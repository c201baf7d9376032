use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::{
    config::CatalogConfig,
    error::CatalogError,
    event::{CatalogFeature, SeismicEvent},
    filter::{FilterParams, QueryFilter, TimeWindowPolicy},
    telemetry::QuakeTelemetry,
};

/// Sends one catalog query and returns the decoded GeoJSON payload.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// Issues the query described by `params`.
    async fn query(&self, params: &[(&'static str, String)]) -> Result<Value, CatalogError>;
}

/// HTTPS transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpCatalogTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCatalogTransport {
    /// Builds a client from the catalog section.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|err| CatalogError::UpstreamUnavailable(format!("client setup: {err}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl CatalogTransport for HttpCatalogTransport {
    async fn query(&self, params: &[(&'static str, String)]) -> Result<Value, CatalogError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                let reason = if err.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {err}")
                };
                CatalogError::UpstreamUnavailable(reason)
            })?;
        let response = response
            .error_for_status()
            .map_err(|err| CatalogError::UpstreamUnavailable(format!("bad status: {err}")))?;
        response
            .json::<Value>()
            .await
            .map_err(|err| CatalogError::UpstreamUnavailable(format!("invalid json: {err}")))
    }
}

/// A feature left out of a fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFeature {
    /// Position in the upstream `features` array.
    pub index: usize,
    /// Identifier, when the feature had one.
    pub id: Option<String>,
    /// Why it was skipped.
    pub reason: String,
}

/// Normalized events plus the features that could not be normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Events in upstream order.
    pub events: Vec<SeismicEvent>,
    /// Malformed features.
    pub skipped: Vec<SkippedFeature>,
}

/// Turns filters into upstream queries and payloads into events.
///
/// Upstream order is preserved; nothing is re-sorted locally.
#[derive(Clone)]
pub struct QueryTranslator {
    transport: Arc<dyn CatalogTransport>,
    policy: TimeWindowPolicy,
    telemetry: Option<QuakeTelemetry>,
}

impl std::fmt::Debug for QueryTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryTranslator")
            .field("policy", &self.policy)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl QueryTranslator {
    /// Creates a translator over an arbitrary transport.
    #[must_use]
    pub fn new(
        transport: Arc<dyn CatalogTransport>,
        policy: TimeWindowPolicy,
        telemetry: Option<QuakeTelemetry>,
    ) -> Self {
        Self {
            transport,
            policy,
            telemetry,
        }
    }

    /// Creates a translator talking HTTPS to `config.base_url`.
    pub fn from_config(
        config: &CatalogConfig,
        telemetry: Option<QuakeTelemetry>,
    ) -> Result<Self, CatalogError> {
        let transport = HttpCatalogTransport::new(config)?;
        Ok(Self::new(
            Arc::new(transport),
            config.window_policy(),
            telemetry,
        ))
    }

    /// Policy applied by [`QueryTranslator::fetch_with`].
    #[must_use]
    pub const fn policy(&self) -> &TimeWindowPolicy {
        &self.policy
    }

    /// Validates raw parameters and fetches events.
    pub async fn fetch_with(&self, params: &FilterParams) -> Result<Vec<SeismicEvent>, CatalogError> {
        let filter = params.build(&self.policy)?;
        self.fetch(&filter).await
    }

    /// Fetches and normalizes events; malformed features are dropped.
    pub async fn fetch(&self, filter: &QueryFilter) -> Result<Vec<SeismicEvent>, CatalogError> {
        Ok(self.fetch_report(filter).await?.events)
    }

    /// Fetches and normalizes events, reporting which features were dropped.
    pub async fn fetch_report(&self, filter: &QueryFilter) -> Result<FetchReport, CatalogError> {
        let entries = self.raw_features(filter).await?;
        let mut report = FetchReport {
            events: Vec::with_capacity(entries.len()),
            skipped: Vec::new(),
        };
        for (index, entry) in entries.into_iter().enumerate() {
            let normalized = CatalogFeature::from_value(entry)
                .map_err(|defect| (None, defect))
                .and_then(|feature| {
                    feature
                        .to_event()
                        .map_err(|defect| (feature.id.clone(), defect))
                });
            match normalized {
                Ok(event) => report.events.push(event),
                Err((id, defect)) => report.skipped.push(SkippedFeature {
                    index,
                    id,
                    reason: defect.to_string(),
                }),
            }
        }
        for skipped in &report.skipped {
            self.log(
                LogLevel::Warn,
                "catalog.feature.skipped",
                json!({ "index": skipped.index, "id": skipped.id, "reason": skipped.reason }),
            );
        }
        if !report.skipped.is_empty() {
            self.event(
                "catalog.feature.skipped",
                json!({ "skipped": report.skipped.len() }),
            );
        }
        self.event(
            "catalog.fetch.completed",
            json!({ "events": report.events.len(), "skipped": report.skipped.len() }),
        );
        Ok(report)
    }

    /// Fetches raw features without normalization, for tolerant consumers.
    ///
    /// Entries that are not objects are dropped; everything else is kept as-is.
    pub async fn fetch_features(&self, filter: &QueryFilter) -> Result<Vec<CatalogFeature>, CatalogError> {
        let entries = self.raw_features(filter).await?;
        let mut features = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match CatalogFeature::from_value(entry) {
                Ok(feature) => features.push(feature),
                Err(defect) => self.log(
                    LogLevel::Warn,
                    "catalog.feature.skipped",
                    json!({ "index": index, "reason": defect.to_string() }),
                ),
            }
        }
        Ok(features)
    }

    async fn raw_features(&self, filter: &QueryFilter) -> Result<Vec<Value>, CatalogError> {
        let params = filter.to_params();
        self.log(
            LogLevel::Debug,
            "catalog.fetch.started",
            json!({ "params": params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>() }),
        );
        let payload = match self.transport.query(&params).await {
            Ok(payload) => payload,
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    "catalog.fetch.failed",
                    json!({ "error": err.to_string() }),
                );
                return Err(err);
            }
        };
        match payload {
            Value::Object(mut root) => match root.remove("features") {
                Some(Value::Array(features)) => Ok(features),
                Some(_) => Err(self.contract_violation("'features' is not an array")),
                None => Err(self.contract_violation("payload has no 'features'")),
            },
            _ => Err(self.contract_violation("payload is not an object")),
        }
    }

    fn contract_violation(&self, reason: &str) -> CatalogError {
        self.log(
            LogLevel::Error,
            "catalog.fetch.failed",
            json!({ "error": reason }),
        );
        CatalogError::UpstreamUnavailable(reason.to_string())
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(event_type, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct LoopbackTransport {
        payload: Result<Value, CatalogError>,
        seen: Mutex<Vec<Vec<(&'static str, String)>>>,
    }

    impl LoopbackTransport {
        fn new(payload: Result<Value, CatalogError>) -> Arc<Self> {
            Arc::new(Self {
                payload,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CatalogTransport for LoopbackTransport {
        async fn query(&self, params: &[(&'static str, String)]) -> Result<Value, CatalogError> {
            self.seen.lock().push(params.to_vec());
            self.payload.clone()
        }
    }

    fn feature(id: &str, mag: f64, lon: f64) -> Value {
        json!({
            "type": "Feature",
            "id": id,
            "properties": { "mag": mag, "time": 1_700_000_000_000_i64, "place": "somewhere" },
            "geometry": { "type": "Point", "coordinates": [lon, 36.0, 8.0] }
        })
    }

    fn translator(transport: Arc<LoopbackTransport>) -> QueryTranslator {
        QueryTranslator::new(transport, TimeWindowPolicy::default(), None)
    }

    #[tokio::test]
    async fn preserves_upstream_order_and_skips_malformed() {
        let payload = json!({
            "type": "FeatureCollection",
            "features": [
                feature("b", 5.0, -117.0),
                { "id": "broken", "properties": { "mag": 3.0, "time": 1 } },
                feature("a", 2.0, -118.0),
                42
            ]
        });
        let transport = LoopbackTransport::new(Ok(payload));
        let filter = FilterParams::default()
            .between("2024-01-01", "2024-01-02")
            .build(&TimeWindowPolicy::default())
            .unwrap();
        let report = translator(transport.clone())
            .fetch_report(&filter)
            .await
            .unwrap();

        let ids: Vec<_> = report.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].id.as_deref(), Some("broken"));
        assert_eq!(report.skipped[1].index, 3);

        let seen = transport.seen.lock();
        assert_eq!(seen[0][0], ("format", "geojson".to_string()));
    }

    #[tokio::test]
    async fn empty_features_is_a_valid_result() {
        let transport = LoopbackTransport::new(Ok(json!({ "features": [] })));
        let events = translator(transport)
            .fetch_with(&FilterParams::default())
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn missing_features_is_upstream_failure() {
        let transport = LoopbackTransport::new(Ok(json!({ "type": "FeatureCollection" })));
        let err = translator(transport)
            .fetch_with(&FilterParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UpstreamUnavailable(_)));

        let transport = LoopbackTransport::new(Ok(json!({ "features": {} })));
        let err = translator(transport)
            .fetch_with(&FilterParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let transport =
            LoopbackTransport::new(Err(CatalogError::UpstreamUnavailable("timed out".into())));
        let err = translator(transport)
            .fetch_with(&FilterParams::default())
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::UpstreamUnavailable("timed out".into()));
    }

    #[tokio::test]
    async fn invalid_filter_never_reaches_transport() {
        let transport = LoopbackTransport::new(Ok(json!({ "features": [] })));
        let params = FilterParams {
            starttime: Some("not-a-date".into()),
            ..FilterParams::default()
        };
        let err = translator(transport.clone())
            .fetch_with(&params)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidFilter(_)));
        assert!(transport.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn raw_features_keep_partial_records() {
        let transport = LoopbackTransport::new(Ok(json!({
            "features": [feature("a", 2.0, -118.0), { "id": "no-geometry" }, "junk"]
        })));
        let filter = FilterParams::default()
            .build(&TimeWindowPolicy::default())
            .unwrap();
        let features = translator(transport).fetch_features(&filter).await.unwrap();
        assert_eq!(features.len(), 2);
        assert!(features[1].geometry.is_none());
    }

    /// Serves one connection on loopback. `None` holds the connection open without replying.
    async fn one_shot_upstream(
        response: Option<&'static str>,
    ) -> (HttpCatalogTransport, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0_u8; 4096];
            let read = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..read]).into_owned();
            match response {
                Some(raw) => {
                    socket.write_all(raw.as_bytes()).await.unwrap();
                    socket.shutdown().await.unwrap();
                }
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
            request
        });
        let config = CatalogConfig {
            base_url: format!("http://{addr}/fdsnws/event/1/query"),
            timeout_ms: 100,
            ..CatalogConfig::default()
        };
        (HttpCatalogTransport::new(&config).unwrap(), server)
    }

    #[tokio::test]
    async fn http_timeout_is_upstream_unavailable() {
        let (transport, _server) = one_shot_upstream(None).await;

        let err = transport.query(&[("format", "geojson".into())]).await.unwrap_err();

        assert!(matches!(&err, CatalogError::UpstreamUnavailable(reason) if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn http_error_status_is_upstream_unavailable() {
        let (transport, server) = one_shot_upstream(Some(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        ))
        .await;

        let err = transport
            .query(&[("format", "geojson".into()), ("minmagnitude", "2.5".into())])
            .await
            .unwrap_err();

        assert!(matches!(&err, CatalogError::UpstreamUnavailable(reason) if reason.contains("500")));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /fdsnws/event/1/query?format=geojson&minmagnitude=2.5 "));
    }

    #[tokio::test]
    async fn http_non_json_body_is_upstream_unavailable() {
        let (transport, _server) = one_shot_upstream(Some(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 8\r\nconnection: close\r\n\r\nnot json",
        ))
        .await;

        let err = transport.query(&[("format", "geojson".into())]).await.unwrap_err();

        assert!(matches!(&err, CatalogError::UpstreamUnavailable(reason) if reason.contains("invalid json")));
    }
}
