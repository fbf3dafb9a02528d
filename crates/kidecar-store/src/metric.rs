//! HTTPMetric storage: values exported as Prometheus gauges

use crate::backend::{StorageBackend, StoreContext};
use crate::config::{StorageConfig, StorageType};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use prometheus::{Encoder, Gauge, Registry, TextEncoder};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Path the metric registry is served on
pub const METRICS_PATH: &str = "/metrics";

const GAUGE_HELP: &str = "Automatically generated metric from collected data";

/// Exports plugin results as gauges on a dedicated registry
#[derive(Default)]
pub struct MetricStore {
    state: OnceLock<MetricState>,
}

struct MetricState {
    registry: Registry,
    gauges: Mutex<HashMap<String, Gauge>>,
    local_addr: Option<SocketAddr>,
}

impl MetricStore {
    /// Create an uninitialized store
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<&MetricState> {
        self.state
            .get()
            .ok_or_else(|| StoreError::NotInitialized(StorageType::HttpMetric.to_string()))
    }

    /// Address the `/metrics` endpoint is bound to, once set up with a listener
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.get().and_then(|s| s.local_addr)
    }

    /// Current value of a gauge
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        let state = self.state.get()?;
        let gauges = state.gauges.lock();
        gauges.get(name).map(Gauge::get)
    }

    /// Number of gauges created so far
    pub fn gauge_count(&self) -> usize {
        self.state.get().map_or(0, |s| s.gauges.lock().len())
    }

    /// Registry contents in Prometheus text format
    pub fn render(&self) -> Result<String> {
        render_registry(&self.state()?.registry)
    }

    fn get_or_create_gauge(state: &MetricState, name: &str) -> Result<Gauge> {
        let mut gauges = state.gauges.lock();
        if let Some(gauge) = gauges.get(name) {
            return Ok(gauge.clone());
        }

        let gauge = Gauge::new(name, GAUGE_HELP)?;
        state.registry.register(Box::new(gauge.clone()))?;
        gauges.insert(name.to_string(), gauge.clone());
        info!(metric = name, "Gauge registered");
        Ok(gauge)
    }
}

impl fmt::Debug for MetricStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricStore")
            .field("initialized", &self.is_initialized())
            .field("gauges", &self.gauge_count())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

fn render_registry(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(StoreError::metric)
}

async fn metrics_handler(State(registry): State<Registry>) -> impl IntoResponse {
    match render_registry(&registry) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Router serving `registry` on [`METRICS_PATH`]
pub(crate) fn metrics_router(registry: Registry) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(registry)
}

#[async_trait]
impl StorageBackend for MetricStore {
    fn storage_type(&self) -> StorageType {
        StorageType::HttpMetric
    }

    fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    async fn setup(&self, ctx: &StoreContext) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let registry = Registry::new();
        let mut local_addr = None;

        if let Some(addr) = ctx.metrics_listen {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| StoreError::init_failed(StorageType::HttpMetric, format!("bind {addr}: {e}")))?;
            let bound = listener.local_addr().ok();
            local_addr = bound;

            let app = metrics_router(registry.clone());
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    error!(error = %e, "Metric server stopped");
                }
            });
            info!(addr = ?bound, path = METRICS_PATH, "Metric server listening");
        }

        let _ = self.state.set(MetricState {
            registry,
            gauges: Mutex::new(HashMap::new()),
            local_addr,
        });
        Ok(())
    }

    async fn store(&self, data: &str, config: &StorageConfig) -> Result<()> {
        let StorageConfig::HttpMetric { http_metric } = config else {
            return Err(StoreError::invalid_config(format!(
                "HTTPMetric storage cannot store {} config",
                config.storage_type()
            )));
        };
        let state = self.state()?;

        http_metric.validate()?;
        let value: f64 = data
            .trim()
            .parse()
            .map_err(|_| StoreError::NonNumericData(data.to_string()))?;

        Self::get_or_create_gauge(state, &http_metric.metric_name)?.set(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpMetricConfig;
    use crate::testing::RecordingClusterClient;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn metric_config(name: &str) -> StorageConfig {
        StorageConfig::HttpMetric {
            http_metric: HttpMetricConfig {
                metric_name: name.to_string(),
            },
        }
    }

    async fn ready_store() -> MetricStore {
        let store = MetricStore::new();
        let ctx = StoreContext::new(Arc::new(RecordingClusterClient::new()));
        store.setup(&ctx).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_store_requires_setup() {
        let store = MetricStore::new();
        let result = store.store("1", &metric_config("probe_ok")).await;
        assert!(matches!(result, Err(StoreError::NotInitialized(_))));
    }

    #[tokio::test]
    async fn test_repeated_store_keeps_one_gauge() {
        let store = ready_store().await;

        store.store("1.5", &metric_config("probe_latency")).await.unwrap();
        store.store(" 2.25 ", &metric_config("probe_latency")).await.unwrap();

        assert_eq!(store.gauge_count(), 1);
        assert_eq!(store.gauge_value("probe_latency"), Some(2.25));
        assert!(store.render().unwrap().contains("probe_latency 2.25"));
    }

    #[tokio::test]
    async fn test_non_numeric_data() {
        let store = ready_store().await;
        let result = store.store("Healthy", &metric_config("probe_latency")).await;
        assert!(matches!(result, Err(StoreError::NonNumericData(ref d)) if d == "Healthy"));
        assert_eq!(store.gauge_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_metric_name() {
        let store = ready_store().await;
        let result = store.store("1", &metric_config("probe-latency")).await;
        assert!(matches!(result, Err(StoreError::Metric(_))));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let registry = Registry::new();
        let gauge = Gauge::new("kidecar_probe_ok", GAUGE_HELP).unwrap();
        registry.register(Box::new(gauge.clone())).unwrap();
        gauge.set(1.0);

        let response = metrics_router(registry)
            .oneshot(Request::builder().uri(METRICS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("kidecar_probe_ok 1"));
    }

    #[tokio::test]
    async fn test_setup_binds_listener() {
        let store = MetricStore::new();
        let ctx = StoreContext::new(Arc::new(RecordingClusterClient::new()))
            .with_metrics_listen(SocketAddr::from(([127, 0, 0, 1], 0)));
        store.setup(&ctx).await.unwrap();

        let addr = store.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
