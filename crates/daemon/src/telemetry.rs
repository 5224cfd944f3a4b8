//! OpenTelemetry export (cargo feature `telemetry`)
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name (default: doctrans-worker)
//!
//! The layer is built before the subscriber exists, so the outcome is
//! returned as a [`TelemetryStatus`] and logged by the caller afterwards.

use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryStatus {
    /// `OTEL_EXPORTER_OTLP_ENDPOINT` not set
    NotConfigured,
    /// Endpoint set but the binary was built without the feature
    NotCompiled,
    Enabled { endpoint: String, service: String },
    Failed(String),
}

impl TelemetryStatus {
    pub fn log(&self) {
        match self {
            Self::NotConfigured => tracing::debug!("OpenTelemetry not configured"),
            Self::NotCompiled => tracing::warn!(
                "OTEL_EXPORTER_OTLP_ENDPOINT set but feature 'telemetry' not enabled; rebuild with --features telemetry"
            ),
            Self::Enabled { endpoint, service } => {
                tracing::info!(endpoint = %endpoint, service_name = %service, "OpenTelemetry export enabled")
            }
            Self::Failed(e) => {
                tracing::warn!(error = %e, "Failed to initialize OpenTelemetry (continuing without it)")
            }
        }
    }
}

pub fn otel_layer<S>() -> (Option<BoxedLayer<S>>, TelemetryStatus)
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
{
    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return (None, TelemetryStatus::NotConfigured);
    };
    build_layer(endpoint)
}

#[cfg(not(feature = "telemetry"))]
fn build_layer<S>(_endpoint: String) -> (Option<BoxedLayer<S>>, TelemetryStatus)
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
{
    (None, TelemetryStatus::NotCompiled)
}

#[cfg(feature = "telemetry")]
fn build_layer<S>(endpoint: String) -> (Option<BoxedLayer<S>>, TelemetryStatus)
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
{
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let service =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "doctrans-worker".to_string());

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => return (None, TelemetryStatus::Failed(e.to_string())),
    };

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new("service.name", service.clone())]))
        .build();
    let tracer = provider.tracer(service.clone());
    opentelemetry::global::set_tracer_provider(provider);

    let layer = tracing_opentelemetry::layer().with_tracer(tracer).boxed();
    (Some(layer), TelemetryStatus::Enabled { endpoint, service })
}

/// Flush pending spans
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
