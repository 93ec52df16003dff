//! # OpenTelemetry helpers

mod request;

use std::borrow::Cow;
use std::time::Duration;

use error_stack::{Result, ResultExt};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, InstrumentationScope};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithTonicConfig};
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader};
use opentelemetry_sdk::resource::{ResourceDetector, SdkProvidedResourceDetector};
use opentelemetry_sdk::trace::TracerProvider;
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tracing::Subscriber;
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{prelude::*, registry::LookupSpan, EnvFilter, Layer};

pub use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
pub use opentelemetry::{Key, KeyValue};
pub use tracing_opentelemetry::OpenTelemetrySpanExt;

pub use self::request::{RecordRequest, RecordedRequest, RequestMetrics};

const OTEL_SDK_DISABLED: &str = "OTEL_SDK_DISABLED";

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug)]
pub struct OpenTelemetryInitError;
impl error_stack::Context for OpenTelemetryInitError {}

impl std::fmt::Display for OpenTelemetryInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("failed to initialize opentelemetry")
    }
}

/// Options used when exporting traces and metrics.
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions {
    /// Token sent as bearer authorization to the OTLP collector.
    pub token: Option<String>,
}

pub fn meter(name: &'static str) -> Meter {
    global::meter(name)
}

/// Initialize OpenTelemetry.
///
/// This function initializes the OpenTelemetry SDK and sets up the tracing and metrics layers.
/// It should be called once during the application startup.
///
/// ```rs
/// use geo_observability::{init_opentelemetry, TelemetryOptions};
///
/// init_opentelemetry(
///     env!("CARGO_PKG_NAME"),
///     env!("CARGO_PKG_VERSION"),
///     TelemetryOptions::default(),
/// )
/// .unwrap();
/// ```
pub fn init_opentelemetry(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
    options: TelemetryOptions,
) -> Result<(), OpenTelemetryInitError> {
    // Exports stay off unless OTEL_SDK_DISABLED is explicitly set to something other than true.
    let sdk_disabled = std::env::var(OTEL_SDK_DISABLED)
        .map(|v| v == "true")
        .unwrap_or(true);

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    let mut layers = vec![stdout()];

    if !sdk_disabled {
        let otel_layer = otel(package_name, package_version, &options)?;
        layers.push(otel_layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .change_context(OpenTelemetryInitError)
        .attach_printable("failed to install global tracing subscriber")?;

    Ok(())
}

fn otel<S>(
    package_name: impl Into<Cow<'static, str>>,
    version: impl Into<Cow<'static, str>>,
    options: &TelemetryOptions,
) -> Result<BoxedLayer<S>, OpenTelemetryInitError>
where
    S: Subscriber + Send + Sync,
    for<'a> S: LookupSpan<'a>,
{
    let package_name = package_name.into();
    let version = version.into();

    // filter traces by crate/level
    let otel_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"));

    let metadata = exporter_metadata(options)?;

    let resource = SdkProvidedResourceDetector.detect(Duration::from_secs(1));
    let instrumentation_scope = InstrumentationScope::builder(package_name)
        .with_version(version)
        .build();

    let span_exporter = SpanExporter::builder()
        .with_tonic()
        .with_metadata(metadata.clone())
        .build()
        .change_context(OpenTelemetryInitError)
        .attach_printable("failed to create span exporter")?;

    let trace_provider = TracerProvider::builder()
        .with_resource(resource.clone())
        .with_batch_exporter(span_exporter, opentelemetry_sdk::runtime::Tokio)
        .build();

    let tracer = trace_provider.tracer_with_scope(instrumentation_scope);

    let metrics_exporter = MetricExporter::builder()
        .with_tonic()
        .with_metadata(metadata)
        .build()
        .change_context(OpenTelemetryInitError)
        .attach_printable("failed to create metrics exporter")?;

    let metrics_reader =
        PeriodicReader::builder(metrics_exporter, opentelemetry_sdk::runtime::Tokio)
            .with_interval(Duration::from_secs(10))
            .build();

    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource)
        .with_reader(metrics_reader)
        .build();

    global::set_meter_provider(meter_provider.clone());

    // export traces and metrics to otel
    let otel_trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let otel_metrics_layer = MetricsLayer::new(meter_provider);
    let otel_layer = otel_trace_layer
        .and_then(otel_metrics_layer)
        .and_then(otel_env_filter)
        .boxed();

    Ok(otel_layer)
}

fn exporter_metadata(options: &TelemetryOptions) -> Result<MetadataMap, OpenTelemetryInitError> {
    let mut metadata = MetadataMap::new();
    if let Some(token) = &options.token {
        let value = format!("Bearer {token}")
            .parse::<MetadataValue<Ascii>>()
            .change_context(OpenTelemetryInitError)
            .attach_printable("telemetry token is not a valid header value")?;
        metadata.insert("authorization", value);
    }
    Ok(metadata)
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let log_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"));

    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(log_env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .compact()
            .with_filter(log_env_filter)
            .boxed()
    }
}
