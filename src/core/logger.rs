//! Logging infrastructure
//!
//! Installs the process-wide tracing subscriber once at startup; after that
//! it is treated as immutable. Development writes pretty lines to stdout.
//! Production writes JSON to stdout and exports spans over OTLP to the
//! configured collector endpoint.

use anyhow::Result;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace as sdktrace};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::config::LoggerConfig;

/// Initializes the global logger. Must be called exactly once, before any
/// other component starts logging.
pub fn init(config: &LoggerConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if config.is_production {
        // install_batch() registers the provider globally so shutdown() can
        // flush the batch exporter.
        let tracer = build_tracer_provider(config)?;

        let console_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true);

        registry
            .with(console_layer)
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .init();
    } else {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        registry.with(console_layer).init();
    }

    Ok(())
}

fn build_tracer_provider(config: &LoggerConfig) -> Result<sdktrace::Tracer> {
    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        config.service_name.clone(),
    )]);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(config.endpoint.clone()),
        )
        .with_trace_config(sdktrace::Config::default().with_resource(resource))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracer)
}

/// Flushes pending telemetry. Called once during shutdown.
pub fn shutdown() {
    global::shutdown_tracer_provider();
}
