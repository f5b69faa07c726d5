mod logging;
mod tracing;

use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Registry, layer::SubscriberExt};

pub use logging::JsonLogLayer;

pub struct InstrumentGuard {
    tracer_provider: SdkTracerProvider,
}

/// Installs JSON logging at `level` plus OpenTelemetry tracing for `service`, and returns a guard
/// that flushes spans when dropped.
pub fn init(service: &str, level: &str) -> anyhow::Result<InstrumentGuard> {
    let level: LevelFilter = level.parse()?;
    let provider = tracing::init_provider(service);

    let telemetry =
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service.to_owned()));

    let subscriber = Registry::default()
        .with(level)
        .with(telemetry)
        .with(JsonLogLayer);

    ::tracing::subscriber::set_global_default(subscriber)?;

    Ok(InstrumentGuard {
        tracer_provider: provider,
    })
}

impl Drop for InstrumentGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", err);
        }
    }
}
