//! OpenTelemetry tracing with file-based OTLP export.
//!
//! ```text
//! tracing macros → tracing-opentelemetry → SDK provider → FileSpanExporter → tasklist-otlp.jsonl
//! ```
//!
//! Store writes, migrations, query refreshes, and undo timer firings all run inside
//! `tracing` spans. When tracing is initialized those spans are written as OTLP/JSON
//! lines to `<data_dir>/tasklist-otlp.jsonl`, rotated by size.
//!
//! Filter directives are chosen in this order:
//!
//! 1. the `TASKLIST_LOG` environment variable
//! 2. [`Config::trace_level`](crate::Config::trace_level)
//! 3. `"info"`
//!
//! Directives that do not parse fall back to `"info"`.
//!
//! ```no_run
//! use tasklist::observability::init_tracing;
//! use tasklist::Config;
//!
//! let config = Config {
//!     trace_level: Some("debug".to_string()),
//!     ..Default::default()
//! };
//! init_tracing(&config);
//!
//! tracing::debug!("tracing is now active");
//! ```

mod export;
mod otlp;
mod rotating;

pub use rotating::{RotatingWriter, RotationPolicy};

use crate::Config;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_sdk::resource::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name of the trace output inside the data directory.
pub const TRACE_FILE: &str = "tasklist-otlp.jsonl";

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "TASKLIST_LOG";

const SERVICE_NAME: &str = "tasklist";
const DEFAULT_LEVEL: &str = "info";

/// Installs the global tracing subscriber with file export.
///
/// Tracing is optional: if the data directory cannot be created, or another global
/// subscriber is already installed, this returns without doing anything.
pub fn init_tracing(config: &Config) {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env.as_deref(), config.trace_level.as_deref());

    let data_dir = config.data_dir();
    if std::fs::create_dir_all(&data_dir).is_err() {
        return;
    }

    let resource = Resource::new(vec![
        KeyValue::new("service.name", SERVICE_NAME),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new(
            "tasklist.schema_version",
            i64::from(crate::storage::schema::CURRENT_SCHEMA_VERSION),
        ),
    ]);
    let policy = RotationPolicy {
        max_bytes: config.trace_max_bytes,
        backups: config.trace_backups,
    };
    let provider =
        export::file_tracer_provider(data_dir.join(TRACE_FILE), policy, resource, SERVICE_NAME);

    let otel_layer = OpenTelemetryLayer::new(provider.tracer(SERVICE_NAME));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer);

    let _ = subscriber.try_init();
}

/// Filter from the first non-blank directive source, or the default level.
fn build_filter(env: Option<&str>, configured: Option<&str>) -> EnvFilter {
    let directives = [env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|d| !d.is_empty())
        .unwrap_or(DEFAULT_LEVEL);
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}
