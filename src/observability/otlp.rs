//! OTLP/JSON encoding of exported spans.
//!
//! Each exported batch becomes one self-contained document:
//!
//! ```json
//! {"resourceSpans":[{"resource":{"attributes":[...]},
//!   "scopeSpans":[{"scope":{"name":"tasklist"},"spans":[...]}]}]}
//! ```
//!
//! Span fields that identify task-list data (`item_id`, `revision`, `operation`, ...)
//! are exported under a `tasklist.` prefix so they group together in trace viewers.
//! Timing fields added by the tracing bridge are dropped; start and end times already
//! carry that information.

use opentelemetry::trace::{Event, SpanId, SpanKind, Status};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::resource::Resource;
use serde_json::{json, Value as Json};
use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

/// Span fields written by the store, query, service, and worker layers.
const DOMAIN_FIELDS: &[&str] = &[
    "item_id",
    "revision",
    "operation",
    "op",
    "count",
    "event_type",
    "from",
    "to",
];

/// Fields the tracing bridge adds to every span.
const DROPPED_FIELDS: &[&str] = &["busy_ns", "idle_ns", "thread.id", "thread.name"];

pub struct OtlpEncoder {
    resource: Json,
    scope: &'static str,
}

impl OtlpEncoder {
    pub fn new(resource: &Resource, scope: &'static str) -> Self {
        let attributes: Vec<Json> = resource
            .iter()
            .map(|(key, value)| attribute(key.as_str(), value))
            .collect();
        Self {
            resource: json!({ "attributes": attributes }),
            scope,
        }
    }

    pub fn encode_batch(&self, batch: &[SpanData]) -> Json {
        json!({
            "resourceSpans": [{
                "resource": self.resource,
                "scopeSpans": [{
                    "scope": { "name": self.scope },
                    "spans": batch.iter().map(span).collect::<Vec<_>>(),
                }],
            }],
        })
    }
}

impl std::fmt::Debug for OtlpEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtlpEncoder").field("scope", &self.scope).finish()
    }
}

fn span(data: &SpanData) -> Json {
    let context = &data.span_context;
    let parent = (data.parent_span_id != SpanId::INVALID)
        .then(|| format!("{:016x}", data.parent_span_id))
        .unwrap_or_default();

    json!({
        "traceId": format!("{:032x}", context.trace_id()),
        "spanId": format!("{:016x}", context.span_id()),
        "parentSpanId": parent,
        "name": data.name,
        "kind": kind_code(&data.span_kind),
        "startTimeUnixNano": unix_nanos(data.start_time),
        "endTimeUnixNano": unix_nanos(data.end_time),
        "attributes": span_attributes(&data.attributes),
        "events": data.events.iter().map(event).collect::<Vec<_>>(),
        "status": status(&data.status),
    })
}

fn event(event: &Event) -> Json {
    json!({
        "timeUnixNano": unix_nanos(event.timestamp),
        "name": event.name,
        "attributes": span_attributes(&event.attributes),
    })
}

fn span_attributes(attributes: &[KeyValue]) -> Vec<Json> {
    attributes
        .iter()
        .filter(|kv| !DROPPED_FIELDS.contains(&kv.key.as_str()))
        .map(|kv| attribute(&export_key(kv.key.as_str()), &kv.value))
        .collect()
}

/// Name a span field is exported under.
fn export_key(key: &str) -> Cow<'_, str> {
    if DOMAIN_FIELDS.contains(&key) {
        Cow::Owned(format!("tasklist.{key}"))
    } else {
        Cow::Borrowed(key)
    }
}

fn attribute(key: &str, value: &Value) -> Json {
    let value = match value {
        Value::Bool(b) => json!({ "boolValue": b }),
        // OTLP JSON carries 64-bit integers as strings.
        Value::I64(i) => json!({ "intValue": i.to_string() }),
        Value::F64(f) => json!({ "doubleValue": f }),
        Value::String(s) => json!({ "stringValue": s.as_str() }),
        Value::Array(_) => json!({ "stringValue": value.to_string() }),
    };
    json!({ "key": key, "value": value })
}

const fn kind_code(kind: &SpanKind) -> u8 {
    match kind {
        SpanKind::Internal => 1,
        SpanKind::Server => 2,
        SpanKind::Client => 3,
        SpanKind::Producer => 4,
        SpanKind::Consumer => 5,
    }
}

fn status(status: &Status) -> Json {
    match status {
        Status::Unset => json!({ "code": 0 }),
        Status::Ok => json!({ "code": 1 }),
        Status::Error { description } => json!({ "code": 2, "message": description }),
    }
}

fn unix_nanos(time: SystemTime) -> String {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos())
        .to_string()
}
