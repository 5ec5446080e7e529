//! Distributed trace propagation for the control plane.
//!
//! Every specialist call made for one job is stitched into a single causal
//! graph: the trace identifier is derived deterministically from the job id,
//! so redelivered executions (and the specialists themselves, which re-open
//! child spans from the propagated context) always attach to the same trace.
//!
//! The sink is optional. Without a configured endpoint every operation is a
//! no-op; a failing sink is logged and never fails a job.

mod truncate;

pub use truncate::truncate_for_trace;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Fixed namespace for deriving trace ids from job ids (UUIDv5).
const TRACE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xc9, 0x1f, 0x8a, 0x3d, 0x4e, 0x02, 0x9f, 0x54, 0x21, 0x77, 0x0e, 0xc4, 0xa1, 0x5c,
]);

/// Derive the deterministic trace id for a job. The same job id always maps
/// to the same trace id, across processes and across redeliveries.
pub fn trace_id_for_job(job_id: &str) -> String {
    Uuid::new_v5(&TRACE_NAMESPACE, job_id.as_bytes())
        .simple()
        .to_string()
}

/// Propagated trace context, passed by value in specialist requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub parent_span_id: String,
}

/// One emitted span.
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub name: String,
    pub level: SpanLevel,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanLevel {
    Default,
    Error,
}

/// Process-wide tracer handle. Holds the (optional) sink; per-job recording
/// goes through [`JobTrace`] handles created by [`Tracer::job_trace`].
pub struct Tracer {
    sink: Option<Sink>,
}

struct Sink {
    client: reqwest::Client,
    endpoint: String,
    auth_key: Option<String>,
}

impl Tracer {
    pub fn new(config: &crate::config::TraceConfig) -> Self {
        let sink = config.endpoint.as_ref().map(|endpoint| Sink {
            client: reqwest::Client::new(),
            endpoint: endpoint.clone(),
            auth_key: config.auth_key.clone(),
        });

        if sink.is_none() {
            debug!("Trace sink not configured, tracing is a no-op");
        }

        Self { sink }
    }

    /// A tracer with no sink; every operation is a no-op.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Open a per-job trace with a root span named after the caller's role.
    pub fn job_trace(&self, job_id: &str, root_name: &str, metadata: Value) -> JobTrace {
        if self.sink.is_none() {
            return JobTrace::noop();
        }

        let trace_id = trace_id_for_job(job_id);
        let root_span_id = new_span_id();
        debug!(%trace_id, job_id, "Trace opened");

        JobTrace {
            enabled: true,
            trace_id,
            root_span_id,
            root_name: root_name.to_string(),
            root_metadata: metadata,
            root_level: Mutex::new(SpanLevel::Default),
            started_at: Utc::now(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Flush a finished job trace to the sink, synchronously. Sink failures
    /// are logged and swallowed; the control plane never fails a job over
    /// the trace sink.
    pub async fn flush(&self, trace: JobTrace) {
        let Some(sink) = &self.sink else {
            return;
        };
        if !trace.enabled {
            return;
        }

        let spans = trace.into_spans();
        let count = spans.len();
        let body = serde_json::json!({ "spans": spans });

        let mut request = sink.client.post(&sink.endpoint).json(&body);
        if let Some(key) = &sink.auth_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(count, "Trace spans flushed");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Trace sink rejected span batch");
            }
            Err(e) => {
                warn!(error = %e, "Failed to flush trace spans");
            }
        }
    }
}

/// Recording handle for one job's trace. Spans are buffered in memory and
/// posted in one batch by [`Tracer::flush`] before the handler exits.
pub struct JobTrace {
    enabled: bool,
    trace_id: String,
    root_span_id: String,
    root_name: String,
    root_metadata: Value,
    root_level: Mutex<SpanLevel>,
    started_at: DateTime<Utc>,
    buffer: Mutex<Vec<Span>>,
}

impl JobTrace {
    fn noop() -> Self {
        Self {
            enabled: false,
            trace_id: String::new(),
            root_span_id: String::new(),
            root_name: String::new(),
            root_metadata: Value::Null,
            root_level: Mutex::new(SpanLevel::Default),
            started_at: Utc::now(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Context to propagate to specialist invocations. `None` when tracing
    /// is disabled.
    pub fn context(&self) -> Option<TraceContext> {
        if !self.enabled {
            return None;
        }
        Some(TraceContext {
            trace_id: self.trace_id.clone(),
            parent_span_id: self.root_span_id.clone(),
        })
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.enabled.then_some(self.trace_id.as_str())
    }

    /// Record a specialist invocation as a child span of the root.
    pub fn record_invocation(
        &self,
        specialist: &str,
        started_at: DateTime<Utc>,
        input: &Value,
        output: Option<&Value>,
        error: Option<&str>,
    ) {
        if !self.enabled {
            return;
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("specialist".to_string(), Value::String(specialist.to_string()));
        metadata.insert("success".to_string(), Value::Bool(error.is_none()));
        if let Some(error) = error {
            metadata.insert("error".to_string(), Value::String(error.to_string()));
        }

        self.push(Span {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id(),
            parent_span_id: Some(self.root_span_id.clone()),
            name: format!("invoke-{specialist}"),
            level: if error.is_some() { SpanLevel::Error } else { SpanLevel::Default },
            started_at,
            ended_at: Utc::now(),
            metadata: truncate_for_trace(&Value::Object(metadata)),
            input: Some(truncate_for_trace(input)),
            output: output.map(truncate_for_trace),
        });

        if error.is_some() {
            *self.root_level.lock().unwrap() = SpanLevel::Error;
        }
    }

    /// Record a job-store write as a child span of the root.
    pub fn record_store_write(&self, operation: &str, success: bool) {
        if !self.enabled {
            return;
        }

        let now = Utc::now();
        self.push(Span {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id(),
            parent_span_id: Some(self.root_span_id.clone()),
            name: format!("store-{operation}"),
            level: if success { SpanLevel::Default } else { SpanLevel::Error },
            started_at: now,
            ended_at: now,
            metadata: serde_json::json!({ "operation": operation, "success": success }),
            input: None,
            output: None,
        });
    }

    fn push(&self, span: Span) {
        self.buffer.lock().unwrap().push(span);
    }

    /// Close the root span and drain the buffer, root first.
    fn into_spans(self) -> Vec<Span> {
        let root = Span {
            trace_id: self.trace_id.clone(),
            span_id: self.root_span_id.clone(),
            parent_span_id: None,
            name: self.root_name,
            level: *self.root_level.lock().unwrap(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            metadata: truncate_for_trace(&self.root_metadata),
            input: None,
            output: None,
        };

        let mut spans = vec![root];
        spans.extend(self.buffer.into_inner().unwrap());
        spans
    }
}

fn new_span_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_id_is_deterministic() {
        let a = trace_id_for_job("job-123");
        let b = trace_id_for_job("job-123");
        let c = trace_id_for_job("job-456");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_disabled_tracer_is_noop() {
        let tracer = Tracer::disabled();
        let trace = tracer.job_trace("job-1", "orchestrator", json!({}));

        assert!(trace.context().is_none());
        assert!(trace.trace_id().is_none());
        trace.record_invocation("extractor", Utc::now(), &json!({}), None, None);
        assert!(trace.buffer.lock().unwrap().is_empty());
    }

    #[test]
    fn test_spans_share_trace_id() {
        let tracer = Tracer::new(&crate::config::TraceConfig {
            endpoint: Some("http://localhost:3000/api/spans".to_string()),
            auth_key: None,
        });

        let trace = tracer.job_trace("job-1", "orchestrator", json!({"kind": "cv_parse"}));
        let ctx = trace.context().unwrap();
        assert_eq!(ctx.trace_id, trace_id_for_job("job-1"));

        trace.record_invocation("extractor", Utc::now(), &json!({"type": "cv"}), None, None);
        trace.record_store_write("update_payload:extractor_payload", true);

        let spans = trace.into_spans();
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| s.trace_id == ctx.trace_id));

        // Root has no parent; every child hangs under the root
        assert!(spans[0].parent_span_id.is_none());
        assert!(spans[1..]
            .iter()
            .all(|s| s.parent_span_id.as_deref() == Some(spans[0].span_id.as_str())));
    }

    #[test]
    fn test_long_error_marker_truncated_in_metadata() {
        let tracer = Tracer::new(&crate::config::TraceConfig {
            endpoint: Some("http://localhost:3000/api/spans".to_string()),
            auth_key: None,
        });

        let trace = tracer.job_trace("job-1", "orchestrator", json!({}));
        let long_error = "x".repeat(5000);
        trace.record_invocation("analyzer", Utc::now(), &json!({}), None, Some(long_error.as_str()));

        let spans = trace.into_spans();
        let recorded = spans[1].metadata["error"].as_str().unwrap();
        assert!(recorded.ends_with("… [truncated, total 5000 chars]"));
        assert!(recorded.chars().count() < 5000);
    }

    #[test]
    fn test_failed_invocation_marks_root_error() {
        let tracer = Tracer::new(&crate::config::TraceConfig {
            endpoint: Some("http://localhost:3000/api/spans".to_string()),
            auth_key: None,
        });

        let trace = tracer.job_trace("job-1", "orchestrator", json!({}));
        trace.record_invocation("analyzer", Utc::now(), &json!({}), None, Some("rate limited"));

        let spans = trace.into_spans();
        assert_eq!(spans[0].level, SpanLevel::Error);
        assert_eq!(spans[1].level, SpanLevel::Error);
        assert_eq!(spans[1].metadata["error"], "rate limited");
    }
}
