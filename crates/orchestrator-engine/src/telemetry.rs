//! Per-mandate telemetry: an append-only trace plus typed aggregate
//! counters, finalized into a summary when the engine exits.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceEvent {
    pub ts: chrono::DateTime<chrono::Utc>,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Append-only JSONL writer. A single sequenced writer per task; readers
/// take a snapshot, never the live buffer.
pub struct TraceRecorder {
    events: Mutex<Vec<TraceEvent>>,
    file: Option<Mutex<std::fs::File>>,
}

impl TraceRecorder {
    pub fn in_memory() -> Self {
        Self { events: Mutex::new(Vec::new()), file: None }
    }

    pub fn to_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { events: Mutex::new(Vec::new()), file: Some(Mutex::new(file)) })
    }

    pub fn record(&self, event: impl Into<String>, payload: serde_json::Value) {
        let entry = TraceEvent { ts: chrono::Utc::now(), event: event.into(), payload };
        if let Some(file) = &self.file {
            if let Ok(line) = serde_json::to_string(&entry) {
                if let Ok(mut f) = file.lock() {
                    let _ = writeln!(f, "{line}");
                }
            }
        }
        self.events.lock().unwrap().push(entry);
    }

    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub ticks: u32,
    pub documents_seen: u32,
    pub chroma_stores: u32,
    pub chroma_retrieves: u32,
    pub llm_calls: u32,
    pub llm_input_tokens: u64,
    pub llm_output_tokens: u64,
    pub event_count: usize,
}

/// Per-correlation-id telemetry session. Wraps an optional [`TraceRecorder`]
/// so a worker can run without one (e.g. in tests) without special-casing
/// every call site.
pub struct TelemetrySession {
    correlation_id: String,
    recorder: Option<TraceRecorder>,
    summary: Mutex<TelemetrySummary>,
}

impl TelemetrySession {
    pub fn new(correlation_id: impl Into<String>, recorder: Option<TraceRecorder>) -> Self {
        Self { correlation_id: correlation_id.into(), recorder, summary: Mutex::new(TelemetrySummary::default()) }
    }

    pub fn disabled(correlation_id: impl Into<String>) -> Self {
        Self::new(correlation_id, None)
    }

    fn emit(&self, event: &str, payload: serde_json::Value) {
        if let Some(r) = &self.recorder {
            r.record(event, payload);
        }
        self.summary.lock().unwrap().event_count += 1;
    }

    pub fn record_event(&self, name: &str, payload: serde_json::Value) {
        self.emit(name, payload);
    }

    pub fn record_timing(&self, label: &str, duration_ms: u64) {
        self.emit("timing", serde_json::json!({ "label": label, "duration_ms": duration_ms }));
    }

    pub fn record_document_seen(&self, url: &str) {
        self.summary.lock().unwrap().documents_seen += 1;
        self.emit("document_seen", serde_json::json!({ "url": url }));
    }

    pub fn record_chroma_store(&self, count: usize) {
        self.summary.lock().unwrap().chroma_stores += count as u32;
        self.emit("chroma_store", serde_json::json!({ "count": count }));
    }

    pub fn record_chroma_retrieve(&self, query: &str, count: usize) {
        self.summary.lock().unwrap().chroma_retrieves += 1;
        self.emit("chroma_retrieve", serde_json::json!({ "query": query, "count": count }));
    }

    pub fn record_llm_usage(&self, input_tokens: u32, output_tokens: u32) {
        {
            let mut s = self.summary.lock().unwrap();
            s.llm_calls += 1;
            s.llm_input_tokens += input_tokens as u64;
            s.llm_output_tokens += output_tokens as u64;
        }
        self.emit("llm_usage", serde_json::json!({ "input_tokens": input_tokens, "output_tokens": output_tokens }));
    }

    pub fn record_tick(&self, tick: u32) {
        self.summary.lock().unwrap().ticks = tick;
        self.emit("tick", serde_json::json!({ "tick": tick }));
    }

    pub fn summary(&self) -> TelemetrySummary {
        self.summary.lock().unwrap().clone()
    }

    pub fn finish(&self) -> TelemetrySummary {
        let summary = self.summary();
        self.emit("summary", serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null));
        tracing::info!(correlation_id = %self.correlation_id, ?summary, "telemetry session finished");
        summary
    }
}
