//! Fallback telemetry
//!
//! Sinks are fire-and-forget: emitting never fails and never blocks the
//! resolution that produced the event.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEventType {
    FallbackTriggered,
    FallbackDenied,
}

impl TelemetryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryEventType::FallbackTriggered => "fallback_triggered",
            TelemetryEventType::FallbackDenied => "fallback_denied",
        }
    }
}

/// One telemetry event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub event_type: TelemetryEventType,
    pub content_id: String,
    pub section_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TelemetryEvent {
    pub fn fallback_triggered(
        content_id: impl Into<String>,
        section_ref: impl Into<String>,
        cache_hit: bool,
        tokens_used: Option<u32>,
    ) -> Self {
        Self {
            event_type: TelemetryEventType::FallbackTriggered,
            content_id: content_id.into(),
            section_ref: section_ref.into(),
            cache_hit: Some(cache_hit),
            tokens_used,
            reason: None,
        }
    }

    pub fn fallback_denied(
        content_id: impl Into<String>,
        section_ref: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            event_type: TelemetryEventType::FallbackDenied,
            content_id: content_id.into(),
            section_ref: section_ref.into(),
            cache_hit: None,
            tokens_used: None,
            reason,
        }
    }
}

/// Destination for telemetry events
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Writes events as structured tracing records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        tracing::info!(
            target: "transferkit::telemetry",
            event_type = event.event_type.as_str(),
            content_id = %event.content_id,
            section_ref = %event.section_ref,
            cache_hit = ?event.cache_hit,
            tokens_used = ?event.tokens_used,
            reason = ?event.reason,
            "telemetry"
        );
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingTelemetrySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, event_type: TelemetryEventType) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl TelemetrySink for RecordingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Discards events
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: TelemetryEvent) {}
}
