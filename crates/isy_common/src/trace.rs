//! Execution trace for one command invocation.
//!
//! The trace is the system's observability channel: an append-only,
//! chronologically ordered list of entries describing each orchestration
//! phase. It is returned verbatim to the caller so a UI can render the
//! timeline. Entries are never edited or removed once recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default character budget for result previews in trace entries.
pub const RESULT_PREVIEW_CHARS: usize = 100;

// ============================================================================
// Phases and statuses
// ============================================================================

/// Orchestration phase a trace entry belongs to. Serialized names are
/// wire-visible and rendered by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracePhase {
    Initialization,
    PromptAnalysis,
    Processing,
    FunctionDetection,
    FunctionExecution,
    FunctionResults,
    Completion,
    Error,
}

impl TracePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracePhase::Initialization => "initialization",
            TracePhase::PromptAnalysis => "prompt_analysis",
            TracePhase::Processing => "processing",
            TracePhase::FunctionDetection => "function_detection",
            TracePhase::FunctionExecution => "function_execution",
            TracePhase::FunctionResults => "function_results",
            TracePhase::Completion => "completion",
            TracePhase::Error => "error",
        }
    }
}

/// Outcome marker for a single trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Processing,
    Success,
    Error,
    Info,
}

impl TraceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStatus::Processing => "processing",
            TraceStatus::Success => "success",
            TraceStatus::Error => "error",
            TraceStatus::Info => "info",
        }
    }
}

// ============================================================================
// Entries and the trace itself
// ============================================================================

/// One immutable trace record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub phase: TracePhase,
    pub status: TraceStatus,
    pub message: String,
    #[serde(default = "empty_details")]
    pub details: Value,
}

fn empty_details() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Append-only log of one invocation's orchestration steps.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTrace {
    entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry with empty details, timestamped at call time.
    pub fn record(&mut self, phase: TracePhase, status: TraceStatus, message: impl Into<String>) {
        self.record_with_details(phase, status, message, empty_details());
    }

    /// Record an entry carrying structured details.
    pub fn record_with_details(
        &mut self,
        phase: TracePhase,
        status: TraceStatus,
        message: impl Into<String>,
        details: Value,
    ) {
        self.entries.push(TraceEntry {
            timestamp: Utc::now(),
            phase,
            status,
            message: message.into(),
            details,
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TraceEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<TraceEntry> {
        self.entries
    }
}

/// Truncate a result for trace readability. Counts Unicode scalar values,
/// not bytes: payloads are Vietnamese text. The full result still goes to
/// the model; only the trace carries the preview.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut shortened: String = text.chars().take(max_chars).collect();
        shortened.push_str("...");
        shortened
    } else {
        text.to_string()
    }
}

// ============================================================================
// Invocation result
// ============================================================================

/// Final status of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Success,
    Error,
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Success => "success",
            InvocationStatus::Error => "error",
        }
    }
}

/// The sole externally visible output of one invocation. Field names are
/// the wire names of the HTTP response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub response: String,
    pub logs: Vec<TraceEntry>,
    pub processing_time: f64,
    pub turns_processed: u32,
    pub status: InvocationStatus,
}

impl InvocationResult {
    pub fn success(
        response: impl Into<String>,
        trace: ExecutionTrace,
        elapsed: Duration,
        turns_processed: u32,
    ) -> Self {
        Self {
            response: response.into(),
            logs: trace.into_entries(),
            processing_time: elapsed.as_secs_f64(),
            turns_processed,
            status: InvocationStatus::Success,
        }
    }

    pub fn error(
        response: impl Into<String>,
        trace: ExecutionTrace,
        elapsed: Duration,
        turns_processed: u32,
    ) -> Self {
        Self {
            response: response.into(),
            logs: trace.into_entries(),
            processing_time: elapsed.as_secs_f64(),
            turns_processed,
            status: InvocationStatus::Error,
        }
    }
}
