//! Conversational turn model for the tool-use exchange.
//!
//! A model turn carries an ordered list of content segments, each either a
//! text fragment or a tool-call request. The orchestration loop classifies
//! each turn by shape: any tool call outranks text in the same turn, because
//! text alongside a tool call is commentary, not the final answer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Tool call request / result
// ============================================================================

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCallRequest {
    /// Build a request from a JSON object of arguments. Non-object values
    /// yield an empty argument map.
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Outcome of one tool invocation, fed back to the model as the next
/// turn input. Success and domain errors are both ordinary strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub name: String,
    pub payload: String,
}

impl ToolCallResult {
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

// ============================================================================
// Turn segments and classification
// ============================================================================

/// One content segment of a model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnSegment {
    Text(String),
    ToolCall(ToolCallRequest),
}

/// Shape of a turn, as seen by the orchestration loop.
///
/// `ToolCalls` wins over `Text` when a turn mixes both. Text segments that
/// are empty strings count as no text at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnShape {
    ToolCalls,
    Text,
    Empty,
}

/// One model turn: an ordered list of content segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub segments: Vec<TurnSegment>,
}

impl ModelTurn {
    pub fn new(segments: Vec<TurnSegment>) -> Self {
        Self { segments }
    }

    /// A turn holding a single text segment.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            segments: vec![TurnSegment::Text(text.into())],
        }
    }

    /// A turn holding the given tool-call requests, in order.
    pub fn with_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            segments: calls.into_iter().map(TurnSegment::ToolCall).collect(),
        }
    }

    /// A turn with no segments at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Classify this turn for the loop's branch decision.
    pub fn shape(&self) -> TurnShape {
        if self.tool_calls().next().is_some() {
            TurnShape::ToolCalls
        } else if self.text_segments().next().is_some() {
            TurnShape::Text
        } else {
            TurnShape::Empty
        }
    }

    /// Tool-call requests in received order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRequest> {
        self.segments.iter().filter_map(|s| match s {
            TurnSegment::ToolCall(call) => Some(call),
            TurnSegment::Text(_) => None,
        })
    }

    /// Non-empty text segments in received order.
    pub fn text_segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TurnSegment::Text(text) if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
    }

    /// Space-joined text of the turn, or `None` when there is none.
    pub fn joined_text(&self) -> Option<String> {
        let parts: Vec<&str> = self.text_segments().collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

// ============================================================================
// Turn input
// ============================================================================

/// What the caller sends into the conversation: the opening prompt, or all
/// tool results of one turn bundled as a single input.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    Prompt(String),
    ToolResults(Vec<ToolCallResult>),
}
