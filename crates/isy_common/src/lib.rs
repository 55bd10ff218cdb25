//! ISY Common - shared types for the tutor command center.
//!
//! Turn and trace models, argument normalization, chat transport (real and
//! scripted), tutor policy, and configuration shared by `isyd` and `isyctl`.

pub mod args;
pub mod config;
pub mod error;
pub mod llm;
pub mod policy;
pub mod trace;
pub mod turn;

pub use args::{normalize_args, ArgMap, ArgValue};
pub use config::Config;
pub use error::IsyError;
pub use llm::{ChatSession, ChatTransport, FunctionDecl, GeminiTransport, LlmError, ScriptedTransport};
pub use policy::{ConfirmationPolicy, TopicHint, TutorPolicy};
pub use trace::{
    ExecutionTrace, InvocationResult, InvocationStatus, TraceEntry, TracePhase, TraceStatus,
};
pub use turn::{ModelTurn, ToolCallRequest, ToolCallResult, TurnInput, TurnSegment, TurnShape};
