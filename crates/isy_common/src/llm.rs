//! Chat transport for the model's function-calling API.
//!
//! `ChatTransport` opens one session per invocation; a `ChatSession` owns
//! that conversation's history. `GeminiTransport` speaks the
//! `generateContent` wire protocol; `ScriptedTransport` replays queued
//! turns for deterministic tests, recording everything sent to it.

use crate::config::LlmConfig;
use crate::turn::{ModelTurn, ToolCallRequest, ToolCallResult, TurnInput, TurnSegment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API key missing: set llm.api_key or ISY_API_KEY")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty response from model")]
    EmptyResponse,
}

// ============================================================================
// Tool declarations
// ============================================================================

/// One declared tool: name, description, and a JSON-schema-like parameter
/// object, serialized verbatim onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

// ============================================================================
// Transport traits
// ============================================================================

/// One conversation with the model. Sessions are single-owner and live for
/// exactly one invocation of the orchestration loop.
#[async_trait]
pub trait ChatSession: Send {
    async fn send(&mut self, input: TurnInput) -> Result<ModelTurn, LlmError>;
}

/// Factory for chat sessions, carrying the connection configuration.
pub trait ChatTransport: Send + Sync {
    fn open_chat(&self, system_prompt: &str, tools: &[FunctionDecl]) -> Box<dyn ChatSession>;
}

// ============================================================================
// Wire types (generateContent)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Content],
    tools: &'a [ToolDecls],
    system_instruction: &'a SystemInstruction,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDecls {
    function_declarations: Vec<FunctionDecl>,
}

#[derive(Debug, Clone, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Map a turn input onto its wire content.
fn encode_input(input: &TurnInput) -> Content {
    match input {
        TurnInput::Prompt(text) => Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: Some(text.clone()),
                ..Part::default()
            }],
        },
        TurnInput::ToolResults(results) => Content {
            role: "function".to_string(),
            parts: results
                .iter()
                .map(|r| Part {
                    function_response: Some(FunctionResponse {
                        name: r.name.clone(),
                        response: json!({ "result": r.payload }),
                    }),
                    ..Part::default()
                })
                .collect(),
        },
    }
}

/// Map a wire response onto a model turn. Parts that are neither text nor
/// a function call are dropped; a turn can legitimately end up empty.
fn decode_turn(response: GenerateResponse) -> Result<(Content, ModelTurn), LlmError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;
    let content = candidate
        .content
        .ok_or_else(|| LlmError::InvalidResponse("candidate without content".to_string()))?;

    let segments = content
        .parts
        .iter()
        .filter_map(|part| {
            if let Some(call) = &part.function_call {
                Some(TurnSegment::ToolCall(ToolCallRequest {
                    name: call.name.clone(),
                    args: call.args.clone(),
                }))
            } else {
                part.text.clone().map(TurnSegment::Text)
            }
        })
        .collect();

    Ok((content, ModelTurn::new(segments)))
}

// ============================================================================
// Gemini transport (production)
// ============================================================================

pub struct GeminiTransport {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiTransport {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
        })
    }
}

impl ChatTransport for GeminiTransport {
    fn open_chat(&self, system_prompt: &str, tools: &[FunctionDecl]) -> Box<dyn ChatSession> {
        Box::new(GeminiChat {
            client: self.client.clone(),
            url: format!("{}/models/{}:generateContent", self.endpoint, self.model),
            api_key: self.api_key.clone(),
            system: SystemInstruction {
                parts: vec![Part {
                    text: Some(system_prompt.to_string()),
                    ..Part::default()
                }],
            },
            tools: vec![ToolDecls {
                function_declarations: tools.to_vec(),
            }],
            history: Vec::new(),
        })
    }
}

/// One conversation over the stateless wire protocol: the full history is
/// resent with every call.
struct GeminiChat {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    system: SystemInstruction,
    tools: Vec<ToolDecls>,
    history: Vec<Content>,
}

#[async_trait]
impl ChatSession for GeminiChat {
    async fn send(&mut self, input: TurnInput) -> Result<ModelTurn, LlmError> {
        let key = self.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;
        self.history.push(encode_input(&input));

        let request = GenerateRequest {
            contents: &self.history,
            tools: &self.tools,
            system_instruction: &self.system,
        };

        let response = self
            .client
            .post(format!("{}?key={}", self.url, key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http(format!("{}: {}", status, body)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let (content, turn) = decode_turn(parsed)?;
        self.history.push(content);
        Ok(turn)
    }
}

// ============================================================================
// Scripted transport (testing)
// ============================================================================

/// Deterministic transport for tests: replays a queue of turns and records
/// every input sent to it. When one scripted turn remains it repeats, so a
/// short script can drive an arbitrarily long loop.
pub struct ScriptedTransport {
    script: Arc<Mutex<Vec<Result<ModelTurn, LlmError>>>>,
    sent: Arc<Mutex<Vec<TurnInput>>>,
    last_system_prompt: Arc<Mutex<Option<String>>>,
    declared_tools: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<ModelTurn, LlmError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            sent: Arc::new(Mutex::new(Vec::new())),
            last_system_prompt: Arc::new(Mutex::new(None)),
            declared_tools: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script of plain turns, no failures.
    pub fn from_turns(turns: Vec<ModelTurn>) -> Self {
        Self::new(turns.into_iter().map(Ok).collect())
    }

    /// Everything sent through any session of this transport, in order.
    pub fn sent_inputs(&self) -> Vec<TurnInput> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Tool results carried by the nth send, if that send was a result batch.
    pub fn tool_results_of_send(&self, index: usize) -> Option<Vec<ToolCallResult>> {
        match self.sent.lock().unwrap().get(index) {
            Some(TurnInput::ToolResults(results)) => Some(results.clone()),
            _ => None,
        }
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.last_system_prompt.lock().unwrap().clone()
    }

    pub fn declared_tool_names(&self) -> Vec<String> {
        self.declared_tools.lock().unwrap().clone()
    }
}

impl ChatTransport for ScriptedTransport {
    fn open_chat(&self, system_prompt: &str, tools: &[FunctionDecl]) -> Box<dyn ChatSession> {
        *self.last_system_prompt.lock().unwrap() = Some(system_prompt.to_string());
        *self.declared_tools.lock().unwrap() = tools.iter().map(|t| t.name.clone()).collect();
        Box::new(ScriptedChat {
            script: Arc::clone(&self.script),
            sent: Arc::clone(&self.sent),
        })
    }
}

struct ScriptedChat {
    script: Arc<Mutex<Vec<Result<ModelTurn, LlmError>>>>,
    sent: Arc<Mutex<Vec<TurnInput>>>,
}

#[async_trait]
impl ChatSession for ScriptedChat {
    async fn send(&mut self, input: TurnInput) -> Result<ModelTurn, LlmError> {
        self.sent.lock().unwrap().push(input);

        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        if script.len() == 1 {
            // keep replaying the final scripted turn
            return clone_scripted(&script[0]);
        }
        script.remove(0)
    }
}

fn clone_scripted(entry: &Result<ModelTurn, LlmError>) -> Result<ModelTurn, LlmError> {
    match entry {
        Ok(turn) => Ok(turn.clone()),
        Err(LlmError::MissingApiKey) => Err(LlmError::MissingApiKey),
        Err(LlmError::Http(s)) => Err(LlmError::Http(s.clone())),
        Err(LlmError::InvalidResponse(s)) => Err(LlmError::InvalidResponse(s.clone())),
        Err(LlmError::EmptyResponse) => Err(LlmError::EmptyResponse),
    }
}
