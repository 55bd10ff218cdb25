//! API routes for isyd

use crate::server::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use isy_common::InvocationResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Command Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorCommandRequest {
    pub prompt: String,
}

pub fn command_routes() -> Router<AppStateArc> {
    Router::new().route("/tutor-command", post(tutor_command))
}

/// Run one natural-language command through the agent. Domain and
/// infrastructure failures come back as an `error`-status body, not as
/// HTTP errors; only a blank prompt is rejected outright.
async fn tutor_command(
    State(state): State<AppStateArc>,
    Json(req): Json<TutorCommandRequest>,
) -> Result<Json<InvocationResult>, (StatusCode, String)> {
    if req.prompt.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "prompt must not be empty".to_string(),
        ));
    }

    info!("[CMD] {}", req.prompt);
    let result = state.engine.handle_command(&req.prompt).await;
    info!(
        "[CMD] {} in {:.2}s ({} turn(s))",
        result.status.as_str(),
        result.processing_time,
        result.turns_processed
    );
    Ok(Json(result))
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Tutor Command Center API is running".to_string(),
    })
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "tutor-command-center".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::CommandEngine;
    use crate::tools::store::{tables, JsonStore};
    use crate::tools::{ToolRegistry, TutorOps};
    use isy_common::config::AgentConfig;
    use isy_common::{
        ChatTransport, InvocationStatus, ModelTurn, ScriptedTransport, TutorPolicy,
    };
    use serde_json::json;

    fn state_with(script: Vec<ModelTurn>) -> (AppStateArc, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store
            .write(
                tables::STUDENTS,
                &[json!({"id": "student_001", "name": "An"})],
            )
            .unwrap();
        let transport: Arc<dyn ChatTransport> = Arc::new(ScriptedTransport::from_turns(script));
        let engine = CommandEngine::new(
            transport,
            ToolRegistry::new(TutorOps::new(store)),
            TutorPolicy::default(),
            &AgentConfig::default(),
        );
        (Arc::new(AppState::new(engine)), dir)
    }

    #[tokio::test]
    async fn test_tutor_command_returns_engine_result() {
        let (state, _dir) = state_with(vec![ModelTurn::with_text("Dạ, em đây ạ.")]);
        let response = tutor_command(
            State(state),
            Json(TutorCommandRequest {
                prompt: "chào em".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.response, "Dạ, em đây ạ.");
        assert_eq!(response.0.status, InvocationStatus::Success);
        assert_eq!(response.0.turns_processed, 1);
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected() {
        let (state, _dir) = state_with(vec![ModelTurn::with_text("never reached")]);
        let err = tutor_command(
            State(state),
            Json(TutorCommandRequest {
                prompt: "   \n\t".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_status_invocation_is_still_ok() {
        // an empty model turn makes the engine fall back with error status
        let (state, _dir) = state_with(vec![ModelTurn::empty()]);
        let response = tutor_command(
            State(state),
            Json(TutorCommandRequest {
                prompt: "lệnh khó hiểu".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.status, InvocationStatus::Error);
        assert!(!response.0.response.is_empty());
    }

    #[tokio::test]
    async fn test_health_body() {
        let (state, _dir) = state_with(vec![ModelTurn::empty()]);
        let body = health_check(State(state)).await.0;

        assert_eq!(body.status, "healthy");
        assert_eq!(body.service, "tutor-command-center");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_root_banner() {
        let body = root().await.0;
        assert_eq!(body.message, "Tutor Command Center API is running");
    }
}
