//! Orchestration engine: the bounded multi-turn tool-dispatch loop.
//!
//! One invocation drives one conversation: send the prompt, classify each
//! model turn, execute requested tools in received order, feed results
//! back, and stop on a text-only turn, an empty turn, or the turn budget.
//! Failures never escape: whatever goes wrong inside the loop surfaces as
//! an error-status result with the trace intact.
//!
//! State walk per turn:
//! - tool calls present -> execute all, send results, await next turn
//! - text only          -> done, joined text is the answer
//! - nothing usable     -> break and try to salvage trailing text

use isy_common::config::AgentConfig;
use isy_common::trace::preview;
use isy_common::{
    normalize_args, ChatTransport, ExecutionTrace, InvocationResult, ModelTurn, ToolCallRequest,
    ToolCallResult, TracePhase, TraceStatus, TurnInput, TurnShape, TutorPolicy,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::tools::ToolRegistry;

/// Fixed localized reply when no usable text could be produced.
pub const FALLBACK_MESSAGE: &str = "Xin lỗi, tôi không thể xử lý yêu cầu của bạn.";

pub struct CommandEngine {
    transport: Arc<dyn ChatTransport>,
    registry: ToolRegistry,
    policy: TutorPolicy,
    max_turns: u32,
    preview_chars: usize,
}

/// How the loop ended when nothing failed.
enum LoopOutcome {
    Answer(String),
    NoAnswer,
}

impl CommandEngine {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        registry: ToolRegistry,
        policy: TutorPolicy,
        agent: &AgentConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            policy,
            max_turns: agent.max_turns,
            preview_chars: agent.result_preview_chars,
        }
    }

    /// Run one invocation to completion. Never fails: every fault becomes
    /// an error-status result carrying the trace collected so far.
    pub async fn handle_command(&self, prompt: &str) -> InvocationResult {
        let started = Instant::now();
        let mut trace = ExecutionTrace::new();
        let mut turns = 0u32;

        match self.drive(prompt, &mut trace, &mut turns).await {
            Ok(LoopOutcome::Answer(text)) => {
                info!("[agent] done in {} turn(s)", turns);
                InvocationResult::success(text, trace, started.elapsed(), turns)
            }
            Ok(LoopOutcome::NoAnswer) => {
                trace.record(
                    TracePhase::Completion,
                    TraceStatus::Error,
                    "❌ Không thể tạo phản hồi cuối cùng",
                );
                InvocationResult::error(FALLBACK_MESSAGE, trace, started.elapsed(), turns)
            }
            Err(e) => {
                error!("[agent] invocation failed: {e:#}");
                trace.record(
                    TracePhase::Error,
                    TraceStatus::Error,
                    format!("❌ Lỗi hệ thống: {e}"),
                );
                InvocationResult::error(
                    format!("Đã xảy ra lỗi: {e}"),
                    trace,
                    started.elapsed(),
                    turns,
                )
            }
        }
    }

    /// The loop body. `?` propagates any transport fault to the single
    /// catch point in `handle_command`; `turns` stays accurate either way.
    async fn drive(
        &self,
        prompt: &str,
        trace: &mut ExecutionTrace,
        turns: &mut u32,
    ) -> anyhow::Result<LoopOutcome> {
        trace.record(
            TracePhase::Initialization,
            TraceStatus::Processing,
            "🤖 Khởi tạo phiên hội thoại với mô hình...",
        );
        let mut session = self.transport.open_chat(
            &self.policy.render_system_prompt(),
            &self.registry.declarations(),
        );
        trace.record(
            TracePhase::Initialization,
            TraceStatus::Success,
            "✅ Khởi tạo thành công phiên mô hình",
        );

        trace.record(
            TracePhase::PromptAnalysis,
            TraceStatus::Processing,
            format!("📝 Phân tích lệnh: '{prompt}'"),
        );
        let mut turn = session.send(TurnInput::Prompt(prompt.to_string())).await?;
        trace.record(
            TracePhase::PromptAnalysis,
            TraceStatus::Success,
            "✅ Đã gửi lệnh đến AI, đang chờ phản hồi...",
        );

        while !turn.segments.is_empty() && *turns < self.max_turns {
            *turns += 1;
            trace.record(
                TracePhase::Processing,
                TraceStatus::Info,
                format!("🔄 Xử lý turn {turns}"),
            );

            match turn.shape() {
                TurnShape::ToolCalls => {
                    let results = self.execute_tool_calls(&turn, trace);
                    trace.record(
                        TracePhase::FunctionResults,
                        TraceStatus::Processing,
                        "📤 Gửi kết quả functions trở lại AI...",
                    );
                    turn = session.send(TurnInput::ToolResults(results)).await?;
                    trace.record(
                        TracePhase::FunctionResults,
                        TraceStatus::Success,
                        "✅ AI đã nhận kết quả và đang tổng hợp phản hồi...",
                    );
                }
                TurnShape::Text => {
                    let text = turn.joined_text().unwrap_or_default();
                    trace.record(
                        TracePhase::Completion,
                        TraceStatus::Success,
                        "🎉 Hoàn thành! Tạo phản hồi cuối cùng cho người dùng",
                    );
                    return Ok(LoopOutcome::Answer(text));
                }
                TurnShape::Empty => {
                    trace.record(
                        TracePhase::Processing,
                        TraceStatus::Info,
                        "⏸️ Không có function call hoặc text response, thoát vòng lặp",
                    );
                    break;
                }
            }
        }

        // A trailing text turn is still usable, even after the budget ran
        // out on a tool-bearing turn.
        if let Some(text) = turn.joined_text() {
            trace.record(
                TracePhase::Completion,
                TraceStatus::Success,
                "✅ Trích xuất được phản hồi cuối cùng",
            );
            return Ok(LoopOutcome::Answer(text));
        }
        Ok(LoopOutcome::NoAnswer)
    }

    /// Execute every tool call of one turn, in received order, collecting
    /// results in the same order.
    fn execute_tool_calls(&self, turn: &ModelTurn, trace: &mut ExecutionTrace) -> Vec<ToolCallResult> {
        let calls: Vec<&ToolCallRequest> = turn.tool_calls().collect();
        trace.record(
            TracePhase::FunctionDetection,
            TraceStatus::Success,
            format!("🛠️ Phát hiện {} function call(s)", calls.len()),
        );

        let mut results = Vec::with_capacity(calls.len());
        for (i, call) in calls.iter().enumerate() {
            let args = normalize_args(&call.args);
            trace.record_with_details(
                TracePhase::FunctionExecution,
                TraceStatus::Processing,
                format!("⚙️ Thực thi function {}/{}: {}", i + 1, calls.len(), call.name),
                json!({
                    "function_name": call.name,
                    "arguments": Value::Object(call.args.clone()),
                }),
            );

            let payload = self.registry.dispatch(&call.name, &args);

            trace.record_with_details(
                TracePhase::FunctionExecution,
                TraceStatus::Success,
                format!("✅ Hoàn thành {}", call.name),
                json!({ "result_preview": preview(&payload, self.preview_chars) }),
            );
            results.push(ToolCallResult::new(call.name.clone(), payload));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::store::{tables, JsonStore};
    use crate::tools::TutorOps;
    use isy_common::{LlmError, ScriptedTransport, TurnSegment};
    use isy_common::{InvocationStatus, ToolCallRequest};

    fn seeded_store(dir: &tempfile::TempDir) -> JsonStore {
        let store = JsonStore::new(dir.path());
        store
            .write(
                tables::STUDENTS,
                &[json!({"id": "student_001", "name": "An"})],
            )
            .unwrap();
        store
            .write(
                tables::LEARNING_OBJECTS,
                &[json!({"id": "lo_001", "title": "Tứ giác nội tiếp"})],
            )
            .unwrap();
        store
    }

    fn engine_with(
        script: Vec<Result<ModelTurn, LlmError>>,
    ) -> (CommandEngine, Arc<ScriptedTransport>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let transport = Arc::new(ScriptedTransport::new(script));
        let engine = CommandEngine::new(
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            ToolRegistry::new(TutorOps::new(store)),
            TutorPolicy::default(),
            &AgentConfig::default(),
        );
        (engine, transport, dir)
    }

    fn assign_call() -> ToolCallRequest {
        ToolCallRequest::new(
            "assign_exercise",
            json!({
                "student_name": "An",
                "learning_object_title": "tứ giác",
                "num_questions": 3,
            }),
        )
    }

    #[tokio::test]
    async fn test_text_only_turn_is_final() {
        let (engine, transport, _dir) =
            engine_with(vec![Ok(ModelTurn::with_text("Dạ, em nghe ạ."))]);
        let result = engine.handle_command("chào em").await;

        assert_eq!(result.status, InvocationStatus::Success);
        assert_eq!(result.response, "Dạ, em nghe ạ.");
        assert_eq!(result.turns_processed, 1);
        assert_eq!(transport.send_count(), 1);
        assert!(result
            .logs
            .iter()
            .any(|e| e.phase == TracePhase::Completion && e.status == TraceStatus::Success));
    }

    #[tokio::test]
    async fn test_tool_turn_then_text() {
        let (engine, transport, _dir) = engine_with(vec![
            Ok(ModelTurn::with_calls(vec![assign_call()])),
            Ok(ModelTurn::with_text("Em đã giao 3 bài tập cho An ạ.")),
        ]);
        let result = engine
            .handle_command("Giao 3 bài tập về tứ giác cho học sinh An")
            .await;

        assert_eq!(result.status, InvocationStatus::Success);
        assert_eq!(result.turns_processed, 2);

        // the tool actually ran against the store
        let results = transport.tool_results_of_send(1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "assign_exercise");
        assert!(results[0].payload.starts_with("Đã giao thành công 3 bài tập"));

        let executions: Vec<_> = result
            .logs
            .iter()
            .filter(|e| {
                e.phase == TracePhase::FunctionExecution && e.status == TraceStatus::Success
            })
            .collect();
        assert_eq!(executions.len(), 1);
    }

    #[tokio::test]
    async fn test_mixed_turn_prioritizes_tools_over_text() {
        let (engine, transport, _dir) = engine_with(vec![
            Ok(ModelTurn::new(vec![
                TurnSegment::Text("Để em giao bài ngay ạ.".to_string()),
                TurnSegment::ToolCall(assign_call()),
            ])),
            Ok(ModelTurn::with_text("Xong rồi ạ.")),
        ]);
        let result = engine.handle_command("giao bài cho An").await;

        // the interim text was not treated as the final answer
        assert_eq!(result.response, "Xong rồi ạ.");
        assert_eq!(result.turns_processed, 2);
        assert_eq!(transport.send_count(), 2);
    }

    #[tokio::test]
    async fn test_multiple_calls_execute_in_order_within_one_turn() {
        let (engine, transport, _dir) = engine_with(vec![
            Ok(ModelTurn::with_calls(vec![
                ToolCallRequest::new("list_available_submissions", json!({})),
                assign_call(),
            ])),
            Ok(ModelTurn::with_text("Xong ạ.")),
        ]);
        let result = engine.handle_command("liệt kê rồi giao bài").await;

        assert_eq!(result.turns_processed, 2);
        let results = transport.tool_results_of_send(1).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["list_available_submissions", "assign_exercise"]);
    }

    #[tokio::test]
    async fn test_empty_first_turn_falls_back() {
        let (engine, _transport, _dir) = engine_with(vec![Ok(ModelTurn::empty())]);
        let result = engine.handle_command("???").await;

        assert_eq!(result.status, InvocationStatus::Error);
        assert_eq!(result.response, FALLBACK_MESSAGE);
        assert_eq!(result.turns_processed, 0);
        let last = result.logs.last().unwrap();
        assert_eq!(last.phase, TracePhase::Completion);
        assert_eq!(last.status, TraceStatus::Error);
    }

    #[tokio::test]
    async fn test_all_empty_text_turn_breaks_and_falls_back() {
        let (engine, _transport, _dir) = engine_with(vec![Ok(ModelTurn::new(vec![
            TurnSegment::Text(String::new()),
        ]))]);
        let result = engine.handle_command("...").await;

        assert_eq!(result.status, InvocationStatus::Error);
        assert_eq!(result.turns_processed, 1);
        assert!(result.logs.iter().any(|e| {
            e.phase == TracePhase::Processing
                && e.status == TraceStatus::Info
                && e.message.contains("thoát vòng lặp")
        }));
    }

    #[tokio::test]
    async fn test_turn_budget_is_never_exceeded() {
        // a single scripted tools-turn replays forever
        let (engine, transport, _dir) = engine_with(vec![Ok(ModelTurn::with_calls(vec![
            ToolCallRequest::new("list_available_submissions", json!({})),
        ]))]);
        let result = engine.handle_command("lặp mãi").await;

        assert_eq!(result.turns_processed, 10);
        assert_eq!(result.status, InvocationStatus::Error);
        assert_eq!(result.response, FALLBACK_MESSAGE);
        // opening prompt + one result batch per processed turn
        assert_eq!(transport.send_count(), 11);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_salvages_trailing_text() {
        let (engine, _transport, _dir) = engine_with(vec![Ok(ModelTurn::new(vec![
            TurnSegment::ToolCall(ToolCallRequest::new("list_available_submissions", json!({}))),
            TurnSegment::Text("Vẫn đang xử lý ạ.".to_string()),
        ]))]);
        let result = engine.handle_command("lặp mãi").await;

        // the 10th turn carried text next to its tool call
        assert_eq!(result.turns_processed, 10);
        assert_eq!(result.status, InvocationStatus::Success);
        assert_eq!(result.response, "Vẫn đang xử lý ạ.");
        assert!(result
            .logs
            .iter()
            .any(|e| e.message.contains("Trích xuất được phản hồi cuối cùng")));
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort_the_loop() {
        let (engine, transport, _dir) = engine_with(vec![
            Ok(ModelTurn::with_calls(vec![ToolCallRequest::new(
                "summon_dragon",
                json!({}),
            )])),
            Ok(ModelTurn::with_text("Em không có công cụ đó ạ.")),
        ]);
        let result = engine.handle_command("triệu hồi rồng").await;

        assert_eq!(result.status, InvocationStatus::Success);
        let results = transport.tool_results_of_send(1).unwrap();
        assert_eq!(results[0].payload, "Unknown function: summon_dragon");
    }

    #[tokio::test]
    async fn test_transport_failure_on_first_send() {
        let (engine, _transport, _dir) =
            engine_with(vec![Err(LlmError::Http("503 overloaded".to_string()))]);
        let result = engine.handle_command("giao bài").await;

        assert_eq!(result.status, InvocationStatus::Error);
        assert_eq!(result.turns_processed, 0);
        assert!(result.response.starts_with("Đã xảy ra lỗi:"));
        let last = result.logs.last().unwrap();
        assert_eq!(last.phase, TracePhase::Error);
        assert_eq!(last.status, TraceStatus::Error);
    }

    #[tokio::test]
    async fn test_failure_mid_loop_keeps_turn_count() {
        let (engine, _transport, _dir) = engine_with(vec![
            Ok(ModelTurn::with_calls(vec![assign_call()])),
            Err(LlmError::Http("connection reset".to_string())),
        ]);
        let result = engine.handle_command("giao bài").await;

        assert_eq!(result.status, InvocationStatus::Error);
        assert_eq!(result.turns_processed, 1);
        assert!(result.response.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_result_preview_is_truncated_in_trace() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        // a long pending list makes the tool result exceed the preview cap
        let long_feedback = "rất ".repeat(60);
        store
            .write(
                tables::SUBMISSIONS,
                &[json!({
                    "id": "sub_001",
                    "student_id": "student_001",
                    "student_name": "An",
                    "learning_object_title": long_feedback,
                    "status": "submitted",
                })],
            )
            .unwrap();

        let transport = Arc::new(ScriptedTransport::from_turns(vec![
            ModelTurn::with_calls(vec![ToolCallRequest::new(
                "list_available_submissions",
                json!({}),
            )]),
            ModelTurn::with_text("Xong ạ."),
        ]));
        let engine = CommandEngine::new(
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            ToolRegistry::new(TutorOps::new(store)),
            TutorPolicy::default(),
            &AgentConfig::default(),
        );
        let result = engine.handle_command("liệt kê bài nộp").await;

        let preview_entry = result
            .logs
            .iter()
            .find(|e| e.details.get("result_preview").is_some())
            .unwrap();
        let preview_text = preview_entry.details["result_preview"].as_str().unwrap();
        assert_eq!(preview_text.chars().count(), 103);
        assert!(preview_text.ends_with("..."));
        // the model still received the full payload
        let full = &transport.tool_results_of_send(1).unwrap()[0].payload;
        assert!(full.chars().count() > 103);
    }

    #[tokio::test]
    async fn test_policy_prompt_and_declarations_reach_the_transport() {
        let (engine, transport, _dir) =
            engine_with(vec![Ok(ModelTurn::with_text("Dạ."))]);
        let _ = engine.handle_command("chào").await;

        let prompt = transport.last_system_prompt().unwrap();
        assert!(prompt.contains("Bạn là ISY"));
        assert!(prompt.contains("Giao nhiều hơn 10 bài tập cùng lúc"));
        assert_eq!(transport.declared_tool_names().len(), 6);
    }
}
