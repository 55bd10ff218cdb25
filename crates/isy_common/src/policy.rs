//! Tutor agent policy: persona, confirmation thresholds, topic hints.
//!
//! The system prompt handed to the model is rendered from this structure,
//! so every behavioral knob is explicit configuration instead of prose
//! buried in a string literal. The engine passes the rendered prompt
//! through verbatim; enforcement is conversational, on the model side.

use serde::{Deserialize, Serialize};

/// Behavioral policy for the tutor assistant persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorPolicy {
    /// Name the assistant introduces itself with.
    #[serde(default = "default_persona_name")]
    pub persona_name: String,
    /// Pronoun the assistant uses for itself.
    #[serde(default = "default_self_address")]
    pub self_address: String,
    /// Form of address for the tutor.
    #[serde(default = "default_tutor_address")]
    pub tutor_address: String,
    #[serde(default)]
    pub confirmation: ConfirmationPolicy,
    /// Colloquial topic names mapped to canonical learning object titles.
    #[serde(default = "default_topic_hints")]
    pub topic_hints: Vec<TopicHint>,
}

/// Actions the model must confirm with the tutor before executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    #[serde(default = "default_confirm_pathways")]
    pub confirm_pathways: bool,
    #[serde(default = "default_max_exercises")]
    pub max_exercises_without_confirm: u32,
    #[serde(default = "default_score_low")]
    pub score_confirm_low: f64,
    #[serde(default = "default_score_high")]
    pub score_confirm_high: f64,
    #[serde(default = "default_confirm_notes")]
    pub confirm_important_notes: bool,
}

/// One colloquial-to-canonical topic mapping hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicHint {
    pub spoken: String,
    pub canonical: String,
}

fn default_persona_name() -> String {
    "ISY".to_string()
}

fn default_self_address() -> String {
    "em".to_string()
}

fn default_tutor_address() -> String {
    "thầy/cô".to_string()
}

fn default_confirm_pathways() -> bool {
    true
}

fn default_max_exercises() -> u32 {
    10 // more than this in one assignment needs confirmation
}

fn default_score_low() -> f64 {
    50.0
}

fn default_score_high() -> f64 {
    95.0
}

fn default_confirm_notes() -> bool {
    true
}

fn default_topic_hints() -> Vec<TopicHint> {
    vec![
        TopicHint {
            spoken: "giải hệ".to_string(),
            canonical: "Giải hệ phương trình bằng phương pháp thế".to_string(),
        },
        TopicHint {
            spoken: "tứ giác".to_string(),
            canonical: "Tứ giác nội tiếp".to_string(),
        },
        TopicHint {
            spoken: "phương trình bậc hai".to_string(),
            canonical: "Phương trình bậc hai một ẩn".to_string(),
        },
    ]
}

impl Default for TutorPolicy {
    fn default() -> Self {
        Self {
            persona_name: default_persona_name(),
            self_address: default_self_address(),
            tutor_address: default_tutor_address(),
            confirmation: ConfirmationPolicy::default(),
            topic_hints: default_topic_hints(),
        }
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirm_pathways: default_confirm_pathways(),
            max_exercises_without_confirm: default_max_exercises(),
            score_confirm_low: default_score_low(),
            score_confirm_high: default_score_high(),
            confirm_important_notes: default_confirm_notes(),
        }
    }
}

/// Fixed tool directory shown to the model alongside the declarations.
const TOOL_DIRECTORY: &str = "\
- assign_exercise: Giao bài tập cho học sinh
- get_student_activity_log: Xem hoạt động của học sinh
- grade_submission: Chấm điểm bài nộp
- add_note_to_report: Thêm ghi chú vào báo cáo học sinh
- create_custom_pathway: Tạo lộ trình học tập tùy chỉnh
- list_available_submissions: Liệt kê bài nộp có thể chấm";

impl TutorPolicy {
    /// Render the full system instruction for the model.
    pub fn render_system_prompt(&self) -> String {
        let mut prompt = format!(
            r#"Bạn là {persona} - trợ lý AI thông minh cho gia sư, chuyên hỗ trợ quản lý học sinh và hoạt động giảng dạy.

=== NGUYÊN TẮC HOẠT ĐỘNG ===
1. Phân tích kỹ lưỡng: Luôn phân tích yêu cầu của gia sư một cách chi tiết trước khi hành động.

2. Yêu cầu thông tin thiếu: Nếu thiếu thông tin cần thiết để thực hiện tác vụ, hãy hỏi lại một cách lịch sự:
   - "Giao bài tập cho An" -> "{tutor_cap} muốn giao bài tập về chủ đề gì ạ? Và bao nhiêu câu hỏi?"
   - "Chấm bài" -> "{tutor_cap} muốn chấm bài nào ạ? {self_cap} có thể liệt kê các bài nộp có sẵn không?"

3. Xác nhận hành động quan trọng:
   CÁC HÀNH ĐỘNG CẦN XÁC NHẬN:"#,
            persona = self.persona_name,
            tutor_cap = capitalize_first(&self.tutor_address),
            self_cap = capitalize_first(&self.self_address),
        );

        let confirm = &self.confirmation;
        if confirm.confirm_pathways {
            prompt.push_str("\n   - Tạo lộ trình tùy chỉnh (create_custom_pathway)");
        }
        prompt.push_str(&format!(
            "\n   - Giao nhiều hơn {} bài tập cùng lúc",
            confirm.max_exercises_without_confirm
        ));
        prompt.push_str(&format!(
            "\n   - Chấm điểm dưới {} hoặc trên {}",
            confirm.score_confirm_low, confirm.score_confirm_high
        ));
        if confirm.confirm_important_notes {
            prompt.push_str("\n   - Thêm ghi chú quan trọng vào báo cáo");
        }

        prompt.push_str(&format!(
            r#"

   CÁCH XÁC NHẬN:
   - Mô tả chi tiết hành động sẽ thực hiện
   - Hỏi "{tutor_cap} có chắc chắn muốn tiếp tục không?"
   - Chờ phản hồi xác nhận trước khi thực thi

4. Giao tiếp thân thiện:
   - Luôn xưng hô "{self_addr}" và "{tutor_addr}"
   - Báo cáo kết quả một cách chi tiết và rõ ràng

5. Hỗ trợ chủ động:
   - Gợi ý các hành động liên quan
   - Cảnh báo nếu có vấn đề tiềm ẩn

=== CÁC CÔNG CỤ ===
{tools}"#,
            tutor_cap = capitalize_first(&self.tutor_address),
            self_addr = self.self_address,
            tutor_addr = self.tutor_address,
            tools = TOOL_DIRECTORY,
        ));

        if !self.topic_hints.is_empty() {
            prompt.push_str("\n\n=== GỢI Ý TÊN CHỦ ĐỀ ===");
            for hint in &self.topic_hints {
                prompt.push_str(&format!("\n- \"{}\" nghĩa là \"{}\"", hint.spoken, hint.canonical));
            }
        }

        prompt.push_str(
            "\n\nHãy thực hiện vai trò của một trợ lý AI chuyên nghiệp, thân thiện và thông minh!",
        );
        prompt
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
