//! The six tutor operations.
//!
//! Every operation returns a plain string: success messages and domain
//! errors alike are fed back to the model for conversational relay, and
//! store failures are folded into strings at this boundary too. Nothing
//! here returns an error to the orchestration loop.

use super::store::{tables, JsonStore};
use chrono::Utc;
use isy_common::IsyError;
use serde_json::{json, Value};

pub struct TutorOps {
    store: JsonStore,
}

impl TutorOps {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    // ========================================================================
    // assign_exercise
    // ========================================================================

    pub fn assign_exercise(
        &self,
        student_name: &str,
        learning_object_title: &str,
        num_questions: u32,
    ) -> String {
        let student = match self.find_student(student_name) {
            Some(s) => s,
            None => return format!("Không tìm thấy học sinh có tên '{student_name}'"),
        };
        let learning_object = match self.find_learning_object(learning_object_title) {
            Some(lo) => lo,
            None => return format!("Không tìm thấy chủ đề học tập '{learning_object_title}'"),
        };

        let student_id = str_field(&student, "id").to_string();
        let resolved_name = str_field(&student, "name").to_string();
        let resolved_title = str_field(&learning_object, "title").to_string();

        let assignment = json!({
            "id": format!("assignment_{}", Utc::now().format("%Y%m%d_%H%M%S")),
            "student_id": student_id,
            "student_name": resolved_name,
            "learning_object_id": str_field(&learning_object, "id"),
            "learning_object_title": resolved_title,
            "num_questions": num_questions,
            "assigned_date": Utc::now().to_rfc3339(),
            "status": "assigned",
        });
        let assignment_id = assignment["id"].clone();

        let saved = self
            .store
            .append(tables::ASSIGNMENTS, assignment)
            .and_then(|_| {
                self.store.log_activity(
                    &student_id,
                    "assignment_created",
                    json!({
                        "learning_object": resolved_title,
                        "num_questions": num_questions,
                        "assignment_id": assignment_id,
                    }),
                )
            });
        if let Err(e) = saved {
            return store_failure(e);
        }

        format!(
            "Đã giao thành công {num_questions} bài tập về '{resolved_title}' cho học sinh {resolved_name}"
        )
    }

    // ========================================================================
    // get_student_activity_log
    // ========================================================================

    pub fn get_student_activity_log(&self, student_name: &str, date_range: Option<&str>) -> String {
        let student = match self.find_student(student_name) {
            Some(s) => s,
            None => return format!("Không tìm thấy học sinh có tên '{student_name}'"),
        };
        let student_id = str_field(&student, "id");
        let resolved_name = str_field(&student, "name");

        let now = Utc::now();
        let activities: Vec<Value> = self
            .store
            .read(tables::ACTIVITY_LOGS)
            .into_iter()
            .filter(|log| log.get("student_id").and_then(Value::as_str) == Some(student_id))
            .filter(|log| {
                date_range
                    .map(|range| within_range(str_field(log, "timestamp"), range, now))
                    .unwrap_or(true)
            })
            .collect();

        if activities.is_empty() {
            return format!("Không có hoạt động nào được ghi nhận cho học sinh {resolved_name}");
        }

        let payload = json!({
            "student_name": resolved_name,
            "total_activities": activities.len(),
            "activities": activities,
        });
        serde_json::to_string_pretty(&payload).unwrap_or_else(|e| store_failure(e.into()))
    }

    // ========================================================================
    // grade_submission
    // ========================================================================

    pub fn grade_submission(&self, submission_id: &str, score: f64, feedback_text: &str) -> String {
        if !(0.0..=100.0).contains(&score) {
            return format!(
                "Điểm {} không hợp lệ. Điểm phải nằm trong khoảng từ 0 đến 100",
                fmt_score(score)
            );
        }

        let mut submissions = self.store.read(tables::SUBMISSIONS);
        let Some(submission) = submissions
            .iter_mut()
            .find(|s| s.get("id").and_then(Value::as_str) == Some(submission_id))
        else {
            return format!("Không tìm thấy bài nộp có mã '{submission_id}'");
        };

        let student_id = str_field(submission, "student_id").to_string();
        let student_name = str_field(submission, "student_name").to_string();
        if let Some(record) = submission.as_object_mut() {
            record.insert("score".to_string(), json!(score));
            record.insert("feedback".to_string(), json!(feedback_text));
            record.insert("status".to_string(), json!("graded"));
            record.insert("graded_date".to_string(), json!(Utc::now().to_rfc3339()));
        }

        let saved = self
            .store
            .write(tables::SUBMISSIONS, &submissions)
            .and_then(|_| {
                self.store.log_activity(
                    &student_id,
                    "submission_graded",
                    json!({"submission_id": submission_id, "score": score}),
                )
            });
        if let Err(e) = saved {
            return store_failure(e);
        }

        format!(
            "Đã chấm điểm {} cho bài nộp '{submission_id}' của học sinh {student_name}",
            fmt_score(score)
        )
    }

    // ========================================================================
    // add_note_to_report
    // ========================================================================

    pub fn add_note_to_report(&self, student_name: &str, note_text: &str) -> String {
        let student = match self.find_student(student_name) {
            Some(s) => s,
            None => return format!("Không tìm thấy học sinh có tên '{student_name}'"),
        };
        let student_id = str_field(&student, "id").to_string();
        let resolved_name = str_field(&student, "name").to_string();

        let note = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "note": note_text,
        });

        let mut reports = self.store.read(tables::REPORTS);
        let mut appended = false;
        for report in reports.iter_mut() {
            if report.get("student_id").and_then(Value::as_str) != Some(student_id.as_str()) {
                continue;
            }
            match report.get_mut("notes").and_then(Value::as_array_mut) {
                Some(notes) => notes.push(note.clone()),
                None => {
                    if let Some(record) = report.as_object_mut() {
                        record.insert("notes".to_string(), json!([note]));
                    }
                }
            }
            appended = true;
            break;
        }
        if !appended {
            reports.push(json!({
                "student_id": student_id,
                "student_name": resolved_name,
                "notes": [note],
            }));
        }

        let saved = self.store.write(tables::REPORTS, &reports).and_then(|_| {
            self.store
                .log_activity(&student_id, "note_added", json!({"note": note_text}))
        });
        if let Err(e) = saved {
            return store_failure(e);
        }

        format!("Đã thêm ghi chú vào báo cáo của học sinh {resolved_name}")
    }

    // ========================================================================
    // create_custom_pathway
    // ========================================================================

    pub fn create_custom_pathway(&self, student_name: &str, learning_object_titles: &[String]) -> String {
        let student = match self.find_student(student_name) {
            Some(s) => s,
            None => return format!("Không tìm thấy học sinh có tên '{student_name}'"),
        };
        let student_id = str_field(&student, "id").to_string();
        let resolved_name = str_field(&student, "name").to_string();

        let mut resolved = Vec::new();
        let mut missing = Vec::new();
        for title in learning_object_titles {
            match self.find_learning_object(title) {
                Some(lo) => resolved.push(str_field(&lo, "title").to_string()),
                None => missing.push(title.clone()),
            }
        }

        if resolved.is_empty() {
            return format!(
                "Không tìm thấy chủ đề học tập nào phù hợp với: {}",
                missing.join(", ")
            );
        }

        let pathway = json!({
            "id": format!("pathway_{}", Utc::now().format("%Y%m%d_%H%M%S")),
            "student_id": student_id,
            "student_name": resolved_name,
            "learning_objects": resolved,
            "created_date": Utc::now().to_rfc3339(),
            "status": "active",
        });
        let num_objects = pathway["learning_objects"]
            .as_array()
            .map(Vec::len)
            .unwrap_or(0);

        let saved = self.store.append(tables::PATHWAYS, pathway).and_then(|_| {
            self.store.log_activity(
                &student_id,
                "pathway_created",
                json!({"num_objects": num_objects}),
            )
        });
        if let Err(e) = saved {
            return store_failure(e);
        }

        let mut message = format!(
            "Đã tạo lộ trình học tập với {num_objects} chủ đề cho học sinh {resolved_name}"
        );
        if !missing.is_empty() {
            message.push_str(&format!(" (không tìm thấy: {})", missing.join(", ")));
        }
        message
    }

    // ========================================================================
    // list_available_submissions
    // ========================================================================

    pub fn list_available_submissions(&self) -> String {
        let pending: Vec<Value> = self
            .store
            .read(tables::SUBMISSIONS)
            .into_iter()
            .filter(|s| s.get("status").and_then(Value::as_str) != Some("graded"))
            .collect();

        if pending.is_empty() {
            return "Không có bài nộp nào đang chờ chấm".to_string();
        }

        let payload = json!({
            "total_pending": pending.len(),
            "submissions": pending,
        });
        serde_json::to_string_pretty(&payload).unwrap_or_else(|e| store_failure(e.into()))
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Exact name match, case-insensitive.
    fn find_student(&self, name: &str) -> Option<Value> {
        let wanted = name.to_lowercase();
        self.store
            .read(tables::STUDENTS)
            .into_iter()
            .find(|s| str_field(s, "name").to_lowercase() == wanted)
    }

    /// Bidirectional substring match on the title, case-insensitive, so a
    /// spoken fragment ("tứ giác") finds the canonical object and a verbose
    /// request still matches a shorter title.
    fn find_learning_object(&self, title: &str) -> Option<Value> {
        let wanted = title.to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.store
            .read(tables::LEARNING_OBJECTS)
            .into_iter()
            .find(|lo| {
                let candidate = str_field(lo, "title").to_lowercase();
                !candidate.is_empty()
                    && (candidate.contains(&wanted) || wanted.contains(&candidate))
            })
    }
}

fn str_field<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or("")
}

fn store_failure(e: IsyError) -> String {
    format!("Đã xảy ra lỗi khi lưu dữ liệu: {e}")
}

/// Render whole scores without a trailing `.0`.
fn fmt_score(score: f64) -> String {
    if score.fract() == 0.0 && score.is_finite() {
        format!("{}", score as i64)
    } else {
        score.to_string()
    }
}

/// Timestamp filter for the activity log. Unknown ranges and unparseable
/// timestamps keep the entry.
fn within_range(timestamp: &str, range: &str, now: chrono::DateTime<Utc>) -> bool {
    let parsed = match chrono::DateTime::parse_from_rfc3339(timestamp) {
        Ok(t) => t.with_timezone(&Utc),
        Err(_) => return true,
    };
    match range {
        "today" => parsed.date_naive() == now.date_naive(),
        "this_week" => now.signed_duration_since(parsed) <= chrono::Duration::days(7),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_ops() -> (tempfile::TempDir, TutorOps) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store
            .write(
                tables::STUDENTS,
                &[
                    json!({"id": "student_001", "name": "An", "grade_level": 9}),
                    json!({"id": "student_002", "name": "Bình", "grade_level": 9}),
                ],
            )
            .unwrap();
        store
            .write(
                tables::LEARNING_OBJECTS,
                &[
                    json!({"id": "lo_001", "title": "Tứ giác nội tiếp", "subject": "Toán 9"}),
                    json!({"id": "lo_002", "title": "Phương trình bậc hai một ẩn", "subject": "Toán 9"}),
                    json!({"id": "lo_003", "title": "Giải hệ phương trình bằng phương pháp thế", "subject": "Toán 9"}),
                ],
            )
            .unwrap();
        store
            .write(
                tables::SUBMISSIONS,
                &[
                    json!({
                        "id": "sub_001",
                        "student_id": "student_001",
                        "student_name": "An",
                        "learning_object_title": "Tứ giác nội tiếp",
                        "submitted_date": "2025-08-20T10:00:00+00:00",
                        "status": "submitted",
                    }),
                    json!({
                        "id": "sub_002",
                        "student_id": "student_002",
                        "student_name": "Bình",
                        "learning_object_title": "Phương trình bậc hai một ẩn",
                        "submitted_date": "2025-08-21T09:30:00+00:00",
                        "status": "graded",
                        "score": 88.0,
                        "feedback": "Tốt",
                    }),
                ],
            )
            .unwrap();
        (dir, TutorOps::new(store))
    }

    fn table_bytes(ops: &TutorOps, table: &str) -> Vec<u8> {
        std::fs::read(ops.store().table_path(table)).unwrap_or_default()
    }

    #[test]
    fn test_assign_exercise_success() {
        let (_dir, ops) = seeded_ops();
        let message = ops.assign_exercise("An", "Tứ giác nội tiếp", 3);
        assert_eq!(
            message,
            "Đã giao thành công 3 bài tập về 'Tứ giác nội tiếp' cho học sinh An"
        );

        let assignments = ops.store().read(tables::ASSIGNMENTS);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0]["student_id"], "student_001");
        assert_eq!(assignments[0]["learning_object_id"], "lo_001");
        assert_eq!(assignments[0]["num_questions"], 3);
        assert_eq!(assignments[0]["status"], "assigned");
        assert!(assignments[0]["id"]
            .as_str()
            .unwrap()
            .starts_with("assignment_"));

        let logs = ops.store().read(tables::ACTIVITY_LOGS);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["activity"], "assignment_created");
    }

    #[test]
    fn test_assign_exercise_unknown_student_leaves_file_untouched() {
        let (_dir, ops) = seeded_ops();
        ops.store().write(tables::ASSIGNMENTS, &[]).unwrap();
        let before = table_bytes(&ops, tables::ASSIGNMENTS);

        let message = ops.assign_exercise("Dũng", "Tứ giác nội tiếp", 3);
        assert_eq!(message, "Không tìm thấy học sinh có tên 'Dũng'");
        assert_eq!(table_bytes(&ops, tables::ASSIGNMENTS), before);
        assert!(ops.store().read(tables::ACTIVITY_LOGS).is_empty());
    }

    #[test]
    fn test_assign_exercise_unknown_topic() {
        let (_dir, ops) = seeded_ops();
        let message = ops.assign_exercise("An", "Lượng giác", 5);
        assert_eq!(message, "Không tìm thấy chủ đề học tập 'Lượng giác'");
        assert!(ops.store().read(tables::ASSIGNMENTS).is_empty());
    }

    #[test]
    fn test_student_match_is_case_insensitive() {
        let (_dir, ops) = seeded_ops();
        let message = ops.assign_exercise("an", "Tứ giác nội tiếp", 1);
        assert!(message.contains("cho học sinh An"));
    }

    #[test]
    fn test_topic_match_is_bidirectional_substring() {
        let (_dir, ops) = seeded_ops();
        // spoken fragment inside the canonical title
        let message = ops.assign_exercise("An", "tứ giác", 2);
        assert!(message.contains("'Tứ giác nội tiếp'"));
        // verbose request containing the canonical title
        let message = ops.assign_exercise("An", "phương trình bậc hai một ẩn nâng cao", 2);
        assert!(message.contains("'Phương trình bậc hai một ẩn'"));
    }

    #[test]
    fn test_grade_submission_success() {
        let (_dir, ops) = seeded_ops();
        let message = ops.grade_submission("sub_001", 85.0, "Trình bày rõ ràng");
        assert_eq!(message, "Đã chấm điểm 85 cho bài nộp 'sub_001' của học sinh An");

        let submissions = ops.store().read(tables::SUBMISSIONS);
        let graded = submissions
            .iter()
            .find(|s| s["id"] == "sub_001")
            .unwrap();
        assert_eq!(graded["score"], 85.0);
        assert_eq!(graded["status"], "graded");
        assert_eq!(graded["feedback"], "Trình bày rõ ràng");
        assert!(graded["graded_date"].is_string());

        let logs = ops.store().read(tables::ACTIVITY_LOGS);
        assert_eq!(logs[0]["activity"], "submission_graded");
        assert_eq!(logs[0]["student_id"], "student_001");
    }

    #[test]
    fn test_grade_submission_rejects_out_of_range_without_mutation() {
        let (_dir, ops) = seeded_ops();
        let before = table_bytes(&ops, tables::SUBMISSIONS);

        let high = ops.grade_submission("sub_001", 150.0, "?");
        assert_eq!(high, "Điểm 150 không hợp lệ. Điểm phải nằm trong khoảng từ 0 đến 100");
        let low = ops.grade_submission("sub_001", -5.0, "?");
        assert!(low.contains("không hợp lệ"));

        assert_eq!(table_bytes(&ops, tables::SUBMISSIONS), before);
        assert!(ops.store().read(tables::ACTIVITY_LOGS).is_empty());
    }

    #[test]
    fn test_grade_submission_unknown_id() {
        let (_dir, ops) = seeded_ops();
        let message = ops.grade_submission("sub_999", 70.0, "ok");
        assert_eq!(message, "Không tìm thấy bài nộp có mã 'sub_999'");
    }

    #[test]
    fn test_grade_submission_keeps_fractional_score() {
        let (_dir, ops) = seeded_ops();
        let message = ops.grade_submission("sub_001", 87.5, "Khá");
        assert!(message.starts_with("Đã chấm điểm 87.5"));
    }

    #[test]
    fn test_add_note_creates_then_appends() {
        let (_dir, ops) = seeded_ops();
        let first = ops.add_note_to_report("An", "Tiến bộ rõ rệt");
        assert_eq!(first, "Đã thêm ghi chú vào báo cáo của học sinh An");

        let second = ops.add_note_to_report("An", "Cần luyện thêm hình học");
        assert_eq!(second, "Đã thêm ghi chú vào báo cáo của học sinh An");

        let reports = ops.store().read(tables::REPORTS);
        assert_eq!(reports.len(), 1);
        let notes = reports[0]["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0]["note"], "Tiến bộ rõ rệt");
        assert_eq!(notes[1]["note"], "Cần luyện thêm hình học");
    }

    #[test]
    fn test_add_note_unknown_student() {
        let (_dir, ops) = seeded_ops();
        let message = ops.add_note_to_report("Dũng", "ghi chú");
        assert_eq!(message, "Không tìm thấy học sinh có tên 'Dũng'");
        assert!(ops.store().read(tables::REPORTS).is_empty());
    }

    #[test]
    fn test_create_pathway_success() {
        let (_dir, ops) = seeded_ops();
        let message = ops.create_custom_pathway(
            "Bình",
            &["tứ giác".to_string(), "giải hệ".to_string()],
        );
        assert_eq!(message, "Đã tạo lộ trình học tập với 2 chủ đề cho học sinh Bình");

        let pathways = ops.store().read(tables::PATHWAYS);
        assert_eq!(pathways.len(), 1);
        assert_eq!(pathways[0]["status"], "active");
        assert_eq!(
            pathways[0]["learning_objects"],
            json!(["Tứ giác nội tiếp", "Giải hệ phương trình bằng phương pháp thế"])
        );
        assert!(pathways[0]["id"].as_str().unwrap().starts_with("pathway_"));
    }

    #[test]
    fn test_create_pathway_reports_skipped_titles() {
        let (_dir, ops) = seeded_ops();
        let message = ops.create_custom_pathway(
            "An",
            &["tứ giác".to_string(), "Lượng giác".to_string()],
        );
        assert_eq!(
            message,
            "Đã tạo lộ trình học tập với 1 chủ đề cho học sinh An (không tìm thấy: Lượng giác)"
        );
    }

    #[test]
    fn test_create_pathway_with_no_matches() {
        let (_dir, ops) = seeded_ops();
        let message =
            ops.create_custom_pathway("An", &["Lượng giác".to_string(), "Đạo hàm".to_string()]);
        assert_eq!(
            message,
            "Không tìm thấy chủ đề học tập nào phù hợp với: Lượng giác, Đạo hàm"
        );
        assert!(ops.store().read(tables::PATHWAYS).is_empty());
    }

    #[test]
    fn test_list_available_submissions_pending_only() {
        let (_dir, ops) = seeded_ops();
        let payload: Value = serde_json::from_str(&ops.list_available_submissions()).unwrap();
        assert_eq!(payload["total_pending"], 1);
        assert_eq!(payload["submissions"][0]["id"], "sub_001");
    }

    #[test]
    fn test_list_available_submissions_empty() {
        let (_dir, ops) = seeded_ops();
        ops.grade_submission("sub_001", 90.0, "Tốt");
        assert_eq!(
            ops.list_available_submissions(),
            "Không có bài nộp nào đang chờ chấm"
        );
    }

    #[test]
    fn test_activity_log_payload() {
        let (_dir, ops) = seeded_ops();
        ops.assign_exercise("An", "tứ giác", 3);

        let payload: Value =
            serde_json::from_str(&ops.get_student_activity_log("An", None)).unwrap();
        assert_eq!(payload["student_name"], "An");
        assert_eq!(payload["total_activities"], 1);
        assert_eq!(payload["activities"][0]["activity"], "assignment_created");
    }

    #[test]
    fn test_activity_log_empty_for_quiet_student() {
        let (_dir, ops) = seeded_ops();
        assert_eq!(
            ops.get_student_activity_log("Bình", None),
            "Không có hoạt động nào được ghi nhận cho học sinh Bình"
        );
    }

    #[test]
    fn test_activity_log_unknown_student() {
        let (_dir, ops) = seeded_ops();
        assert_eq!(
            ops.get_student_activity_log("Dũng", Some("today")),
            "Không tìm thấy học sinh có tên 'Dũng'"
        );
    }

    #[test]
    fn test_activity_log_today_filter() {
        let (_dir, ops) = seeded_ops();
        ops.store()
            .append(
                tables::ACTIVITY_LOGS,
                json!({
                    "timestamp": "2020-01-01T00:00:00+00:00",
                    "student_id": "student_001",
                    "activity": "assignment_created",
                    "details": {},
                }),
            )
            .unwrap();
        ops.assign_exercise("An", "tứ giác", 1);

        let all: Value = serde_json::from_str(&ops.get_student_activity_log("An", None)).unwrap();
        assert_eq!(all["total_activities"], 2);

        let today: Value =
            serde_json::from_str(&ops.get_student_activity_log("An", Some("today"))).unwrap();
        assert_eq!(today["total_activities"], 1);
    }
}
