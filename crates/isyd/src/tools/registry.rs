//! Tool registry: declared tools and dispatch.
//!
//! Dispatch never fails. An unrecognized name returns a sentinel string
//! that flows back into the conversation like any other result, so a
//! hallucinated tool name cannot abort the loop.

use super::tutor_ops::TutorOps;
use isy_common::{ArgMap, ArgValue, FunctionDecl};
use serde_json::json;
use std::collections::HashMap;

pub struct ToolRegistry {
    definitions: HashMap<String, FunctionDecl>,
    ops: TutorOps,
}

impl ToolRegistry {
    pub fn new(ops: TutorOps) -> Self {
        let definitions = declarations()
            .into_iter()
            .map(|decl| (decl.name.clone(), decl))
            .collect();
        Self { definitions, ops }
    }

    /// Declarations handed to the transport when a session opens.
    pub fn declarations(&self) -> Vec<FunctionDecl> {
        // stable order for the wire
        declarations()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    /// Execute one tool call with normalized arguments.
    pub fn dispatch(&self, name: &str, args: &ArgMap) -> String {
        if !self.definitions.contains_key(name) {
            return format!("Unknown function: {name}");
        }

        match name {
            "assign_exercise" => self.ops.assign_exercise(
                text_arg(args, "student_name"),
                text_arg(args, "learning_object_title"),
                args.get("num_questions")
                    .and_then(ArgValue::as_u32)
                    .unwrap_or(0),
            ),
            "get_student_activity_log" => self.ops.get_student_activity_log(
                text_arg(args, "student_name"),
                args.get("date_range").and_then(ArgValue::as_text),
            ),
            "grade_submission" => self.ops.grade_submission(
                text_arg(args, "submission_id"),
                args.get("score")
                    .and_then(ArgValue::as_f64)
                    .unwrap_or(-1.0),
                text_arg(args, "feedback_text"),
            ),
            "add_note_to_report" => self
                .ops
                .add_note_to_report(text_arg(args, "student_name"), text_arg(args, "note_text")),
            "create_custom_pathway" => self.ops.create_custom_pathway(
                text_arg(args, "student_name"),
                &args
                    .get("learning_object_titles")
                    .and_then(ArgValue::as_text_list)
                    .unwrap_or_default(),
            ),
            "list_available_submissions" => self.ops.list_available_submissions(),
            _ => format!("Unknown function: {name}"),
        }
    }
}

fn text_arg<'a>(args: &'a ArgMap, key: &str) -> &'a str {
    args.get(key).and_then(ArgValue::as_text).unwrap_or("")
}

/// The six declared tools, schemas on the wire verbatim.
fn declarations() -> Vec<FunctionDecl> {
    vec![
        FunctionDecl::new(
            "assign_exercise",
            "Assign exercises to a student based on learning object title",
            json!({
                "type": "object",
                "properties": {
                    "student_name": {
                        "type": "string",
                        "description": "The name of the student to assign exercises to"
                    },
                    "learning_object_title": {
                        "type": "string",
                        "description": "The title of the learning object/topic"
                    },
                    "num_questions": {
                        "type": "integer",
                        "description": "Number of questions to assign"
                    }
                },
                "required": ["student_name", "learning_object_title", "num_questions"]
            }),
        ),
        FunctionDecl::new(
            "get_student_activity_log",
            "Get activity log for a specific student",
            json!({
                "type": "object",
                "properties": {
                    "student_name": {
                        "type": "string",
                        "description": "The name of the student"
                    },
                    "date_range": {
                        "type": "string",
                        "description": "Date range filter ('today', 'this_week'; omit for all)"
                    }
                },
                "required": ["student_name"]
            }),
        ),
        FunctionDecl::new(
            "grade_submission",
            "Grade a student submission and provide feedback",
            json!({
                "type": "object",
                "properties": {
                    "submission_id": {
                        "type": "string",
                        "description": "The ID of the submission to grade"
                    },
                    "score": {
                        "type": "number",
                        "description": "The score to assign (0-100)"
                    },
                    "feedback_text": {
                        "type": "string",
                        "description": "Detailed feedback text for the student"
                    }
                },
                "required": ["submission_id", "score", "feedback_text"]
            }),
        ),
        FunctionDecl::new(
            "add_note_to_report",
            "Add a tutor note to student's progress report",
            json!({
                "type": "object",
                "properties": {
                    "student_name": {
                        "type": "string",
                        "description": "The name of the student"
                    },
                    "note_text": {
                        "type": "string",
                        "description": "The note text to add to the student's report"
                    }
                },
                "required": ["student_name", "note_text"]
            }),
        ),
        FunctionDecl::new(
            "create_custom_pathway",
            "Create a custom learning pathway for a student with specific learning objects",
            json!({
                "type": "object",
                "properties": {
                    "student_name": {
                        "type": "string",
                        "description": "The name of the student"
                    },
                    "learning_object_titles": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of learning object titles to include in the pathway"
                    }
                },
                "required": ["student_name", "learning_object_titles"]
            }),
        ),
        FunctionDecl::new(
            "list_available_submissions",
            "List all available submissions that can be graded",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ),
    ]
}
