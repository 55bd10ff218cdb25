//! Flat JSON table store backing the tutor tools.
//!
//! Each table is one JSON array file under the data directory. Missing or
//! malformed files read as empty so the demo works from a blank directory;
//! mutations rewrite the whole array. Single-writer trust model: no locks.

use chrono::Utc;
use isy_common::IsyError;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Table names, mapped to `<name>.json` under the data directory.
pub mod tables {
    pub const STUDENTS: &str = "students";
    pub const LEARNING_OBJECTS: &str = "learning_objects";
    pub const ASSIGNMENTS: &str = "assignments";
    pub const SUBMISSIONS: &str = "submissions";
    pub const REPORTS: &str = "reports";
    pub const PATHWAYS: &str = "pathways";
    pub const ACTIVITY_LOGS: &str = "activity_logs";
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{table}.json"))
    }

    /// Read a table, treating a missing or malformed file as empty.
    pub fn read(&self, table: &str) -> Vec<Value> {
        let path = self.table_path(table);
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Rewrite a table in full, pretty-printed.
    pub fn write(&self, table: &str, records: &[Value]) -> Result<(), IsyError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let raw = serde_json::to_string_pretty(records)?;
        std::fs::write(self.table_path(table), raw)?;
        Ok(())
    }

    /// Append one record to a table.
    pub fn append(&self, table: &str, record: Value) -> Result<(), IsyError> {
        let mut records = self.read(table);
        records.push(record);
        self.write(table, &records)
    }

    /// Append one entry to the activity log.
    pub fn log_activity(
        &self,
        student_id: &str,
        activity: &str,
        details: Value,
    ) -> Result<(), IsyError> {
        self.append(
            tables::ACTIVITY_LOGS,
            serde_json::json!({
                "timestamp": Utc::now().to_rfc3339(),
                "student_id": student_id,
                "activity": activity,
                "details": details,
            }),
        )
    }
}
