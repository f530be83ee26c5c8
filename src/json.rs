use serde::{Deserialize, Serialize};

use crate::batch::{BatchReport, EditOutcome, EditRequest, OutcomeStatus};

/// Batch edit request as read by the `apply` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Identifier echoed back in the response; `"auto"` generates one
    #[serde(default = "auto_execution_id")]
    pub execution_id: String,
    /// BLAKE3 checksum the file must have before any edit is applied
    #[serde(default)]
    pub expected_checksum: Option<String>,
    pub edits: Vec<EditRequest>,
}

fn auto_execution_id() -> String {
    "auto".to_string()
}

/// Per-edit entry of a `BatchResponse`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResultJson {
    pub index: usize,
    pub line_start: usize,
    pub line_end: usize,
    /// `"success"` or `"failed"`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_shift: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&EditOutcome> for EditResultJson {
    fn from(outcome: &EditOutcome) -> Self {
        let (status, line_shift, reason) = match &outcome.status {
            OutcomeStatus::Succeeded { line_shift } => ("success", Some(*line_shift), None),
            OutcomeStatus::Failed { reason } => ("failed", None, Some(reason.clone())),
        };

        Self {
            index: outcome.index,
            line_start: outcome.original_line_start,
            line_end: outcome.original_line_end,
            status: status.to_string(),
            line_shift,
            reason,
        }
    }
}

/// Structured result of the `apply` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub execution_id: String,
    /// False only when the whole batch was rejected
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_line_shift: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_checksum: Option<String>,
    pub edits: Vec<EditResultJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResponse {
    /// Response for a committed batch
    pub fn from_report(execution_id: String, report: &BatchReport) -> Self {
        Self {
            execution_id,
            success: true,
            summary: Some(report.summary()),
            success_count: report.success_count,
            failure_count: report.failure_count,
            total_line_shift: report.total_line_shift(),
            initial_checksum: Some(report.initial_checksum.clone()),
            final_checksum: Some(report.final_checksum.clone()),
            edits: report.outcomes.iter().map(EditResultJson::from).collect(),
            error: None,
        }
    }

    /// Response for a batch that was rejected before anything was written
    pub fn failure(execution_id: String, error: String) -> Self {
        Self {
            execution_id,
            success: false,
            summary: None,
            success_count: 0,
            failure_count: 0,
            total_line_shift: 0,
            initial_checksum: None,
            final_checksum: None,
            edits: Vec::new(),
            error: Some(error),
        }
    }
}

/// Generate a fresh execution id (UUID v4)
pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Resolve `"auto"` into a generated id, keeping any other value
pub fn resolve_execution_id(requested: &str) -> String {
    if requested == "auto" {
        generate_execution_id()
    } else {
        requested.to_string()
    }
}
