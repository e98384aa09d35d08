use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::{DataCategory, UpsertOutcome};

pub const MAX_REPORTED_ERRORS: usize = 10;
pub const REPORT_SCHEMA_VERSION: &str = "v1";

pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_COMPLETED_WITH_ERRORS: &str = "COMPLETED_WITH_ERRORS";
pub const STATUS_FAILED: &str = "FAILED";

/// A single row that could not be written. The run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("row {line}: missing required column '{field}'")]
    MissingField { line: usize, field: &'static str },
    #[error("row {line}: invalid {field}: {message}")]
    InvalidField {
        line: usize,
        field: &'static str,
        message: String,
    },
    #[error("row {line}: {message}")]
    Rejected { line: usize, message: String },
}

impl RowError {
    pub fn rejected(line: usize, message: impl Into<String>) -> Self {
        Self::Rejected {
            line,
            message: message.into(),
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Self::MissingField { line, .. }
            | Self::InvalidField { line, .. }
            | Self::Rejected { line, .. } => *line,
        }
    }
}

/// Failures that stop a whole upload before or while rows are processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("upload contains no header row")]
    EmptyInput,
    #[error("failed to parse csv: {0}")]
    Csv(String),
    #[error("upload is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("no ingestion is defined for object key '{0}'")]
    UnknownCategory(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionReport {
    pub record_schema: String,
    pub category: DataCategory,
    pub source_key: String,
    pub source_fingerprint: String,
    pub rows_read: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    /// Record store outage that stopped the upload after `rows_read` rows
    /// were counted. Rows written before it stay written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl IngestionReport {
    pub fn new(category: DataCategory, source_key: impl Into<String>, body: &[u8]) -> Self {
        Self {
            record_schema: REPORT_SCHEMA_VERSION.to_string(),
            category,
            source_key: source_key.into(),
            source_fingerprint: content_fingerprint(body),
            rows_read: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            errors: Vec::new(),
            aborted: None,
        }
    }

    pub fn record_outcome(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Counts every failure; only the first few messages are retained.
    pub fn record_error(&mut self, error: &RowError) {
        self.failed += 1;
        tracing::warn!(
            event = "row_rejected",
            category = %self.category,
            source_key = %self.source_key,
            line = error.line(),
            error = %error,
        );
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(error.to_string());
        }
    }

    pub fn abort(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(
            event = "ingest_aborted",
            category = %self.category,
            source_key = %self.source_key,
            inserted = self.inserted,
            updated = self.updated,
            error = %message,
        );
        self.aborted = Some(message);
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Body returned by every handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub status: String,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<IngestionReport>,
}

impl HandlerResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            status: STATUS_FAILED.to_string(),
            errors: vec![message.into()],
            reports: Vec::new(),
        }
    }

    /// Merges per-object reports and fatal errors into one response. An
    /// aborted report counts as a fatal error but keeps its counts.
    pub fn from_outcomes(reports: Vec<IngestionReport>, fatal_errors: Vec<String>) -> Self {
        let fatal_errors: Vec<String> = fatal_errors
            .into_iter()
            .chain(reports.iter().filter_map(|report| {
                report.aborted.as_ref().map(|message| {
                    format!(
                        "{}: record store unavailable: {message}",
                        report.source_key
                    )
                })
            }))
            .collect();
        let any_row_failed = reports.iter().any(|report| report.failed > 0);
        let (status_code, status) = if !fatal_errors.is_empty() {
            (500, STATUS_FAILED)
        } else if any_row_failed {
            (200, STATUS_COMPLETED_WITH_ERRORS)
        } else {
            (200, STATUS_COMPLETED)
        };

        let errors = fatal_errors
            .into_iter()
            .chain(reports.iter().flat_map(|report| report.errors.iter().cloned()))
            .take(MAX_REPORTED_ERRORS)
            .collect();

        Self {
            status_code,
            status: status.to_string(),
            errors,
            reports,
        }
    }
}

pub fn content_fingerprint(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}
