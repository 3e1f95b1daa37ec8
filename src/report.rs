//! Caller-facing summary of one extraction, in the shape upload clients expect.

use crate::canonical::{SourceDocument, normalize_extension};
use crate::error::ExtractionError;
use crate::timesheet::EmployeeTimesheet;
use serde::Serialize;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const NO_DATA_MESSAGE: &str = "No timesheet data found in document";

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub filename: Option<String>,
    pub file_type: String,
    pub employees_count: usize,
    /// Absent when the file could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub success: bool,
    pub message: String,
    pub data: Vec<EmployeeTimesheet>,
    pub metadata: ReportMetadata,
    pub processed_at: String,
}

impl ReportMetadata {
    /// Describe a document before it is handed to the pipeline.
    pub fn describe(doc: &SourceDocument) -> Self {
        Self {
            filename: doc.filename.clone(),
            file_type: doc.extension.clone(),
            employees_count: 0,
            sha256: Some(doc.digest()),
            pages: None,
        }
    }

    /// Describe a file that was rejected before its bytes were loaded.
    pub fn for_path(path: &Path) -> Self {
        Self {
            filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            file_type: normalize_extension(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default(),
            ),
            employees_count: 0,
            sha256: None,
            pages: None,
        }
    }
}

impl ExtractionReport {
    /// An empty record list is reported as "no data", not as a fault.
    pub fn from_records(mut metadata: ReportMetadata, records: Vec<EmployeeTimesheet>) -> Self {
        let count = records.len();
        metadata.employees_count = count;
        let (success, message) = if count == 0 {
            (false, NO_DATA_MESSAGE.to_string())
        } else {
            (
                true,
                format!("Extracted timesheet data for {count} employee(s)"),
            )
        };
        Self {
            success,
            message,
            data: records,
            metadata,
            processed_at: now_rfc3339(),
        }
    }

    pub fn from_error(metadata: ReportMetadata, err: &ExtractionError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: Vec::new(),
            metadata,
            processed_at: now_rfc3339(),
        }
    }
}

fn now_rfc3339() -> String {
    // Rfc3339 only fails for years outside 0..=9999.
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
