//! Timesheet extraction: one document in, validated employee timesheets out.
//!
//! A document is canonicalized into an image or document payload, sent with a
//! fixed instruction to a multimodal model in a single call, the JSON in the
//! reply is recovered however it was wrapped, and the result is normalized
//! into [`EmployeeTimesheet`] records.

pub mod canonical;
pub mod config;
pub mod error;
pub mod inference;
pub mod pdf;
pub mod pipeline;
pub mod recovery;
pub mod report;
pub mod timesheet;

pub use canonical::{CanonicalPayload, DocumentFormat, SourceDocument};
pub use config::Config;
pub use error::ExtractionError;
pub use inference::{BedrockClient, InferenceError, InferenceRequest, InferenceService};
pub use pipeline::Extractor;
pub use report::ExtractionReport;
pub use timesheet::{DailyHours, EmployeeTimesheet, Weekday};
