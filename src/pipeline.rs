// src/pipeline.rs

use crate::canonical::{self, SourceDocument};
use crate::config::{Config, InferenceSection, UploadSection};
use crate::error::ExtractionError;
use crate::inference::{InferenceRequest, InferenceService, TIMESHEET_PROMPT};
use crate::pdf::PdfProfile;
use crate::recovery;
use crate::report::{ExtractionReport, ReportMetadata};
use crate::timesheet::{EmployeeTimesheet, Normalizer};
use std::path::{Path, PathBuf};
use tracing::{Instrument, debug, info, info_span, warn};

/// Runs documents through canonicalize, infer, recover and normalize.
///
/// Holds only read-only settings, so one extractor can serve concurrent calls.
pub struct Extractor<S> {
    service: S,
    inference: InferenceSection,
    upload: UploadSection,
    normalizer: Normalizer,
}

impl<S: InferenceService> Extractor<S> {
    pub fn new(config: &Config, service: S) -> Self {
        Self {
            service,
            inference: config.inference.clone(),
            upload: config.upload.clone(),
            normalizer: Normalizer::new(config.normalize.total_tolerance),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Extract every timesheet record from one document. An empty list means
    /// the document held no recognizable timesheet data.
    pub async fn extract(
        &self,
        doc: SourceDocument,
    ) -> Result<Vec<EmployeeTimesheet>, ExtractionError> {
        let sha256 = doc.digest();
        let (records, _) = self.run(doc, &sha256).await?;
        Ok(records)
    }

    /// Same as [`extract`](Self::extract) for a file on disk. Unsupported
    /// and oversized files are rejected without reading them.
    pub async fn extract_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<EmployeeTimesheet>, ExtractionError> {
        let doc = self.load(path.as_ref())?;
        self.extract(doc).await
    }

    /// Report for one file on disk. A file that cannot be loaded gets a
    /// failed report like any other extraction failure.
    pub async fn report_path(&self, path: &Path) -> ExtractionReport {
        match self.load(path) {
            Ok(doc) => self.extract_report(doc).await,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load document");
                ExtractionReport::from_error(ReportMetadata::for_path(path), &e)
            }
        }
    }

    /// Batch over files on disk. The count is checked before any file is read.
    pub async fn report_paths(
        &self,
        paths: &[PathBuf],
    ) -> Result<Vec<ExtractionReport>, ExtractionError> {
        self.check_batch(paths.len())?;

        info!(count = paths.len(), "Processing batch");
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.report_path(path).await);
        }
        log_batch(&reports);
        Ok(reports)
    }

    /// Extract and wrap the outcome, success or failure, into a report.
    pub async fn extract_report(&self, doc: SourceDocument) -> ExtractionReport {
        let mut metadata = ReportMetadata::describe(&doc);
        let sha256 = metadata.sha256.clone().unwrap_or_default();

        match self.run(doc, &sha256).await {
            Ok((records, pdf)) => {
                metadata.pages = pdf.map(|p| p.pages);
                ExtractionReport::from_records(metadata, records)
            }
            Err(e) => {
                warn!(error = %e, sha256 = %sha256, "Extraction failed");
                ExtractionReport::from_error(metadata, &e)
            }
        }
    }

    /// Process a batch one document at a time. A failing document yields a
    /// failed report and does not stop the rest.
    pub async fn extract_batch(
        &self,
        docs: Vec<SourceDocument>,
    ) -> Result<Vec<ExtractionReport>, ExtractionError> {
        self.check_batch(docs.len())?;

        info!(count = docs.len(), "Processing batch");
        let mut reports = Vec::with_capacity(docs.len());
        for doc in docs {
            reports.push(self.extract_report(doc).await);
        }
        log_batch(&reports);
        Ok(reports)
    }

    fn check_batch(&self, count: usize) -> Result<(), ExtractionError> {
        let limit = self.upload.max_batch_files;
        if count > limit {
            return Err(ExtractionError::BatchTooLarge { count, limit });
        }
        Ok(())
    }

    fn check_size(&self, size: u64) -> Result<(), ExtractionError> {
        let limit = self.upload.max_file_size_bytes();
        if size > limit {
            return Err(ExtractionError::FileTooLarge { size, limit });
        }
        Ok(())
    }

    /// Extension and on-disk size are checked before the bytes are read.
    fn load(&self, path: &Path) -> Result<SourceDocument, ExtractionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        canonical::resolve_format(extension)?;
        self.check_size(std::fs::metadata(path)?.len())?;
        Ok(SourceDocument::from_path(path)?)
    }

    async fn run(
        &self,
        doc: SourceDocument,
        sha256: &str,
    ) -> Result<(Vec<EmployeeTimesheet>, Option<PdfProfile>), ExtractionError> {
        let span = info_span!(
            "extract",
            filename = doc.filename.as_deref().unwrap_or("-"),
            ext = %doc.extension,
            sha256 = %sha256,
        );
        self.run_inner(doc).instrument(span).await
    }

    async fn run_inner(
        &self,
        doc: SourceDocument,
    ) -> Result<(Vec<EmployeeTimesheet>, Option<PdfProfile>), ExtractionError> {
        // Cheap local checks first; none of them reach the network.
        canonical::resolve_format(&doc.extension)?;
        if doc.bytes.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        self.check_size(doc.bytes.len() as u64)?;

        let payload = canonical::canonicalize_document(doc)?;
        let pdf = payload.pdf;
        let request = InferenceRequest::new(payload, TIMESHEET_PROMPT, &self.inference)?;

        let text = self.service.infer(&request).await?;

        let Some(value) = recovery::recover(&text) else {
            info!("No JSON recovered, treating as no data");
            return Ok((Vec::new(), pdf));
        };

        let records = self.normalizer.normalize(&value);
        for (idx, record) in records.iter().enumerate() {
            let (filled, total) = record.coverage();
            debug!(
                idx,
                filled,
                total,
                total_hours = record.total_hours,
                days = record.week_hours.as_ref().map_or(0, Vec::len),
                "Record"
            );
        }
        info!(records = records.len(), "Extraction finished");
        Ok((records, pdf))
    }
}

fn log_batch(reports: &[ExtractionReport]) {
    let ok = reports.iter().filter(|r| r.success).count();
    info!(total = reports.len(), ok, "Batch complete");
}
