//! Maps uploaded files onto the two payload shapes the inference service
//! accepts: an image block or a document block, each tagged with a format.

use crate::error::ExtractionError;
use crate::pdf::{self, PdfProfile};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Extensions accepted at the boundary, in the order they are documented.
pub const SUPPORTED_EXTENSIONS: [&str; 15] = [
    "pdf", "csv", "doc", "docx", "xls", "xlsx", "html", "htm", "txt", "md", "png", "jpg", "jpeg",
    "gif", "webp",
];

/// Format identifiers understood by the inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Csv,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Html,
    Txt,
    Md,
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl DocumentFormat {
    /// Fixed extension table. `htm` folds into `html`, `jpg` into `jpeg`.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let format = match normalize_extension(extension).as_str() {
            "pdf" => Self::Pdf,
            "csv" => Self::Csv,
            "doc" => Self::Doc,
            "docx" => Self::Docx,
            "xls" => Self::Xls,
            "xlsx" => Self::Xlsx,
            "html" | "htm" => Self::Html,
            "txt" => Self::Txt,
            "md" => Self::Md,
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            _ => return None,
        };
        Some(format)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Csv => "csv",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Html => "html",
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::Gif | Self::Webp)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-case, trimmed, without a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Raw upload plus the extension the caller declared for it.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub filename: Option<String>,
}

impl SourceDocument {
    pub fn new(bytes: Vec<u8>, extension: &str) -> Self {
        Self {
            bytes,
            extension: normalize_extension(extension),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Read a file, taking the extension from its name.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let doc = Self::new(bytes, extension);
        Ok(match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => doc.with_filename(name),
            None => doc,
        })
    }

    /// Hex SHA-256 of the content.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// The normalised unit sent across the inference boundary.
#[derive(Debug, Clone)]
pub struct CanonicalPayload {
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
    /// Structural profile, present only for PDFs that lopdf could load.
    pub pdf: Option<PdfProfile>,
}

impl CanonicalPayload {
    pub fn is_image(&self) -> bool {
        self.format.is_image()
    }
}

/// Canonicalize a file on disk. The extension is checked before the file is read.
pub fn canonicalize(
    path: impl AsRef<Path>,
    extension: &str,
) -> Result<CanonicalPayload, ExtractionError> {
    let format = resolve_format(extension)?;
    let bytes = std::fs::read(path.as_ref())?;
    Ok(build_payload(format, bytes))
}

/// Canonicalize an in-memory upload.
pub fn canonicalize_document(doc: SourceDocument) -> Result<CanonicalPayload, ExtractionError> {
    let format = resolve_format(&doc.extension)?;
    Ok(build_payload(format, doc.bytes))
}

pub(crate) fn resolve_format(extension: &str) -> Result<DocumentFormat, ExtractionError> {
    DocumentFormat::from_extension(extension)
        .ok_or_else(|| ExtractionError::UnsupportedFormat(normalize_extension(extension)))
}

fn build_payload(format: DocumentFormat, bytes: Vec<u8>) -> CanonicalPayload {
    let pdf = match format {
        DocumentFormat::Pdf => pdf::profile_pdf(&bytes),
        _ => None,
    };

    if let Some(profile) = &pdf {
        info!(
            pages = profile.pages,
            image_only = profile.image_only_pages,
            scanned = profile.looks_scanned(),
            "PDF profile"
        );
    }
    debug!(
        format = %format,
        is_image = format.is_image(),
        bytes = bytes.len(),
        "Canonical payload ready"
    );

    CanonicalPayload { format, bytes, pdf }
}
