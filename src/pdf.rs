// src/pdf.rs

use lopdf::{Document, ObjectId};
use serde::Serialize;
use tracing::{debug, warn};

/// Pages at or above this share of image-only pages mark the PDF as scanned.
const SCANNED_RATIO: f64 = 0.8;

/// Structural facts about a PDF payload, used for logging and report metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PdfProfile {
    pub pages: usize,
    pub image_only_pages: usize,
}

impl PdfProfile {
    pub fn image_only_ratio(&self) -> f64 {
        if self.pages == 0 {
            return 0.0;
        }
        self.image_only_pages as f64 / self.pages as f64
    }

    /// Every (or nearly every) page is a bare image, i.e. a scan.
    pub fn looks_scanned(&self) -> bool {
        self.pages > 0 && self.image_only_ratio() >= SCANNED_RATIO
    }
}

/// Load the PDF with lopdf and count its pages. Returns `None` when the bytes
/// are not a loadable PDF; the payload is forwarded unchanged either way.
pub fn profile_pdf(pdf_bytes: &[u8]) -> Option<PdfProfile> {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "Could not profile PDF, sending as-is");
            return None;
        }
    };

    let pages = doc.get_pages();
    let image_only_pages = pages
        .values()
        .filter(|id| is_image_only(&doc, **id))
        .count();

    let profile = PdfProfile {
        pages: pages.len(),
        image_only_pages,
    };
    debug!(
        pages = profile.pages,
        image_only = profile.image_only_pages,
        ratio = format!("{:.2}", profile.image_only_ratio()),
        "Scanned-page analysis"
    );
    Some(profile)
}

/// A page whose `Resources` carry XObject images but no fonts has no text
/// layer, so it is almost certainly a scan.
fn is_image_only(doc: &Document, page_id: ObjectId) -> bool {
    let Ok(page_obj) = doc.get_object(page_id) else {
        return false;
    };
    let Ok(page_dict) = page_obj.as_dict() else {
        return false;
    };

    let resource = |key: &[u8]| {
        page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .and_then(|res| res.get(key).ok())
            .and_then(|o| doc.dereference(o).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .is_some_and(|d| !d.is_empty())
    };

    resource(b"XObject") && !resource(b"Font")
}
