use crate::inference::InferenceError;
use thiserror::Error;

/// Everything `extract` can fail with. An empty record list is not an error.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("document is empty")]
    EmptyInput,

    #[error("document is {size} bytes, limit is {limit}")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("batch of {count} files exceeds the limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),

    /// Deployment fault: credentials or model id missing.
    #[error("inference unavailable: {0}")]
    InferenceUnavailable(#[source] InferenceError),

    #[error("inference transport failed: {0}")]
    Transport(#[source] InferenceError),
}

impl From<InferenceError> for ExtractionError {
    fn from(err: InferenceError) -> Self {
        if err.is_configuration() {
            Self::InferenceUnavailable(err)
        } else {
            Self::Transport(err)
        }
    }
}

impl ExtractionError {
    /// True for faults the uploader can correct (bad file, too big, ...).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::EmptyInput
                | Self::FileTooLarge { .. }
                | Self::BatchTooLarge { .. }
        )
    }
}
