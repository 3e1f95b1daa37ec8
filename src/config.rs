use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Process-wide settings. Built once at startup and handed to each component
/// by reference; nothing in the pipeline reads the environment on its own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceSection,
    pub upload: UploadSection,
    pub normalize: NormalizeSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSection {
    pub region: String,
    /// Overrides the regional Bedrock Runtime URL (proxies, VPC endpoints).
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    // Model id candidates, highest priority first.
    pub claude_model_id: Option<String>,
    pub bedrock_claude_model: Option<String>,
    pub llm_model_id: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
    /// Name attached to document content blocks.
    pub document_name: String,
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            api_key: None,
            claude_model_id: None,
            bedrock_claude_model: None,
            llm_model_id: None,
            max_tokens: 4096,
            temperature: 0.1,
            top_p: 0.9,
            timeout_secs: 120,
            document_name: "timesheet-doc".to_string(),
        }
    }
}

impl InferenceSection {
    /// First non-blank model id from the priority chain.
    pub fn model_id(&self) -> Option<&str> {
        [
            &self.claude_model_id,
            &self.bedrock_claude_model,
            &self.llm_model_id,
        ]
        .into_iter()
        .filter_map(|candidate| candidate.as_deref())
        .map(str::trim)
        .find(|id| !id.is_empty())
    }

    pub fn base_url(&self) -> String {
        match self.endpoint.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub max_file_size_mb: u64,
    pub max_batch_files: usize,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            max_batch_files: 10,
        }
    }
}

impl UploadSection {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeSection {
    /// Declared totals further than this from the day sum are replaced by the sum.
    pub total_tolerance: f64,
}

impl Default for NormalizeSection {
    fn default() -> Self {
        Self {
            total_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the file if it exists, otherwise start from defaults. Environment
    /// overrides are applied either way.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut cfg = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Overlay deployment settings from environment-style lookups.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let inf = &mut self.inference;

        if let Some(v) = get("CLAUDE_MODEL_ID") {
            inf.claude_model_id = Some(v);
        }
        if let Some(v) = get("BEDROCK_CLAUDE_MODEL") {
            inf.bedrock_claude_model = Some(v);
        }
        if let Some(v) = get("LLM_MODEL_ID") {
            inf.llm_model_id = Some(v);
        }
        if let Some(v) = get("LLM_API_URL") {
            inf.endpoint = Some(v);
        }
        if let Some(v) = get("AWS_REGION") {
            inf.region = v;
        }
        // First credential found wins.
        if let Some(v) = ["BEDROCK_CLAUDE_API_KEY", "AWS_BEARER_TOKEN_BEDROCK", "API_KEY"]
            .into_iter()
            .find_map(|key| get(key))
        {
            inf.api_key = Some(v);
        }
    }
}
