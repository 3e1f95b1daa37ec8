// src/inference.rs

use crate::canonical::{CanonicalPayload, DocumentFormat};
use crate::config::InferenceSection;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Instruction sent alongside every document. The model reads the document
/// and produces the structured result in the same call.
pub const TIMESHEET_PROMPT: &str = r#"Analyze this timesheet document and extract the timesheet data of EVERY employee or client it contains.

Return ONLY a JSON object with exactly this shape:
{
  "employees": [
    {
      "client_id": "string or null",
      "client_name": "string or null",
      "employee_name": "string or null",
      "period": "string or null",
      "week_start": "YYYY-MM-DD or null",
      "week_end": "YYYY-MM-DD or null",
      "week_hours": [
        {"day": "Mon", "hours": 8.0},
        {"day": "Tue", "hours": 8.0},
        {"day": "Wed", "hours": 8.0},
        {"day": "Thu", "hours": 8.0},
        {"day": "Fri", "hours": 8.0},
        {"day": "Sat", "hours": 0.0},
        {"day": "Sun", "hours": 0.0}
      ] or null,
      "total_hours": number
    }
  ]
}

Rules:
- "total_hours" is required for every entry.
- "week_hours", when present, has seven entries using only Mon, Tue, Wed, Thu, Fri, Sat, Sun.
- Hours are decimal numbers: convert 8h30m to 8.5 and 7:45 to 7.75.
- A day with no hours recorded is 0.0.
- If the document contains no timesheet data, return {"employees": []}. Never omit the "employees" key.
- Output the JSON object and nothing else: no markdown fences, no commentary."#;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference client not configured: {0}")]
    ClientNotConfigured(String),

    #[error("no model id configured (claude_model_id, bedrock_claude_model or llm_model_id)")]
    ModelNotConfigured,

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("inference service returned {status}: {body}")]
    Service { status: u16, body: String },
}

impl InferenceError {
    /// Operator has to fix the deployment; retrying will not help.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ClientNotConfigured(_) | Self::ModelNotConfigured)
    }
}

/// One inference call: the payload, the instruction, and the resolved model.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub payload: CanonicalPayload,
    pub instruction: String,
    pub model_id: String,
}

impl InferenceRequest {
    /// Fails fast when none of the model id candidates is set.
    pub fn new(
        payload: CanonicalPayload,
        instruction: impl Into<String>,
        settings: &InferenceSection,
    ) -> Result<Self, InferenceError> {
        let model_id = settings
            .model_id()
            .ok_or(InferenceError::ModelNotConfigured)?
            .to_string();
        Ok(Self {
            payload,
            instruction: instruction.into(),
            model_id,
        })
    }
}

/// Anything that can turn one request into the model's raw text.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn infer(&self, request: &InferenceRequest) -> Result<String, InferenceError>;
}

/// Install ring as the process-wide rustls provider. Safe to call repeatedly.
pub fn install_crypto_provider() {
    // Err only means a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

// ---------------------------------------------------------------------------
// Converse wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest<'a> {
    messages: Vec<ConverseMessage<'a>>,
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
struct ConverseMessage<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum ContentBlock<'a> {
    Image {
        format: DocumentFormat,
        source: Source,
    },
    Document {
        format: DocumentFormat,
        name: &'a str,
        source: Source,
    },
    Text(&'a str),
}

#[derive(Debug, Serialize)]
struct Source {
    /// Base64, as the JSON transport requires.
    bytes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

/// Client for the Bedrock Runtime Converse API.
pub struct BedrockClient {
    http: Client,
    base_url: String,
    api_key: String,
    document_name: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl BedrockClient {
    /// Build the transport. Missing credentials surface here, at startup,
    /// rather than on the first upload.
    pub fn new(settings: &InferenceSection) -> Result<Self, InferenceError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| InferenceError::ClientNotConfigured("no API key set".to_string()))?
            .to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| InferenceError::ClientNotConfigured(e.to_string()))?;

        let base_url = settings.base_url();
        info!(url = %base_url, "Inference client ready");

        Ok(Self {
            http,
            base_url,
            api_key,
            document_name: settings.document_name.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
        })
    }

    fn converse_url(&self, model_id: &str) -> String {
        format!(
            "{}/model/{}/converse",
            self.base_url,
            urlencoding::encode(model_id)
        )
    }

    fn build_body<'a>(&'a self, request: &'a InferenceRequest) -> ConverseRequest<'a> {
        let payload = &request.payload;
        let source = Source {
            bytes: general_purpose::STANDARD.encode(&payload.bytes),
        };
        let block = if payload.is_image() {
            ContentBlock::Image {
                format: payload.format,
                source,
            }
        } else {
            ContentBlock::Document {
                format: payload.format,
                name: &self.document_name,
                source,
            }
        };

        ConverseRequest {
            messages: vec![ConverseMessage {
                role: "user",
                content: vec![block, ContentBlock::Text(&request.instruction)],
            }],
            inference_config: InferenceConfig {
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                top_p: self.top_p,
            },
        }
    }
}

#[async_trait]
impl InferenceService for BedrockClient {
    async fn infer(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        info!(
            model = %request.model_id,
            format = %request.payload.format,
            is_image = request.payload.is_image(),
            bytes = request.payload.bytes.len(),
            "Sending document to inference service"
        );

        let response = self
            .http
            .post(self.converse_url(&request.model_id))
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let text = response_text(&body);
        info!(chars = text.len(), "Received model response");
        debug!(response = %text, "Full model response");
        Ok(text)
    }
}

/// Pull `output.message.content[0].text` out of a Converse response. When the
/// body has another shape the whole body is returned so nothing is lost.
pub fn response_text(body: &str) -> String {
    let text = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.pointer("/output/message/content/0/text")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
    });

    match text {
        Some(text) => text,
        None => {
            warn!(
                preview = %body.chars().take(500).collect::<String>(),
                "Unexpected response shape, passing raw body downstream"
            );
            body.to_string()
        }
    }
}
