use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart;
use serde::Deserialize;

use crate::config::RemoteEngineConfig;
use crate::utils::error::EngineError;

/// A single text-recognition backend. Engines are best-effort: the pipeline
/// collects every success and only logs failures.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn recognize(&self, image: &[u8]) -> Result<String, EngineError>;
}

/// What the hosting process claims to support for in-process recognition.
/// Injected at pipeline construction so orchestration is testable without
/// probing the environment.
#[derive(Debug, Clone, Copy)]
pub struct LocalCapability {
    pub text_detection: bool,
}

impl LocalCapability {
    /// Capability as compiled into this binary.
    pub fn detect() -> Self {
        Self {
            text_detection: cfg!(feature = "engine-tesseract"),
        }
    }

    pub fn none() -> Self {
        Self {
            text_detection: false,
        }
    }
}

const COVERAGE_TARGET_CHARS: usize = 400;

/// Deterministic 0-100 score for raw OCR output, weighted 70% legibility
/// (share of characters a passport page plausibly contains) and 30%
/// coverage (how much text came back at all, saturating at 400 chars).
/// Both engines are scored this way so the numbers stay comparable.
pub fn estimate_confidence(text: &str) -> u8 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let total = trimmed.chars().count();
    let legible = trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || "/-:.,<'()".contains(*c))
        .count();
    let legibility = legible as f32 / total as f32;
    let coverage = total.min(COVERAGE_TARGET_CHARS) as f32 / COVERAGE_TARGET_CHARS as f32;
    (legibility * 70.0 + coverage * 30.0).round() as u8
}

/// Client for the external OCR service: one multipart POST per image, no
/// retries. The endpoint, API key and engine flags all come from config.
pub struct RemoteOcrEngine {
    client: reqwest::Client,
    config: RemoteEngineConfig,
}

impl RemoteOcrEngine {
    pub fn new(config: RemoteEngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteParseResponse {
    #[serde(default)]
    parsed_results: Vec<RemoteParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<RemoteErrorMessage>,
}

impl RemoteParseResponse {
    /// One transcript from however many pages the service parsed, trailing
    /// whitespace stripped per page.
    fn joined_text(&self) -> String {
        self.parsed_results
            .iter()
            .map(|r| r.parsed_text.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteParsedResult {
    #[serde(default)]
    parsed_text: String,
}

// The service reports errors as either a single string or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl RemoteErrorMessage {
    fn join(&self) -> String {
        match self {
            RemoteErrorMessage::One(message) => message.clone(),
            RemoteErrorMessage::Many(messages) => messages.join("; "),
        }
    }
}

#[async_trait]
impl RecognitionEngine for RemoteOcrEngine {
    fn name(&self) -> &str {
        "remote"
    }

    async fn recognize(&self, image: &[u8]) -> Result<String, EngineError> {
        let part = multipart::Part::bytes(image.to_vec())
            .file_name("passport.png")
            .mime_str("image/png")
            .map_err(|e| EngineError::Request(format!("building upload part: {}", e)))?;
        let form = multipart::Form::new()
            .text("apikey", self.config.api_key.clone())
            .text("language", self.config.language.clone())
            .text("OCREngine", self.config.engine.to_string())
            .text("detectOrientation", self.config.detect_orientation.to_string())
            .text("isOverlayRequired", "false")
            .part("file", part);

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::Request(format!("{}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Service(format!("HTTP {}", status)));
        }

        let body: RemoteParseResponse = response
            .json()
            .await
            .map_err(|e| EngineError::MalformedResponse(format!("{}", e)))?;

        if body.is_errored_on_processing {
            let detail = body
                .error_message
                .map(|m| m.join())
                .unwrap_or_else(|| "unspecified processing error".to_string());
            return Err(EngineError::Service(detail));
        }

        let text = body.joined_text();
        debug!("remote engine returned {} characters", text.chars().count());
        Ok(text)
    }
}

#[cfg(feature = "engine-tesseract")]
pub use tesseract_engine::TesseractEngine;

#[cfg(feature = "engine-tesseract")]
mod tesseract_engine {
    use std::io::Write;

    use async_trait::async_trait;
    use tempfile::NamedTempFile;
    use tesseract::Tesseract;

    use super::RecognitionEngine;
    use crate::utils::error::EngineError;

    /// On-host recognition through the Tesseract C library. The library
    /// blocks, so each call runs on the blocking thread pool.
    pub struct TesseractEngine {
        language: String,
    }

    impl TesseractEngine {
        pub fn new(language: impl Into<String>) -> Self {
            Self {
                language: language.into(),
            }
        }

        fn run_blocking(language: &str, image: &[u8]) -> Result<String, EngineError> {
            let mut temp_file = NamedTempFile::new()
                .map_err(|e| EngineError::Recognition(format!("temp file: {}", e)))?;
            temp_file
                .write_all(image)
                .map_err(|e| EngineError::Recognition(format!("temp file write: {}", e)))?;
            let path = temp_file
                .path()
                .to_str()
                .ok_or_else(|| EngineError::Recognition("temp path is not valid UTF-8".to_string()))?;

            let tess = Tesseract::new(None, Some(language))
                .map_err(|e| EngineError::Unavailable(format!("tesseract init: {}", e)))?;
            let mut tess = tess
                .set_image(path)
                .map_err(|e| EngineError::Recognition(format!("set image: {}", e)))?;
            tess.get_text()
                .map_err(|e| EngineError::Recognition(format!("get text: {}", e)))
        }
    }

    #[async_trait]
    impl RecognitionEngine for TesseractEngine {
        fn name(&self) -> &str {
            "local"
        }

        async fn recognize(&self, image: &[u8]) -> Result<String, EngineError> {
            let language = self.language.clone();
            let image = image.to_vec();
            tokio::task::spawn_blocking(move || Self::run_blocking(&language, &image))
                .await
                .map_err(|e| EngineError::Recognition(format!("blocking task: {}", e)))?
        }
    }
}
