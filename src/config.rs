//! Configuration for document-field extraction.
//!
//! All behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`] and immutable afterwards. The pipeline never
//! reads environment variables or other ambient state — whatever the
//! process decides at startup is captured here once and passed into every
//! component, which keeps concurrent requests free of shared mutable state
//! and makes two runs diffable from their configs alone.

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one extraction pipeline instance.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use scanfields::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .tessdata_path("./tessdata")
///     .language("tur+eng")
///     .model("llama3.1")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Directory holding Tesseract `*.traineddata` files. Default: `./tessdata`.
    ///
    /// Validated before any page is processed: extraction fails closed with
    /// a configuration error if the directory or a language file is absent,
    /// rather than producing silently empty text.
    pub tessdata_path: PathBuf,

    /// Tesseract language identifier. Default: `"eng"`.
    ///
    /// Combined script sets use `+`, e.g. `"tur+eng"` for documents mixing
    /// Turkish and English. Each `+`-separated language must have a
    /// matching `<lang>.traineddata` file under [`Self::tessdata_path`].
    pub language: String,

    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    ///
    /// 300 DPI is the Tesseract sweet spot for body text; scanned contracts
    /// with small print can need more, but every step up quadruples pixel
    /// count and OCR time per page.
    pub dpi: u32,

    /// Convert each page to grayscale before recognition. Default: true.
    ///
    /// Tesseract binarises internally, but handing it a grayscale image
    /// avoids colour-channel noise from scan artefacts and stamps.
    pub grayscale: bool,

    /// Base URL of the LLM chat endpoint. Default: `http://localhost:11434`.
    pub base_url: String,

    /// Model identifier sent with each chat request. Default: `llama3.1`.
    pub model: String,

    /// Per-HTTP-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Total LLM attempts per request (first try included). Default: 3.
    ///
    /// Transient failures (5xx, network, unparseable JSON) consume attempts
    /// with exponential backoff between them; terminal failures return
    /// immediately regardless of how many attempts remain.
    pub max_attempts: u32,

    /// Custom system prompt. If `None`, uses the built-in default
    /// ([`crate::prompts::DEFAULT_SYSTEM_PROMPT`]).
    pub system_prompt: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            tessdata_path: PathBuf::from("./tessdata"),
            language: "eng".to_string(),
            dpi: 300,
            grayscale: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            api_timeout_secs: 60,
            max_attempts: 3,
            system_prompt: None,
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The `+`-separated languages of [`Self::language`], in order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.language.split('+').filter(|l| !l.is_empty())
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn tessdata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tessdata_path = path.into();
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn grayscale(mut self, v: bool) -> Self {
        self.config.grayscale = v;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractionError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ExtractionError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_attempts == 0 {
            return Err(ExtractionError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.language.trim().is_empty() || c.languages().count() == 0 {
            return Err(ExtractionError::InvalidConfig(
                "OCR language must be set, e.g. \"eng\" or \"tur+eng\"".into(),
            ));
        }
        if c.base_url.trim().is_empty() {
            return Err(ExtractionError::InvalidConfig(
                "LLM base URL must be set".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(ExtractionError::InvalidConfig(
                "LLM model must be set".into(),
            ));
        }
        Ok(self.config)
    }
}
