//! Check generation over an OpenAI-compatible `/chat/completions` endpoint.
//! Works against OpenAI itself and against a local Ollama server.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{CheckError, CheckGenerator, CheckRequest, ComprehensionCheck};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

const REQUEST_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str = "You are a helpful tutor. Generate a single multiple-choice question based on the provided text to test comprehension. Return ONLY a valid JSON object with the following structure: { question: string, options: string[], correctOptionIndex: number, explanation: string }.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenAi,
    Ollama,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "openai",
            AiProvider::Ollama => "ollama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => DEFAULT_OPENAI_URL,
            AiProvider::Ollama => DEFAULT_OLLAMA_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => DEFAULT_OPENAI_MODEL,
            AiProvider::Ollama => DEFAULT_OLLAMA_MODEL,
        }
    }
}

impl std::str::FromStr for AiProvider {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "openai" => Ok(AiProvider::OpenAi),
            "ollama" => Ok(AiProvider::Ollama),
            other => Err(anyhow::anyhow!("unknown AI provider '{other}'")),
        }
    }
}

/// Resolved provider settings handed to the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub provider: AiProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self::for_provider(AiProvider::OpenAi)
    }
}

impl AiConfig {
    pub fn for_provider(provider: AiProvider) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
        }
    }

    /// Fills unset fields with the provider defaults. Ollama never carries a key.
    pub fn build(
        provider: AiProvider,
        api_key: Option<String>,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            provider,
            api_key: match provider {
                AiProvider::OpenAi => non_empty(api_key),
                AiProvider::Ollama => None,
            },
            base_url: non_empty(base_url).unwrap_or_else(|| provider.default_base_url().into()),
            model: non_empty(model).unwrap_or_else(|| provider.default_model().into()),
        }
    }
}

pub struct ChatCompletionsGenerator {
    client: Client,
    config: AiConfig,
}

impl ChatCompletionsGenerator {
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        info!(
            "Check generation via {} at {} (model {})",
            config.provider.as_str(),
            config.base_url,
            config.model
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CheckGenerator for ChatCompletionsGenerator {
    async fn generate(&self, request: &CheckRequest) -> Result<ComprehensionCheck, CheckError> {
        let bearer = match (self.config.provider, self.config.api_key.as_deref()) {
            (AiProvider::OpenAi, Some(key)) => key.to_string(),
            (AiProvider::OpenAi, None) => {
                return Err(CheckError::MissingCredentials(
                    self.config.provider.as_str().into(),
                ))
            }
            // Ollama ignores the header but OpenAI-compatible clients always send one
            (AiProvider::Ollama, _) => "ollama".to_string(),
        };

        debug!("Generating check for unit {}", request.unit_id);

        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Text: \"{}\"", request.unit_text) },
            ],
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {bearer}"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CheckError::Status { status, body });
        }

        let raw = response.json::<Value>().await?;
        let content = raw["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CheckError::Malformed("no content in completion".into()))?;

        parse_check_content(content)
    }
}

/// Parses the model's message content into a check, tolerating a markdown
/// code fence around the JSON.
pub fn parse_check_content(content: &str) -> Result<ComprehensionCheck, CheckError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let check: ComprehensionCheck = serde_json::from_str(unfenced)
        .map_err(|err| CheckError::Malformed(format!("invalid check JSON: {err}")))?;

    if !check.is_well_formed() {
        return Err(CheckError::Malformed(format!(
            "{} options with correct index {}",
            check.options.len(),
            check.correct_option_index
        )));
    }

    Ok(check)
}
