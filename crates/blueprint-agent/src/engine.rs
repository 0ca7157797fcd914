use std::sync::Arc;

use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use serde::{Deserialize, Serialize};

use blueprint_core::{Error, Result, Settings};

const AZURE_API_VERSION: &str = "2024-02-01";

/// A text-completion capability: one instruction string in, one text out.
///
/// Implementations report unreachable or failing backends as
/// `Error::GenerativeCapabilityUnavailable`. A response that arrives but is
/// empty or unusable is returned as-is; repairing it is the validator's job.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, instruction: &str) -> Result<String>;

    /// Short name for logs, e.g. "openai/gpt-4o".
    fn describe(&self) -> String;
}

/// Build the generator described by `settings`.
pub fn generator_from_settings(settings: &Settings) -> Result<Arc<dyn Generator>> {
    settings.require_credentials()?;
    match settings.provider.as_str() {
        "azure" | "openai_compat" => Ok(Arc::new(OpenAiCompatGenerator::from_settings(settings)?)),
        _ => Ok(Arc::new(LlmGenerator::from_settings(settings)?)),
    }
}

/// Stand-in used when settings are incomplete. Every call fails with the
/// configuration error found at startup.
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Generator for Unconfigured {
    async fn generate(&self, _instruction: &str) -> Result<String> {
        Err(Error::Configuration(self.reason.clone()))
    }

    fn describe(&self) -> String {
        "unconfigured".to_string()
    }
}

// --- llm crate backends ---

fn map_backend(provider: &str) -> Result<LLMBackend> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(Error::Configuration(format!("unknown provider: {other}"))),
    }
}

/// Generator backed by the `llm` crate's provider clients.
pub struct LlmGenerator {
    provider: String,
    model: String,
    api_key: String,
    endpoint: Option<String>,
    temperature: f32,
}

impl LlmGenerator {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        map_backend(&settings.provider)?;
        Ok(Self {
            provider: settings.provider.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, instruction: &str) -> Result<String> {
        let backend = map_backend(&self.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.model)
            .temperature(self.temperature);

        if !self.api_key.is_empty() {
            builder = builder.api_key(&self.api_key);
        }
        if let Some(url) = &self.endpoint {
            builder = builder.base_url(url);
        }

        let llm = builder
            .build()
            .map_err(|e| Error::Configuration(format!("build LLM: {e}")))?;

        let messages = vec![ChatMessage::user().content(instruction).build()];

        let response = llm.chat(&messages).await.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "model call failed");
            Error::GenerativeCapabilityUnavailable(format!(
                "unable to reach {} model: {e}",
                self.provider
            ))
        })?;

        Ok(response.text().unwrap_or_default())
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

// --- OpenAI-compatible HTTP backends (Azure, gateways) ---

#[derive(Debug, Clone, PartialEq, Eq)]
enum Auth {
    /// Azure style `api-key` header
    ApiKeyHeader(String),
    Bearer(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat-completions reply. `choices` is required so that a body which is
/// not a completions wrapper (e.g. a gateway returning the plan directly)
/// fails to decode and is passed through as-is.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: ChatResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for Azure deployments and OpenAI-compatible
/// gateways, with explicit control over certificate verification.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    url: String,
    auth: Auth,
    /// Sent in the body for plain gateways; Azure selects it by deployment URL
    model: Option<String>,
    label: String,
    temperature: f32,
}

impl OpenAiCompatGenerator {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let endpoint = settings
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/'))
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "provider '{}' requires an endpoint",
                    settings.provider
                ))
            })?;

        let (url, auth, model) = if settings.provider == "azure" {
            (
                format!(
                    "{endpoint}/openai/deployments/{}/chat/completions?api-version={AZURE_API_VERSION}",
                    settings.model
                ),
                Auth::ApiKeyHeader(settings.api_key.clone()),
                None,
            )
        } else {
            (
                format!("{endpoint}/chat/completions"),
                Auth::Bearer(settings.api_key.clone()),
                Some(settings.model.clone()),
            )
        };

        if settings.accept_invalid_certs {
            tracing::warn!(endpoint = %endpoint, "TLS certificate verification disabled for model endpoint");
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Configuration(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            auth,
            model,
            label: format!("{}/{}", settings.provider, settings.model),
            temperature: settings.temperature,
        })
    }

    fn request_body<'a>(&'a self, instruction: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: self.model.as_deref(),
            messages: vec![ChatRequestMessage {
                role: "user",
                content: instruction,
            }],
            temperature: self.temperature,
        }
    }
}

/// Pull the first choice's text out of a chat-completions reply.
///
/// A wrapper without text (no choices, or `content: null` after a content
/// filter hit) yields an empty answer so the validator falls back. Anything
/// that isn't a wrapper is returned untouched.
fn completion_text(body: String) -> String {
    match serde_json::from_str::<ChatResponse>(&body) {
        Ok(reply) => {
            let content = reply
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            if content.is_empty() {
                tracing::warn!("model reply carried no message content");
            }
            content
        }
        Err(_) => body,
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    async fn generate(&self, instruction: &str) -> Result<String> {
        let mut request = self.client.post(&self.url).json(&self.request_body(instruction));
        request = match &self.auth {
            Auth::ApiKeyHeader(key) => request.header("api-key", key),
            Auth::Bearer(key) => request.bearer_auth(key),
        };

        let unavailable = |detail: String| {
            tracing::error!(target_url = %self.url, detail = %detail, "model call failed");
            Error::GenerativeCapabilityUnavailable(detail)
        };

        let response = request
            .send()
            .await
            .map_err(|e| unavailable(format!("unable to reach {}: {e}", self.label)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!(
                "{} returned {status}: {body}",
                self.label
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| unavailable(format!("reading response from {}: {e}", self.label)))?;
        Ok(completion_text(body))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
