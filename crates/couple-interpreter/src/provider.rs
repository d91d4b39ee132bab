use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::InterpretError;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Three short strings fit comfortably in this budget.
const MAX_COMPLETION_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

/// Interpreter configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl InterpreterConfig {
    pub fn from_env() -> Self {
        let provider = match std::env::var("COUPLE_LLM_PROVIDER") {
            Ok(value) => ProviderKind::parse(&value).unwrap_or_else(|| {
                warn!("Unknown COUPLE_LLM_PROVIDER '{}', using anthropic", value);
                ProviderKind::Anthropic
            }),
            Err(_) => ProviderKind::Anthropic,
        };

        let key_var = match provider {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        };

        Self {
            provider,
            api_key: std::env::var(key_var).ok().filter(|k| !k.is_empty()),
            model: std::env::var("COUPLE_LLM_MODEL").ok(),
            base_url: std::env::var("COUPLE_LLM_BASE_URL").ok(),
        }
    }
}

/// The configured model backend. Both live variants satisfy the same
/// contract: given the built prompt, return the model's raw reply text.
pub enum Provider {
    Anthropic {
        api_key: String,
        model: String,
    },
    OpenAi {
        api_key: String,
        base_url: String,
        model: String,
    },
    /// No credential configured. Every call reports MissingCredential,
    /// which the interpreter absorbs into the fallback result; messages
    /// still flow, unrewritten.
    Disabled,
}

impl Provider {
    pub fn from_config(config: InterpreterConfig) -> Self {
        let Some(api_key) = config.api_key else {
            warn!(
                "No model API key configured; interpretation is disabled and \
                 messages will pass through unchanged"
            );
            return Self::Disabled;
        };

        match config.provider {
            ProviderKind::Anthropic => Self::Anthropic {
                api_key,
                model: config
                    .model
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            },
            ProviderKind::OpenAi => Self::OpenAi {
                api_key,
                base_url: config
                    .base_url
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                model: config
                    .model
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            },
        }
    }

    /// One completion round trip. Returns the reply text, still unparsed.
    pub async fn complete(
        &self,
        http: &reqwest::Client,
        prompt: &str,
    ) -> Result<String, InterpretError> {
        match self {
            Self::Disabled => Err(InterpretError::MissingCredential),
            Self::Anthropic { api_key, model } => {
                anthropic_complete(http, api_key, model, prompt).await
            }
            Self::OpenAi {
                api_key,
                base_url,
                model,
            } => openai_complete(http, api_key, base_url, model, prompt).await,
        }
    }
}

// -- Anthropic messages API --

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

async fn anthropic_complete(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<String, InterpretError> {
    let request = AnthropicRequest {
        model,
        max_tokens: MAX_COMPLETION_TOKENS,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
    };

    let response = http
        .post(ANTHROPIC_API_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(InterpretError::Provider(response.status()));
    }

    let body: AnthropicResponse = response.json().await?;
    body.content
        .into_iter()
        .find(|block| block.kind == "text" && !block.text.is_empty())
        .map(|block| block.text)
        .ok_or(InterpretError::EmptyCompletion)
}

// -- OpenAI-compatible chat completions API --

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

async fn openai_complete(
    http: &reqwest::Client,
    api_key: &str,
    base_url: &str,
    model: &str,
    prompt: &str,
) -> Result<String, InterpretError> {
    let request = OpenAiRequest {
        model,
        max_tokens: MAX_COMPLETION_TOKENS,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
    };

    let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
    let response = http
        .post(&url)
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(InterpretError::Provider(response.status()));
    }

    let body: OpenAiResponse = response.json().await?;
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.is_empty())
        .ok_or(InterpretError::EmptyCompletion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!(ProviderKind::parse("Anthropic"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse("OPENAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("mystery"), None);
    }

    #[test]
    fn missing_key_disables_the_provider() {
        let provider = Provider::from_config(InterpreterConfig {
            provider: ProviderKind::OpenAi,
            api_key: None,
            model: None,
            base_url: None,
        });
        assert!(matches!(provider, Provider::Disabled));
    }

    #[test]
    fn defaults_fill_in_model_and_base_url() {
        let provider = Provider::from_config(InterpreterConfig {
            provider: ProviderKind::OpenAi,
            api_key: Some("sk-test".into()),
            model: None,
            base_url: None,
        });
        match provider {
            Provider::OpenAi { base_url, model, .. } => {
                assert_eq!(base_url, DEFAULT_OPENAI_BASE_URL);
                assert_eq!(model, DEFAULT_OPENAI_MODEL);
            }
            _ => panic!("expected OpenAi provider"),
        }
    }

    #[test]
    fn anthropic_request_wire_shape() {
        let request = AnthropicRequest {
            model: DEFAULT_ANTHROPIC_MODEL,
            max_tokens: MAX_COMPLETION_TOKENS,
            messages: vec![ChatMessage {
                role: "user",
                content: "prompt text",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "prompt text");
    }

    #[test]
    fn anthropic_reply_text_block_is_extracted() {
        let body: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{\"ok\":true}"}]}"#,
        )
        .unwrap();
        let text = body
            .content
            .into_iter()
            .find(|b| b.kind == "text" && !b.text.is_empty())
            .map(|b| b.text);
        assert_eq!(text.as_deref(), Some("{\"ok\":true}"));
    }
}
