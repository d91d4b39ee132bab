pub mod prompt;
pub mod provider;

pub use provider::{InterpreterConfig, Provider, ProviderKind};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Shown to the recipient when the model call could not be completed.
pub const FALLBACK_EMOTION_SUMMARY: &str = "Unable to analyze emotions at this time.";
pub const FALLBACK_COMMUNICATION_TIP: &str = "Listen with an open heart.";

/// Used when the caller did not supply a sender display name.
pub const DEFAULT_SENDER_NAME: &str = "Your partner";

/// Every provider call must resolve within this window; expiry feeds the
/// fallback path like any other failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The three-field contract every interpretation resolves to. Serializes
/// with the camelCase wire names the web client consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretationResult {
    pub interpreted_message: String,
    pub emotion_summary: String,
    pub communication_tip: String,
}

impl InterpretationResult {
    /// The terminal error-absorption value: the recipient sees the sender's
    /// own wording and a placeholder summary instead of an error page.
    pub fn fallback(original_message: &str) -> Self {
        Self {
            interpreted_message: original_message.to_string(),
            emotion_summary: FALLBACK_EMOTION_SUMMARY.to_string(),
            communication_tip: FALLBACK_COMMUNICATION_TIP.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("no model credential configured")]
    MissingCredential,

    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned status {0}")]
    Provider(reqwest::StatusCode),

    #[error("model reply contained no text")]
    EmptyCompletion,

    #[error("model reply was not the expected JSON shape: {0}")]
    MalformedOutput(#[from] serde_json::Error),
}

/// Rewrites a raw message into a softer phrasing plus an emotion summary
/// and a response tip, via a single stateless model call per invocation.
///
/// `interpret` never fails: every error mode collapses into
/// [`InterpretationResult::fallback`]. The surrounding chat flow has no
/// retry or queuing logic, so this is the sole place failure is absorbed.
pub struct Interpreter {
    provider: Provider,
    http: reqwest::Client,
}

impl Interpreter {
    /// Constructed once at startup and injected into the handlers that
    /// need it. A missing credential selects the disabled provider (with
    /// a startup warning) rather than failing here.
    pub fn new(config: InterpreterConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let provider = Provider::from_config(config);

        Ok(Self { provider, http })
    }

    pub async fn interpret(
        &self,
        original_message: &str,
        sender_name: &str,
    ) -> InterpretationResult {
        match self.try_interpret(original_message, sender_name).await {
            Ok(result) => result,
            Err(err) => {
                warn!("Interpretation fell back to the original text: {}", err);
                InterpretationResult::fallback(original_message)
            }
        }
    }

    async fn try_interpret(
        &self,
        original_message: &str,
        sender_name: &str,
    ) -> Result<InterpretationResult, InterpretError> {
        let prompt = prompt::build(original_message, sender_name);
        let reply = self.provider.complete(&self.http, &prompt).await?;
        parse_reply(&reply)
    }
}

/// Extract the three-field result from the model's raw reply text. The
/// prompt asks for bare JSON, but some providers wrap it in Markdown code
/// fences anyway; those are stripped before parsing.
pub fn parse_reply(raw: &str) -> Result<InterpretationResult, InterpretError> {
    let body = strip_code_fences(raw);
    Ok(serde_json::from_str(body)?)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // The opening fence may carry a language tag ("```json")
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "interpretedMessage": "I feel unheard when we talk about this.",
        "emotionSummary": "There is frustration here, and underneath it a longing to be understood.",
        "communicationTip": "Reflect back what you heard before responding."
    }"#;

    #[test]
    fn parses_bare_json_reply() {
        let result = parse_reply(REPLY).unwrap();
        assert_eq!(result.interpreted_message, "I feel unheard when we talk about this.");
        assert_eq!(result.communication_tip, "Reflect back what you heard before responding.");
    }

    #[test]
    fn fenced_reply_parses_identically_to_bare() {
        let fenced = format!("```json\n{}\n```", REPLY);
        assert_eq!(parse_reply(&fenced).unwrap(), parse_reply(REPLY).unwrap());

        let untagged = format!("```\n{}\n```", REPLY);
        assert_eq!(parse_reply(&untagged).unwrap(), parse_reply(REPLY).unwrap());
    }

    #[test]
    fn fence_without_closing_marker_still_parses() {
        let open_only = format!("```json\n{}", REPLY);
        assert_eq!(parse_reply(&open_only).unwrap(), parse_reply(REPLY).unwrap());
    }

    #[test]
    fn prose_reply_is_malformed() {
        let err = parse_reply("I'm sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, InterpretError::MalformedOutput(_)));
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = parse_reply(r#"{"interpretedMessage": "hi"}"#).unwrap_err();
        assert!(matches!(err, InterpretError::MalformedOutput(_)));
    }

    #[test]
    fn fallback_preserves_original_exactly() {
        let original = "You NEVER listen to me!! \"quoted\" and\nnewlined";
        let result = InterpretationResult::fallback(original);
        assert_eq!(result.interpreted_message, original);
        assert_eq!(result.emotion_summary, FALLBACK_EMOTION_SUMMARY);
        assert_eq!(result.communication_tip, FALLBACK_COMMUNICATION_TIP);
    }

    #[test]
    fn result_serializes_with_camel_case_wire_names() {
        let json = serde_json::to_value(InterpretationResult::fallback("hi")).unwrap();
        assert!(json.get("interpretedMessage").is_some());
        assert!(json.get("emotionSummary").is_some());
        assert!(json.get("communicationTip").is_some());
    }

    fn disabled_interpreter() -> Interpreter {
        Interpreter::new(InterpreterConfig {
            provider: ProviderKind::Anthropic,
            api_key: None,
            model: None,
            base_url: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn interpret_without_credential_returns_identity_fallback() {
        let interpreter = disabled_interpreter();
        let result = interpreter
            .interpret("You never listen to me!", "Alex")
            .await;
        assert_eq!(result.interpreted_message, "You never listen to me!");
        assert_eq!(result.communication_tip, FALLBACK_COMMUNICATION_TIP);
    }

    #[tokio::test]
    async fn interpret_never_fails_on_awkward_input() {
        let interpreter = disabled_interpreter();
        for message in ["\"}{", "```", "a", "🙃🙃🙃", "line\nbreaks\neverywhere"] {
            let result = interpreter.interpret(message, DEFAULT_SENDER_NAME).await;
            assert_eq!(result.interpreted_message, message);
        }
    }
}
