use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared across couple-api (REST middleware) and couple-gateway
/// (WebSocket Identify). Canonical definition lives here in couple-types to
/// eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub token: String,
}

// -- Conversations --

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub partner1_id: Uuid,
    pub partner2_id: Option<Uuid>,
    pub invite_code: String,
    /// Display name of the viewer's partner, once paired.
    pub partner_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub original_content: String,
    pub interpreted_content: String,
    pub emotion_summary: String,
    pub created_at: DateTime<Utc>,
}

// -- Interpretation --

/// Wire contract of POST /interpret. Field names are camelCase on the wire;
/// the original product shipped this shape to its web client.
#[derive(Debug, Deserialize)]
pub struct InterpretRequest {
    pub message: Option<String>,
    #[serde(rename = "senderName")]
    pub sender_name: Option<String>,
}

// -- Errors --

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpret_request_accepts_missing_sender_name() {
        let req: InterpretRequest =
            serde_json::from_str(r#"{"message": "hello"}"#).unwrap();
        assert_eq!(req.message.as_deref(), Some("hello"));
        assert!(req.sender_name.is_none());
    }

    #[test]
    fn interpret_request_reads_camel_case_sender_name() {
        let req: InterpretRequest =
            serde_json::from_str(r#"{"message": "hi", "senderName": "Alex"}"#).unwrap();
        assert_eq!(req.sender_name.as_deref(), Some("Alex"));
    }
}
