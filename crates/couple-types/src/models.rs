use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// The pairing session between exactly two participants. partner2_id is
/// None until the invite is consumed, and transitions at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub partner1_id: Uuid,
    pub partner2_id: Option<Uuid>,
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_paired(&self) -> bool {
        self.partner2_id.is_some()
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.partner1_id == user_id || self.partner2_id == Some(user_id)
    }
}

/// A stored message. Immutable once created; the recipient sees
/// interpreted_content by default and may reveal original_content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub original_content: String,
    pub interpreted_content: String,
    pub emotion_summary: String,
    pub created_at: DateTime<Utc>,
}
