use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, display_name: String },

    /// A new message was appended to a conversation.
    /// Both content variants travel together; the client renders
    /// interpreted_content for the recipient and original_content for
    /// the sender (with a display-only reveal toggle).
    MessageCreate {
        id: Uuid,
        conversation_id: Uuid,
        sender_id: Uuid,
        original_content: String,
        interpreted_content: String,
        emotion_summary: String,
        created_at: DateTime<Utc>,
    },

    /// The second partner consumed the invite and the conversation is
    /// now paired.
    PartnerJoined {
        conversation_id: Uuid,
        user_id: Uuid,
        display_name: String,
    },
}

impl GatewayEvent {
    /// Returns the conversation_id if this event is scoped to a specific
    /// conversation. Events that return `None` are connection-local and
    /// bypass the subscription filter.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { conversation_id, .. } => Some(*conversation_id),
            Self::PartnerJoined { conversation_id, .. } => Some(*conversation_id),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Follow a conversation. Sent after creating or joining one mid-session;
    /// on connect the server subscribes the client to its conversation
    /// automatically.
    Subscribe { conversation_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_create_is_conversation_scoped() {
        let conversation_id = Uuid::new_v4();
        let event = GatewayEvent::MessageCreate {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: Uuid::new_v4(),
            original_content: "You never listen to me!".into(),
            interpreted_content: "I feel unheard when we talk.".into(),
            emotion_summary: "Frustration and a need to be heard.".into(),
            created_at: Utc::now(),
        };
        assert_eq!(event.conversation_id(), Some(conversation_id));
    }

    #[test]
    fn ready_is_not_scoped() {
        let event = GatewayEvent::Ready {
            user_id: Uuid::new_v4(),
            display_name: "Alex".into(),
        };
        assert_eq!(event.conversation_id(), None);
    }

    #[test]
    fn command_wire_shape_is_tagged() {
        let json = r#"{"type":"Identify","data":{"token":"abc"}}"#;
        let cmd: GatewayCommand = serde_json::from_str(json).unwrap();
        match cmd {
            GatewayCommand::Identify { token } => assert_eq!(token, "abc"),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
