/// Database row types — these map directly to SQLite rows.
/// Distinct from couple-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub partner1_id: String,
    pub partner2_id: Option<String>,
    pub invite_code: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub original_content: String,
    pub interpreted_content: String,
    pub emotion_summary: String,
    pub created_at: String,
}
