use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            display_name    TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY,
            partner1_id     TEXT NOT NULL REFERENCES users(id),
            partner2_id     TEXT REFERENCES users(id),
            invite_code     TEXT NOT NULL UNIQUE,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_partner1
            ON conversations(partner1_id);
        CREATE INDEX IF NOT EXISTS idx_conversations_partner2
            ON conversations(partner2_id);

        -- Messages are append-only: no UPDATE or DELETE statement exists
        -- anywhere in the query layer.
        CREATE TABLE IF NOT EXISTS messages (
            id                  TEXT PRIMARY KEY,
            conversation_id     TEXT NOT NULL REFERENCES conversations(id),
            sender_id           TEXT NOT NULL REFERENCES users(id),
            original_content    TEXT NOT NULL,
            interpreted_content TEXT NOT NULL,
            emotion_summary     TEXT NOT NULL,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
