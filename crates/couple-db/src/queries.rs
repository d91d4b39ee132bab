use crate::Database;
use crate::models::{ConversationRow, MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, display_name) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, display_name),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_display_name(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT display_name FROM users WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    // -- Conversations --

    /// Fails with a UNIQUE violation if the invite code is already taken;
    /// callers regenerate the code and retry (see `is_unique_violation`).
    pub fn create_conversation(&self, id: &str, partner1_id: &str, invite_code: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, partner1_id, invite_code) VALUES (?1, ?2, ?3)",
                (id, partner1_id, invite_code),
            )?;
            Ok(())
        })
    }

    /// The conversation a user participates in, on either side of the pair.
    pub fn get_conversation_for_user(&self, user_id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, partner1_id, partner2_id, invite_code, created_at
                 FROM conversations
                 WHERE partner1_id = ?1 OR partner2_id = ?1",
            )?;
            stmt.query_row([user_id], conversation_from_row).optional()
        })
    }

    pub fn get_conversation_by_id(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, partner1_id, partner2_id, invite_code, created_at
                 FROM conversations
                 WHERE id = ?1",
            )?;
            stmt.query_row([id], conversation_from_row).optional()
        })
    }

    pub fn get_conversation_by_invite_code(&self, code: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, partner1_id, partner2_id, invite_code, created_at
                 FROM conversations
                 WHERE invite_code = ?1",
            )?;
            stmt.query_row([code], conversation_from_row).optional()
        })
    }

    /// Compare-and-set on the second partner slot. Exactly one of two
    /// concurrent joiners observes `true`; the guard also refuses to pair
    /// the creator with themselves.
    pub fn claim_partner_slot(&self, conversation_id: &str, joiner_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE conversations
                 SET partner2_id = ?2
                 WHERE id = ?1 AND partner2_id IS NULL AND partner1_id <> ?2",
                (conversation_id, joiner_id),
            )?;
            Ok(updated == 1)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                 (id, conversation_id, sender_id, original_content, interpreted_content, emotion_summary, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    &row.id,
                    &row.conversation_id,
                    &row.sender_id,
                    &row.original_content,
                    &row.interpreted_content,
                    &row.emotion_summary,
                    &row.created_at,
                ),
            )?;
            Ok(())
        })
    }

    /// Full feed, ascending. rowid breaks created_at ties so the feed
    /// reflects insertion order.
    pub fn get_messages(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, original_content, interpreted_content, emotion_summary, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([conversation_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        original_content: row.get(3)?,
                        interpreted_content: row.get(4)?,
                        emotion_summary: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

/// True when the error is a SQLite constraint violation (UNIQUE on
/// users.email or conversations.invite_code in this schema).
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // column is one of the fixed names above, never user input
    let sql = format!(
        "SELECT id, email, password, display_name, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            display_name: row.get(3)?,
            created_at: row.get(4)?,
        })
    })
    .optional()
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        partner1_id: row.get(1)?,
        partner2_id: row.get(2)?,
        invite_code: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let email = format!("{}@example.com", name);
        db.create_user(&id, &email, "argon2-hash", name).unwrap();
        id
    }

    fn add_conversation(db: &Database, partner1: &str, code: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_conversation(&id, partner1, code).unwrap();
        id
    }

    #[test]
    fn conversation_found_by_invite_code() {
        let db = test_db();
        let alex = add_user(&db, "alex");
        let conv = add_conversation(&db, &alex, "AB12CD");

        let row = db.get_conversation_by_invite_code("AB12CD").unwrap().unwrap();
        assert_eq!(row.id, conv);
        assert_eq!(row.partner1_id, alex);
        assert!(row.partner2_id.is_none());

        assert!(db.get_conversation_by_invite_code("ZZZZZZ").unwrap().is_none());
    }

    #[test]
    fn conversation_lookup_covers_both_partners() {
        let db = test_db();
        let alex = add_user(&db, "alex");
        let sam = add_user(&db, "sam");
        let conv = add_conversation(&db, &alex, "AB12CD");

        assert!(db.claim_partner_slot(&conv, &sam).unwrap());

        let by_creator = db.get_conversation_for_user(&alex).unwrap().unwrap();
        let by_joiner = db.get_conversation_for_user(&sam).unwrap().unwrap();
        assert_eq!(by_creator.id, conv);
        assert_eq!(by_joiner.id, conv);
        assert_eq!(by_joiner.partner2_id.as_deref(), Some(sam.as_str()));
    }

    #[test]
    fn claim_partner_slot_first_wins() {
        let db = test_db();
        let alex = add_user(&db, "alex");
        let sam = add_user(&db, "sam");
        let kim = add_user(&db, "kim");
        let conv = add_conversation(&db, &alex, "AB12CD");

        assert!(db.claim_partner_slot(&conv, &sam).unwrap());
        // The second joiner loses the race and must be told AlreadyPaired.
        assert!(!db.claim_partner_slot(&conv, &kim).unwrap());

        let row = db.get_conversation_by_id(&conv).unwrap().unwrap();
        assert_eq!(row.partner2_id.as_deref(), Some(sam.as_str()));
    }

    #[test]
    fn claim_partner_slot_rejects_creator() {
        let db = test_db();
        let alex = add_user(&db, "alex");
        let conv = add_conversation(&db, &alex, "AB12CD");

        assert!(!db.claim_partner_slot(&conv, &alex).unwrap());

        let row = db.get_conversation_by_id(&conv).unwrap().unwrap();
        assert!(row.partner2_id.is_none());
    }

    #[test]
    fn duplicate_invite_code_is_a_unique_violation() {
        let db = test_db();
        let alex = add_user(&db, "alex");
        let sam = add_user(&db, "sam");
        add_conversation(&db, &alex, "AB12CD");

        let id = Uuid::new_v4().to_string();
        let err = db.create_conversation(&id, &sam, "AB12CD").unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let db = test_db();
        add_user(&db, "alex");

        let id = Uuid::new_v4().to_string();
        let err = db
            .create_user(&id, "alex@example.com", "hash", "Alex Again")
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn feed_orders_by_created_at_then_insertion() {
        let db = test_db();
        let alex = add_user(&db, "alex");
        let sam = add_user(&db, "sam");
        let conv = add_conversation(&db, &alex, "AB12CD");
        assert!(db.claim_partner_slot(&conv, &sam).unwrap());

        let msg = |text: &str, sender: &str, at: &str| MessageRow {
            id: Uuid::new_v4().to_string(),
            conversation_id: conv.clone(),
            sender_id: sender.to_string(),
            original_content: text.to_string(),
            interpreted_content: text.to_string(),
            emotion_summary: String::new(),
            created_at: at.to_string(),
        };

        db.insert_message(&msg("second", &sam, "2026-08-06T10:00:01Z")).unwrap();
        db.insert_message(&msg("third", &alex, "2026-08-06T10:00:02Z")).unwrap();
        db.insert_message(&msg("fourth", &sam, "2026-08-06T10:00:02Z")).unwrap();
        db.insert_message(&msg("first", &alex, "2026-08-06T10:00:00Z")).unwrap();

        let feed = db.get_messages(&conv).unwrap();
        let order: Vec<&str> = feed.iter().map(|m| m.original_content.as_str()).collect();
        // created_at ascending; the 10:00:02 tie resolves by insertion order
        assert_eq!(order, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn user_found_by_email() {
        let db = test_db();
        let id = add_user(&db, "alex");

        let row = db.get_user_by_email("alex@example.com").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.display_name, "alex");

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
        assert_eq!(db.get_display_name(&id).unwrap().as_deref(), Some("alex"));
    }
}
