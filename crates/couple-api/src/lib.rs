pub mod auth;
pub mod conversations;
pub mod error;
pub mod interpret;
pub mod messages;
pub mod middleware;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use couple_db::Database;
use tracing::warn;
use uuid::Uuid;

/// Run a blocking DB closure off the async runtime.
pub(crate) async fn blocking_db<T, F>(db: &Arc<Database>, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    match tokio::task::spawn_blocking(move || f(&db)).await {
        Ok(result) => result,
        Err(e) => Err(anyhow::anyhow!("spawn_blocking join error: {}", e)),
    }
}

pub(crate) fn parse_uuid(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}' on {}: {}", raw, context, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite default timestamps are "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_sqlite_default_timestamps() {
        let rfc = parse_timestamp("2026-08-06T10:00:00+00:00", "test");
        let sqlite = parse_timestamp("2026-08-06 10:00:00", "test");
        assert_eq!(rfc, sqlite);
    }

    #[test]
    fn corrupt_timestamp_degrades_to_default() {
        assert_eq!(parse_timestamp("not-a-date", "test"), DateTime::<Utc>::default());
    }
}
