use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use uuid::Uuid;

use couple_db::models::ConversationRow;
use couple_db::queries::is_unique_violation;
use couple_types::api::{Claims, ConversationResponse};
use couple_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{blocking_db, parse_timestamp, parse_uuid};

const INVITE_CODE_LEN: usize = 6;
const INVITE_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Collisions in a 36^6 space are rare; the UNIQUE constraint catches them
/// and we regenerate.
const INVITE_CODE_ATTEMPTS: u32 = 5;

fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_ALPHABET[rng.random_range(0..INVITE_CODE_ALPHABET.len())] as char)
        .collect()
}

/// POST /conversations — start a conversation and mint its invite code.
/// A user participates in at most one conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let existing = blocking_db(&state.db, move |db| db.get_conversation_for_user(&uid)).await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "You already have a conversation.".into(),
        ));
    }

    let conversation_id = Uuid::new_v4();

    for _ in 0..INVITE_CODE_ATTEMPTS {
        let code = generate_invite_code();
        let cid = conversation_id.to_string();
        let uid = claims.sub.to_string();
        let insert_code = code.clone();

        match blocking_db(&state.db, move |db| {
            db.create_conversation(&cid, &uid, &insert_code)
        })
        .await
        {
            Ok(()) => {
                let response = ConversationResponse {
                    id: conversation_id,
                    partner1_id: claims.sub,
                    partner2_id: None,
                    invite_code: code,
                    partner_name: None,
                    created_at: chrono::Utc::now(),
                };
                return Ok((StatusCode::CREATED, Json(response)));
            }
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::Internal(anyhow::anyhow!(
        "could not allocate a unique invite code after {} attempts",
        INVITE_CODE_ATTEMPTS
    )))
}

/// GET /conversations/me — the caller's conversation, if any.
pub async fn my_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let row = blocking_db(&state.db, move |db| db.get_conversation_for_user(&uid))
        .await?
        .ok_or(ApiError::NotFound)?;

    let response = to_response(&state, row, claims.sub).await;
    Ok(Json(response))
}

/// GET /conversations/{conversation_id} — membership-gated fetch; a
/// non-participant learns nothing, not even that the id exists.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let cid = conversation_id.to_string();
    let row = blocking_db(&state.db, move |db| db.get_conversation_by_id(&cid))
        .await?
        .ok_or(ApiError::NotFound)?;

    if !is_participant(&row, claims.sub) {
        return Err(ApiError::NotFound);
    }

    let response = to_response(&state, row, claims.sub).await;
    Ok(Json(response))
}

/// POST /invites/{code}/join — consume an invite. An existing participant
/// (the creator included) is routed straight back to the conversation with
/// no state change; otherwise the partner slot is claimed by compare-and-set
/// so exactly one of two racing joiners wins.
pub async fn join_conversation(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup_code = code.clone();
    let row = blocking_db(&state.db, move |db| {
        db.get_conversation_by_invite_code(&lookup_code)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    if is_participant(&row, claims.sub) {
        let response = to_response(&state, row, claims.sub).await;
        return Ok(Json(response));
    }

    if row.partner2_id.is_some() {
        return Err(ApiError::Conflict(
            "This conversation already has two partners.".into(),
        ));
    }

    let cid = row.id.clone();
    let uid = claims.sub.to_string();
    let claimed = blocking_db(&state.db, move |db| db.claim_partner_slot(&cid, &uid)).await?;
    if !claimed {
        // Lost the race to another joiner between lookup and claim
        return Err(ApiError::Conflict(
            "This conversation already has two partners.".into(),
        ));
    }

    let cid = row.id.clone();
    let row = blocking_db(&state.db, move |db| db.get_conversation_by_id(&cid))
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("conversation vanished after join")))?;

    state.dispatcher.broadcast(GatewayEvent::PartnerJoined {
        conversation_id: parse_uuid(&row.id, "conversation"),
        user_id: claims.sub,
        display_name: claims.name.clone(),
    });

    let response = to_response(&state, row, claims.sub).await;
    Ok(Json(response))
}

pub(crate) fn is_participant(row: &ConversationRow, user_id: Uuid) -> bool {
    let uid = user_id.to_string();
    row.partner1_id == uid || row.partner2_id.as_deref() == Some(uid.as_str())
}

async fn to_response(state: &AppState, row: ConversationRow, viewer: Uuid) -> ConversationResponse {
    let partner_name = resolve_partner_name(state, &row, viewer).await;

    ConversationResponse {
        id: parse_uuid(&row.id, "conversation"),
        partner1_id: parse_uuid(&row.partner1_id, "conversation partner1"),
        partner2_id: row
            .partner2_id
            .as_deref()
            .map(|id| parse_uuid(id, "conversation partner2")),
        invite_code: row.invite_code,
        partner_name,
        created_at: parse_timestamp(&row.created_at, "conversation"),
    }
}

async fn resolve_partner_name(
    state: &AppState,
    row: &ConversationRow,
    viewer: Uuid,
) -> Option<String> {
    let viewer = viewer.to_string();
    let partner_id = if row.partner1_id == viewer {
        row.partner2_id.clone()?
    } else {
        row.partner1_id.clone()
    };

    blocking_db(&state.db, move |db| db.get_display_name(&partner_id))
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_codes_use_the_short_uppercase_alphabet() {
        for _ in 0..100 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LEN);
            assert!(code.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn participant_check_covers_creator_joiner_and_stranger() {
        let alex = Uuid::new_v4();
        let sam = Uuid::new_v4();
        let row = ConversationRow {
            id: Uuid::new_v4().to_string(),
            partner1_id: alex.to_string(),
            partner2_id: Some(sam.to_string()),
            invite_code: "AB12CD".into(),
            created_at: "2026-08-06 10:00:00".into(),
        };

        assert!(is_participant(&row, alex));
        assert!(is_participant(&row, sam));
        assert!(!is_participant(&row, Uuid::new_v4()));
    }
}
