use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use couple_db::models::MessageRow;
use couple_types::api::{Claims, MessageResponse, SendMessageRequest};
use couple_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::conversations::is_participant;
use crate::error::ApiError;
use crate::{blocking_db, parse_timestamp, parse_uuid};

/// POST /conversations/{conversation_id}/messages — interpret, store,
/// broadcast. The interpreter never fails (it falls back to the original
/// text), so a model outage cannot lose a message.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Message is required".into()));
    }

    let conversation = member_conversation(&state, conversation_id, claims.sub).await?;
    if conversation.partner2_id.is_none() {
        return Err(ApiError::Conflict(
            "Your partner has not joined yet. Share the invite link first.".into(),
        ));
    }

    let interpretation = state.interpreter.interpret(&req.content, &claims.name).await;
    // The communication tip is display-time-only data; the stored message
    // keeps the rewrite and the emotion summary.

    let message_id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let row = MessageRow {
        id: message_id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: claims.sub.to_string(),
        original_content: req.content.clone(),
        interpreted_content: interpretation.interpreted_message.clone(),
        emotion_summary: interpretation.emotion_summary.clone(),
        created_at: now.to_rfc3339(),
    };
    blocking_db(&state.db, move |db| db.insert_message(&row)).await?;

    // Notify both viewers of the conversation
    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        id: message_id,
        conversation_id,
        sender_id: claims.sub,
        original_content: req.content.clone(),
        interpreted_content: interpretation.interpreted_message.clone(),
        emotion_summary: interpretation.emotion_summary.clone(),
        created_at: now,
    });

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            conversation_id,
            sender_id: claims.sub,
            original_content: req.content,
            interpreted_content: interpretation.interpreted_message,
            emotion_summary: interpretation.emotion_summary,
            created_at: now,
        }),
    ))
}

/// GET /conversations/{conversation_id}/messages — the full feed,
/// ascending. Both content variants are returned for every message; the
/// client decides which to render for whom.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    member_conversation(&state, conversation_id, claims.sub).await?;

    let cid = conversation_id.to_string();
    let rows = blocking_db(&state.db, move |db| db.get_messages(&cid)).await?;

    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| MessageResponse {
            id: parse_uuid(&row.id, "message"),
            conversation_id: parse_uuid(&row.conversation_id, "message conversation"),
            sender_id: parse_uuid(&row.sender_id, "message sender"),
            original_content: row.original_content,
            interpreted_content: row.interpreted_content,
            emotion_summary: row.emotion_summary,
            created_at: parse_timestamp(&row.created_at, "message"),
        })
        .collect();

    Ok(Json(messages))
}

/// Fetch the conversation and require the caller to be one of its two
/// participants; outsiders get the same NotFound as a bad id.
async fn member_conversation(
    state: &AppState,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<couple_db::models::ConversationRow, ApiError> {
    let cid = conversation_id.to_string();
    let row = blocking_db(&state.db, move |db| db.get_conversation_by_id(&cid))
        .await?
        .ok_or(ApiError::NotFound)?;

    if !is_participant(&row, user_id) {
        return Err(ApiError::NotFound);
    }

    Ok(row)
}
