use axum::{Json, extract::State, response::IntoResponse};

use couple_interpreter::DEFAULT_SENDER_NAME;
use couple_types::api::InterpretRequest;

use crate::auth::AppState;
use crate::error::ApiError;

/// POST /interpret — the standalone interpretation contract: a non-empty
/// message in, three well-formed strings out. The interpreter absorbs every
/// model failure into its fallback, so this handler only ever rejects bad
/// input.
pub async fn interpret_message(
    State(state): State<AppState>,
    Json(req): Json<InterpretRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(message) = req.message.as_deref().filter(|m| !m.trim().is_empty()) else {
        return Err(ApiError::Validation("Message is required".into()));
    };

    let sender_name = req
        .sender_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(DEFAULT_SENDER_NAME);

    let result = state.interpreter.interpret(message, sender_name).await;
    Ok(Json(result))
}
