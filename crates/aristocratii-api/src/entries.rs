use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;

use aristocratii_db::blocking;
use aristocratii_types::api::CreateEntryRequest;
use aristocratii_types::events::MessagePayload;
use aristocratii_types::models::Entry;

use crate::error::{ApiError, JsonBody, PathParam};
use crate::state::AppState;

/// GET /entries
pub async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<Entry>>, ApiError> {
    let rows = blocking(&state.db, |db| db.list_entries()).await?;
    Ok(Json(rows.into_iter().map(|row| row.into_entry()).collect()))
}

/// GET /entries/{chat_id}: history of one chat, oldest first.
pub async fn get_chat_entries(
    State(state): State<AppState>,
    WithRejection(Path(chat_id), _): PathParam<i64>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    let rows = blocking(&state.db, move |db| {
        if !db.chat_exists(chat_id)? {
            return Ok(None);
        }
        db.entries_for_chat(chat_id).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Chat not found".into()))?;

    Ok(Json(rows.into_iter().map(|row| row.into_entry()).collect()))
}

/// POST /entries. Takes the same path as a socket `message`: persisted, then fanned out
/// to the chat's room and the other participants.
pub async fn create_entry(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<CreateEntryRequest>,
) -> Result<Json<Entry>, ApiError> {
    let entry = state
        .gateway
        .post_message(MessagePayload {
            user_id: Some(req.user_id),
            chat_id: Some(req.chat_id),
            text: Some(req.text),
        })
        .await?;

    Ok(Json(entry))
}
