use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use tracing::info;

use aristocratii_db::blocking;
use aristocratii_types::api::CreateChatRequest;
use aristocratii_types::models::Chat;

use crate::error::{ApiError, JsonBody, PathParam};
use crate::state::AppState;

/// GET /chats
pub async fn list_chats(State(state): State<AppState>) -> Result<Json<Vec<Chat>>, ApiError> {
    let rows = blocking(&state.db, |db| db.list_chats()).await?;
    Ok(Json(rows.into_iter().map(|row| row.into_chat()).collect()))
}

/// GET /chats/{id}
pub async fn get_chat(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParam<i64>,
) -> Result<Json<Chat>, ApiError> {
    let row = blocking(&state.db, move |db| db.get_chat(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Chat not found".into()))?;
    Ok(Json(row.into_chat()))
}

/// POST /chats
pub async fn create_chat(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<CreateChatRequest>,
) -> Result<Json<Chat>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }

    let row = blocking(&state.db, move |db| {
        for &user_id in &req.participants {
            if !db.user_exists(user_id)? {
                return Ok(Err(ApiError::BadRequest(format!(
                    "participant {} does not exist",
                    user_id
                ))));
            }
        }
        db.create_chat(&req.name, req.image.as_deref(), &req.participants)
            .map(Ok)
    })
    .await??;

    info!("Created chat {} ({}) with {} participants", row.name, row.id, row.participants.len());
    Ok(Json(row.into_chat()))
}
