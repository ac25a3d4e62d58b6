use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use tracing::info;

use aristocratii_db::blocking;
use aristocratii_db::models::NewEvent;
use aristocratii_types::api::{CreateEventRequest, JoinEventRequest};
use aristocratii_types::models::Event;

use crate::error::{ApiError, JsonBody, PathParam};
use crate::state::AppState;

/// GET /events
pub async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    let rows = blocking(&state.db, |db| db.list_events()).await?;
    Ok(Json(rows.into_iter().map(|row| row.into_event()).collect()))
}

/// GET /events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParam<i64>,
) -> Result<Json<Event>, ApiError> {
    let row = blocking(&state.db, move |db| db.get_event(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;
    Ok(Json(row.into_event()))
}

/// POST /events
pub async fn create_event(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<CreateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    if req.end_time < req.start_time {
        return Err(ApiError::BadRequest("end_time must not be before start_time".into()));
    }
    if !(-90.0..=90.0).contains(&req.lat) || !(-180.0..=180.0).contains(&req.lon) {
        return Err(ApiError::BadRequest("coordinates are out of range".into()));
    }

    let organizer_id = req.organizer_id;
    let row = blocking(&state.db, move |db| {
        if !db.user_exists(req.organizer_id)? {
            return Ok(None);
        }
        db.create_event(&NewEvent {
            lat: req.lat,
            lon: req.lon,
            name: &req.name,
            description: &req.description,
            organizer_id: req.organizer_id,
            contact_email: req.contact_email.as_deref(),
            contact_phone: req.contact_phone.as_deref(),
            start_time: req.start_time,
            end_time: req.end_time,
            images: &req.images,
        })
        .map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::BadRequest(format!("organizer {} does not exist", organizer_id)))?;

    info!("Created event {} ({})", row.name, row.id);
    Ok(Json(row.into_event()))
}

/// POST /events/{id}/join: adding an existing attendee again is a no-op.
pub async fn join_event(
    State(state): State<AppState>,
    WithRejection(Path(event_id), _): PathParam<i64>,
    WithRejection(Json(req), _): JsonBody<JoinEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let user_id = req.user_id;

    let row = blocking(&state.db, move |db| {
        if db.get_event(event_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("Event not found".into())));
        }
        if !db.user_exists(user_id)? {
            return Ok(Err(ApiError::NotFound("User not found".into())));
        }
        db.add_attendee(event_id, user_id)?;
        Ok(db.get_event(event_id)?.ok_or_else(|| ApiError::NotFound("Event not found".into())))
    })
    .await??;

    Ok(Json(row.into_event()))
}
