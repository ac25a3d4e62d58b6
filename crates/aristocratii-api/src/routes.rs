use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{chats, entries, events, images, socket, users};

/// Every HTTP route plus the socket upgrade, ready to serve.
pub fn router(state: AppState) -> Router {
    let upload_routes = Router::new()
        .route("/upload-image", post(images::upload_image))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .route("/health", get(health))
        // Users
        .route("/users", get(users::list_users).post(users::register))
        .route("/users/{id}", get(users::get_user))
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/{id}", get(events::get_event))
        .route("/events/{id}/join", post(events::join_event))
        // Chats
        .route("/chats", get(chats::list_chats).post(chats::create_chat))
        .route("/chats/{id}", get(chats::get_chat))
        // Entries
        .route("/entries", get(entries::list_entries).post(entries::create_entry))
        .route("/entries/{chat_id}", get(entries::get_chat_entries))
        // Images
        .merge(upload_routes)
        .route("/images", get(images::list_images))
        .route("/images/{id}", get(images::get_image))
        // Real-time gateway
        .route("/socket", get(socket::socket_upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
