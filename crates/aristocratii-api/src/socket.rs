use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use aristocratii_gateway::connection;

use crate::state::AppState;

/// GET /socket: upgrade to the real-time gateway.
pub async fn socket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let gateway = state.gateway.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, gateway))
}
