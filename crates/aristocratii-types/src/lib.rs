//! Wire types shared by the HTTP API and the real-time gateway.

pub mod api;
pub mod events;
pub mod models;
