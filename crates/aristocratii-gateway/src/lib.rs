//! Real-time layer: room membership, message fan-out and the socket loop.

pub mod chat;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod rooms;

pub use chat::ChatGateway;
pub use dispatcher::Dispatcher;
pub use error::GatewayError;
pub use rooms::{ConnId, Room};
