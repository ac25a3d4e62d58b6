pub mod chats;
pub mod entries;
pub mod error;
pub mod events;
pub mod images;
pub mod routes;
pub mod socket;
pub mod state;
pub mod users;

pub use routes::router;
pub use state::{AppState, AppStateInner};
