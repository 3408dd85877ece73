pub mod lifecycle;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod routing;
pub mod switchboard;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use switchboard::Switchboard;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::realtime_ws))
}
