mod help;
mod psychiatrists;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(psychiatrists::register))
        .route("/psychiatrists/online", get(psychiatrists::online))
        .route("/psychiatrists/{key}", get(psychiatrists::lookup))
        .route("/help", post(help::submit_help_request))
}
