pub mod api;
pub mod appresult;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod realtime;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
pub use error::HelplineError;

use db::{HelpRequestStore, IdentityStore};
use realtime::Switchboard;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub identities: Arc<dyn IdentityStore>,
    pub switchboard: Arc<Switchboard>,
}

impl AppState {
    pub fn new(identities: Arc<dyn IdentityStore>, requests: Arc<dyn HelpRequestStore>) -> Self {
        Self {
            switchboard: Arc::new(Switchboard::new(Arc::clone(&identities), requests)),
            identities,
        }
    }
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .merge(realtime::router())
        .nest("/api", api::router())

        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
