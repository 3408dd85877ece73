use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    db::IdentityStore,
    error::HelplineError,
    models::{PsychiatristIdentity, PsychiatristKey, Registration},
    realtime::Switchboard,
    AppResult,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn register(
    State(identities): State<Arc<dyn IdentityStore>>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> AppResult<Response> {
    let Json(registration) = payload.map_err(|e| HelplineError::MalformedSignal(e.body_text()))?;
    let identity = identities.register(&registration).await?;
    Ok((StatusCode::CREATED, Json(identity)).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn online(State(switchboard): State<Arc<Switchboard>>) -> Json<Vec<PsychiatristIdentity>> {
    Json(switchboard.presence().online())
}

/// A directory entry, with `online` taken from live presence.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn lookup(
    State(identities): State<Arc<dyn IdentityStore>>,
    State(switchboard): State<Arc<Switchboard>>,
    Path(key): Path<PsychiatristKey>,
) -> AppResult<Json<PsychiatristIdentity>> {
    let mut identity = identities
        .find(&key)
        .await?
        .ok_or_else(|| HelplineError::IdentityNotFound(key.clone()))?;
    identity.online = switchboard.presence().is_online(&key);
    Ok(Json(identity))
}
