use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error::HelplineError,
    models::HelpRequestDraft,
    realtime::{lifecycle::HelpRequestState, Switchboard},
    AppResult,
};

/// Same routing as the `submit-help-request` signal, for clients without a socket.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn submit_help_request(
    State(switchboard): State<Arc<Switchboard>>,
    payload: Result<Json<HelpRequestDraft>, JsonRejection>,
) -> AppResult<Response> {
    let Json(draft) = payload.map_err(|e| HelplineError::MalformedSignal(e.body_text()))?;
    let report = switchboard.desk().submit(draft).await?.report();

    let status = match report.state {
        HelpRequestState::Delivered => StatusCode::OK,
        HelpRequestState::Created | HelpRequestState::Undeliverable => StatusCode::NOT_FOUND,
    };
    Ok((status, Json(report)).into_response())
}
