use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tracing::error;

use crate::error::HelplineError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<HelplineError>() {
            Some(HelplineError::MalformedSignal(_)) => StatusCode::BAD_REQUEST,
            Some(HelplineError::IdentityNotFound(_) | HelplineError::NoRecipient) => StatusCode::NOT_FOUND,
            Some(HelplineError::DuplicateIdentity(_)) => StatusCode::CONFLICT,
            Some(HelplineError::DeliveryFailed(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Some(HelplineError::Store(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}\n\n{}", self.0, self.0.backtrace());
        }

        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
