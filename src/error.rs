use thiserror::Error;

use crate::models::PsychiatristKey;

#[derive(Error, Debug)]
pub enum HelplineError {
    #[error("no psychiatrist registered under {0}")]
    IdentityNotFound(PsychiatristKey),

    #[error("no psychiatrist available")]
    NoRecipient,

    #[error("delivery to {0} failed, connection already closed")]
    DeliveryFailed(PsychiatristKey),

    #[error("malformed signal: {0}")]
    MalformedSignal(String),

    #[error("a psychiatrist with email {0} is already registered")]
    DuplicateIdentity(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}
