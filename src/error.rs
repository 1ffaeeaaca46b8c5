//! Error taxonomy shared by the poll services and the web layer.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;
use sea_orm::DbErr;

#[derive(Debug, Display)]
pub enum PollError {
    /// No active session.
    #[display(fmt = "Login required")]
    Unauthenticated,
    /// The caller does not own the target resource.
    #[display(fmt = "You don't own this resource")]
    Forbidden,
    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),
    #[display(fmt = "{}", _0)]
    Validation(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Store error: {}", _0)]
    Store(DbErr),
    /// A failure outside the store, such as password hashing.
    #[display(fmt = "Internal error: {}", _0)]
    Internal(String),
}

impl PollError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Maps a unique-constraint rejection to `Conflict(msg)`; any other
    /// store error stays a store error.
    pub fn from_unique(err: DbErr, msg: &str) -> Self {
        if is_unique_violation(&err) {
            Self::conflict(msg)
        } else {
            Self::Store(err)
        }
    }
}

impl std::error::Error for PollError {}

impl From<DbErr> for PollError {
    fn from(err: DbErr) -> Self {
        Self::Store(err)
    }
}

impl From<validator::ValidationErrors> for PollError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl ResponseError for PollError {
    fn status_code(&self) -> StatusCode {
        match self {
            PollError::Unauthenticated => StatusCode::UNAUTHORIZED,
            PollError::Forbidden => StatusCode::FORBIDDEN,
            PollError::NotFound(_) => StatusCode::NOT_FOUND,
            PollError::Validation(_) => StatusCode::BAD_REQUEST,
            PollError::Conflict(_) => StatusCode::CONFLICT,
            PollError::Store(_) | PollError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            PollError::Store(err) => {
                log::error!("store failure: {}", err);
                "Something went wrong".to_owned()
            }
            PollError::Internal(err) => {
                log::error!("internal failure: {}", err);
                "Something went wrong".to_owned()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

/// True when the store rejected a write because of a unique constraint.
///
/// sea-orm surfaces driver errors as strings, so this matches on the
/// Postgres SQLSTATE text as well as the message.
pub fn is_unique_violation(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("duplicate key value violates unique constraint") || message.contains("23505")
}
