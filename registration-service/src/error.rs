use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use retreat_shared::error::StoreError;
use retreat_shared::identity::VerifyError;
use retreat_shared::models::MessageResponse;
use retreat_shared::session::TokenError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn bad_request(message: String) -> Self {
        AppError::BadRequest(message)
    }

    pub fn unauthenticated(message: String) -> Self {
        AppError::Unauthenticated(message)
    }

    pub fn forbidden(message: String) -> Self {
        AppError::Forbidden(message)
    }

    pub fn not_found(message: String) -> Self {
        AppError::NotFound(message)
    }

    pub fn conflict(message: String) -> Self {
        AppError::Conflict(message)
    }

    pub fn internal_server_error(message: String) -> Self {
        AppError::InternalServerError(message)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::not_found(format!("{} not found", what)),
            StoreError::AlreadyExists(key) => {
                AppError::conflict(format!("{} already exists", key))
            }
            other => {
                error!("Store failure: {}", other);
                AppError::internal_server_error(other.to_string())
            }
        }
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Unavailable(reason) => {
                error!("Identity provider unavailable: {}", reason);
                AppError::internal_server_error(
                    "Sign-in is temporarily unavailable. Please try again.".to_string(),
                )
            }
            other => AppError::unauthenticated(other.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        error!("Failed to issue session token: {}", err);
        AppError::internal_server_error("Could not start a session".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = MessageResponse {
            success: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
