use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::duration::DurationError;
use crate::models::BookingStatus;
use crate::scheduling::SchedulingError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Cannot change booking status from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Admin authorization required")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Scheduling(SchedulingError::InvalidConfiguration(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Scheduling(SchedulingError::SlotConflict) => StatusCode::CONFLICT,
            AppError::Scheduling(SchedulingError::OutOfWindow(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Scheduling(SchedulingError::PastDate) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Scheduling(SchedulingError::InvalidConfiguration(_)) => "invalid_configuration",
            AppError::Scheduling(SchedulingError::SlotConflict) => "slot_conflict",
            AppError::Scheduling(SchedulingError::OutOfWindow(_)) => "out_of_window",
            AppError::Scheduling(SchedulingError::PastDate) => "past_date",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Unauthorized => "unauthorized",
            AppError::Database(_) | AppError::Internal(_) => "internal",
        }
    }

    /// Server-side failures, as opposed to rejections the client can act on.
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error() && !matches!(self, AppError::Scheduling(_))
    }

    /// Message safe to show to a visitor.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "Booking service is temporarily unavailable".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<DurationError> for AppError {
    fn from(e: DurationError) -> Self {
        AppError::Validation(format!("Invalid service duration: {e}"))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for AppError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            error!("Request failed: {self}");
        }

        let body = json!({
            "success": false,
            "error": self.public_message(),
            "code": self.code(),
        });

        (self.status(), Json(body)).into_response()
    }
}
