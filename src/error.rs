use axum::{http::StatusCode, response::{IntoResponse, Response}};
use thiserror::Error;

use crate::entitlements::{Feature, Plan, TemplateStyle, UsageStoreError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Usage(#[from] UsageStoreError),
    #[error("not found")]
    NotFound,
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    QuotaExceeded(String),
    #[error("This feature requires a {} subscription. Please upgrade your plan.", .0.title())]
    PlanRequired(Plan),
    #[error("{0} is not available on your plan. Please upgrade your plan.")]
    FeatureUnavailable(Feature),
    #[error("the {0} template is not available on your plan. Please upgrade your plan.")]
    TemplateUnavailable(TemplateStyle),
    #[error("{0}")]
    Message(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden
            | AppError::QuotaExceeded(_)
            | AppError::PlanRequired(_)
            | AppError::FeatureUnavailable(_)
            | AppError::TemplateUnavailable(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Usage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Db(_) | AppError::Message(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(?self);
        } else {
            tracing::debug!(?self, %status, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
