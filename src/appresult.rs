use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

/// Failures that are the client's fault and map onto a specific status.
#[derive(thiserror::Error, Debug)]
pub enum Rejection {
    #[error("not signed in")]
    Unauthorized,
    #[error("this account has been blocked")]
    Blocked,
    #[error("not allowed")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        use Rejection::*;
        match self {
            Unauthorized => StatusCode::UNAUTHORIZED,
            Blocked | Forbidden => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            BadRequest(_) => StatusCode::BAD_REQUEST,
            Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(rejection) = self.0.downcast_ref::<Rejection>() {
            return (
                rejection.status(),
                Json(json!({ "error": rejection.to_string() })),
            )
                .into_response();
        }

        tracing::error!("{:#}\n{}", self.0, self.0.backtrace());
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal server error" })),
        )
            .into_response()
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

pub(crate) fn bad_request(msg: impl Into<String>) -> AppError {
    Rejection::BadRequest(msg.into()).into()
}
