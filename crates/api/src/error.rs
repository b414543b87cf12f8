use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_domain::StatusReply;
use relay_errors::RelayError;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            // the dispatcher is gone, the process is on its way out
            ApiError::Relay(RelayError::Internal(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Relay(RelayError::Configuration(_)) => StatusCode::BAD_REQUEST,
            ApiError::Relay(RelayError::Network(_) | RelayError::Queue(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!("API request failed ({}): {}", status.as_u16(), self);
        (status, Json(StatusReply::failed(self.to_string()))).into_response()
    }
}
