//! HTTP错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use explorer_core::ExplorerError;
use serde_json::json;

/// 处理器返回的错误，包装核心错误以便转换为 HTTP 响应
#[derive(Debug)]
pub struct ApiError(pub ExplorerError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self(ExplorerError::Validation(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self(ExplorerError::NotFound(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ExplorerError::Validation(_) => StatusCode::BAD_REQUEST,
            ExplorerError::NotFound(_) => StatusCode::NOT_FOUND,
            ExplorerError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ExplorerError::Config(_) | ExplorerError::Data(_) | ExplorerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ExplorerError> for ApiError {
    fn from(err: ExplorerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
