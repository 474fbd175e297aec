//! HTTP 错误映射

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing multipart field `{0}`")]
    MissingField(&'static str),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("invalid multipart request: {}", .0.body_text())]
    MultipartRequest(#[from] MultipartRejection),

    #[error("processing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Processing(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Multipart(e) => e.status(),
            AppError::MultipartRequest(e) => e.status(),
            AppError::Join(_) | AppError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("❌ 请求处理失败: {:#}", self);
        }
        let message = match &self {
            AppError::Processing(e) => format!("{:#}", e),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
