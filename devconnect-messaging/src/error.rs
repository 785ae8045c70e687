//! 私信服务错误类型定义

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use devconnect_im_core::error::ErrorCode;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// 私信服务错误类型
#[derive(Debug, Error)]
pub enum MessagingError {
    /// 接收方 / 消息不存在
    #[error("{0}")]
    NotFound(String),

    /// 非消息发送者
    #[error("{0}")]
    Forbidden(String),

    /// 无效的参数
    #[error("{0}")]
    InvalidInput(String),

    /// 未认证
    #[error("{0}")]
    Unauthenticated(String),

    /// 存储错误
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// 私信服务结果类型
pub type MessagingResult<T> = Result<T, MessagingError>;

impl MessagingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MessagingError::NotFound(_) => ErrorCode::NotFound,
            MessagingError::Forbidden(_) => ErrorCode::PermissionDenied,
            MessagingError::InvalidInput(_) => ErrorCode::InvalidArgument,
            MessagingError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            MessagingError::Storage(_) => ErrorCode::Internal,
        }
    }
}

impl IntoResponse for MessagingError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self {
            MessagingError::Storage(err) => {
                error!(error = ?err, "storage failure while handling request");
                "Server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
