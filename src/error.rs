//! DevConnect Core 错误工具模块
//!
//! - 统一的服务级错误码与错误类型
//! - 为启动流程 / 基础设施层提供便捷的错误构建工具

use std::fmt;

use thiserror::Error;

/// 服务错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// 参数非法
    InvalidArgument,
    /// 未认证
    Unauthenticated,
    /// 无权限
    PermissionDenied,
    /// 资源不存在
    NotFound,
    /// 配置错误
    ConfigurationError,
    /// 依赖服务不可用
    ServiceUnavailable,
    /// 内部错误
    Internal,
}

impl ErrorCode {
    /// 错误码对应的 HTTP 状态码
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::InvalidArgument => 400,
            ErrorCode::Unauthenticated => 401,
            ErrorCode::PermissionDenied => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::ConfigurationError | ErrorCode::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ConfigurationError => "configuration_error",
            ErrorCode::ServiceUnavailable => "service_unavailable",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 服务级错误
#[derive(Debug, Error)]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, ": {details}")?;
        }
        Ok(())
    }
}

/// 服务结果类型
pub type Result<T> = std::result::Result<T, ServiceError>;

/// 错误构建器
///
/// ```
/// use devconnect_im_core::error::{ErrorBuilder, ErrorCode};
///
/// let err = ErrorBuilder::new(ErrorCode::ConfigurationError, "invalid server address")
///     .details("port out of range")
///     .build_error();
/// assert_eq!(err.to_string(), "[configuration_error] invalid server address: port out of range");
/// ```
pub struct ErrorBuilder {
    code: ErrorCode,
    message: String,
    details: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn build_error(self) -> ServiceError {
        ServiceError {
            code: self.code,
            message: self.message,
            details: self.details,
        }
    }
}

/// 将基础设施错误映射为服务错误
pub fn map_infra_error<E: fmt::Display>(err: E, code: ErrorCode, message: &str) -> ServiceError {
    ErrorBuilder::new(code, message)
        .details(err.to_string())
        .build_error()
}

/// 基础设施结果扩展
pub trait InfraResultExt<T> {
    /// 将任意错误转换为指定错误码的服务错误
    fn into_service(self, code: ErrorCode, message: &str) -> Result<T>;
}

impl<T, E: fmt::Display> InfraResultExt<T> for std::result::Result<T, E> {
    fn into_service(self, code: ErrorCode, message: &str) -> Result<T> {
        self.map_err(|err| map_infra_error(err, code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_details() {
        let err = ErrorBuilder::new(ErrorCode::NotFound, "message not found").build_error();
        assert_eq!(err.to_string(), "[not_found] message not found");
        assert_eq!(err.code.http_status(), 404);
    }

    #[test]
    fn test_into_service_keeps_source_text() {
        let raw: std::result::Result<(), &str> = Err("connection refused");
        let err = raw
            .into_service(ErrorCode::ServiceUnavailable, "mongodb unavailable")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
        assert_eq!(err.details.as_deref(), Some("connection refused"));
    }
}
