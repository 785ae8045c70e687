use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::HttpState;
use crate::domain::model::UserId;
use crate::error::MessagingError;

pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// 通过访问令牌认证的调用者
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserId);

/// 依次读取 `Authorization: Bearer <token>` 与 `x-auth-token`
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

impl FromRequestParts<HttpState> for AuthenticatedUser {
    type Rejection = MessagingError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or_else(|| {
            MessagingError::Unauthenticated("No token, authorization denied".to_string())
        })?;
        let user_id = state.identity.resolve(token).await?;
        Ok(AuthenticatedUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, HeaderValue::from_static("legacy"));
        assert_eq!(extract_token(&headers), Some("legacy"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_token(&headers), Some("abc.def"));
    }

    #[test]
    fn test_missing_or_blank_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_token(&headers), None);
    }
}
