//! 认证模块
//!
//! 校验外部认证服务签发的 HS256 JWT，提取 `userId`

use std::collections::HashSet;

use async_trait::async_trait;
use devconnect_im_core::utils::token_preview;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::model::UserId;
use crate::domain::repository::IdentityResolver;
use crate::error::{MessagingError, MessagingResult};

/// 访问令牌载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// JWT 身份解析器
pub struct JwtIdentityResolver {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // 只在 token 携带 exp 时校验过期
        validation.required_spec_claims = HashSet::new();
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, token: &str) -> MessagingResult<UserId> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            warn!(?err, token_preview = %token_preview(token), "token validation failed");
            MessagingError::Unauthenticated("Token is not valid".to_string())
        })?;

        let user_id = UserId::new(data.claims.user_id)
            .map_err(|_| MessagingError::Unauthenticated("Token is not valid".to_string()))?;
        debug!(user_id = %user_id, "token resolved");
        Ok(user_id)
    }
}
