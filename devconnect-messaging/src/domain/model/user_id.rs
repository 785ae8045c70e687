//! UserId 值对象
//!
//! 用户ID的强类型封装，用户实体本身由外部资料服务维护

use serde::{Deserialize, Serialize};
use std::fmt;

/// 用户ID最大长度
const MAX_USER_ID_LEN: usize = 128;

/// 用户ID值对象
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// 从字符串创建用户ID（带验证）
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("UserId cannot be empty".to_string());
        }

        if id.len() > MAX_USER_ID_LEN {
            return Err(format!(
                "UserId too long (max {MAX_USER_ID_LEN} characters)"
            ));
        }

        Ok(Self(id))
    }

    /// 获取内部值的引用
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_and_oversized() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
        assert!(UserId::new("x".repeat(129)).is_err());
        assert!(UserId::new("x".repeat(128)).is_ok());
    }

    #[test]
    fn test_serde_is_plain_string() {
        let id = UserId::new("64f1c2a9e4b0a1b2c3d4e5f6").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"64f1c2a9e4b0a1b2c3d4e5f6\"");

        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        // 反序列化同样走校验
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }
}
