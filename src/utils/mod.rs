//! 工具函数模块
//!
//! 提供时间戳转换、日志脱敏等通用工具函数

pub mod helpers;

pub use helpers::ServiceHelper;

use chrono::{DateTime, TimeZone, Utc};

/// 毫秒数转换为 DateTime
///
/// # 示例
/// ```
/// use devconnect_im_core::utils::millis_to_datetime;
///
/// let dt = millis_to_datetime(1_700_000_000_123).unwrap();
/// assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);
/// ```
pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// DateTime 转换为毫秒数
pub fn datetime_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// 截取 token 前缀（用于日志记录）
///
/// # 示例
/// ```
/// use devconnect_im_core::utils::token_preview;
///
/// assert_eq!(token_preview("short"), "short");
/// assert_eq!(token_preview("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJhbGciOiJI...");
/// ```
pub fn token_preview(token: &str) -> String {
    match token.char_indices().nth(12) {
        Some((idx, _)) => format!("{}...", &token[..idx]),
        None => token.to_string(),
    }
}
