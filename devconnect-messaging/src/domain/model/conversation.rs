use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// 会话摘要（派生视图，不持久化）
///
/// `unread_count` 等于 recipient=自己、sender=对方、read=false 的消息条数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub counterpart_id: UserId,
    pub last_message_content: String,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: u64,
}
