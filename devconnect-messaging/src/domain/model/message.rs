use std::sync::Mutex;

use chrono::{DateTime, Utc};
use devconnect_im_core::utils::millis_to_datetime;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

use super::UserId;

/// 进程内单调递增的 ULID 生成器，保证同一毫秒内的 id 依生成顺序递增
static ID_GENERATOR: Lazy<Mutex<Generator>> = Lazy::new(|| Mutex::new(Generator::new()));

fn next_id() -> Ulid {
    match ID_GENERATOR.lock() {
        Ok(mut generator) => generator.generate().unwrap_or_else(|_| Ulid::new()),
        Err(poisoned) => poisoned
            .into_inner()
            .generate()
            .unwrap_or_else(|_| Ulid::new()),
    }
}

/// 私信消息
///
/// 除 `read` 标记外不可变；`read` 只会从 false 变为 true
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Message {
    /// 创建一条新的未读消息
    ///
    /// `created_at` 取自 id 的时间部分（毫秒精度，与持久化精度一致）
    pub fn new(sender_id: UserId, recipient_id: UserId, content: String) -> Self {
        let id = next_id();
        Self {
            id: id.to_string(),
            sender_id,
            recipient_id,
            content,
            created_at: millis_to_datetime(id.timestamp_ms() as i64).unwrap_or_else(Utc::now),
            read: false,
        }
    }

    /// 消息是否属于 a 与 b 之间的会话（任一方向）
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        (&self.sender_id == a && &self.recipient_id == b)
            || (&self.sender_id == b && &self.recipient_id == a)
    }

    /// 消息是否涉及该用户
    pub fn involves(&self, user: &UserId) -> bool {
        &self.sender_id == user || &self.recipient_id == user
    }

    /// 相对 `user` 的会话对方
    pub fn counterpart_of(&self, user: &UserId) -> &UserId {
        if &self.sender_id == user {
            &self.recipient_id
        } else {
            &self.sender_id
        }
    }

    /// 是否为 `sender` 发给 `recipient` 且尚未读
    pub fn is_unread_for(&self, recipient: &UserId, sender: &UserId) -> bool {
        !self.read && &self.recipient_id == recipient && &self.sender_id == sender
    }

    /// 排序键：createdAt，其次 id
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }
}
