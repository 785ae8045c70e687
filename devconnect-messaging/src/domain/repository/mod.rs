use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::model::{Message, UserId};
use crate::error::MessagingResult;

/// 消息仓储接口
///
/// 消息记录的唯一持有者；除 `read` 标记与发送者删除外不做任何修改
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 持久化新消息
    async fn insert(&self, message: &Message) -> Result<()>;

    /// 根据消息 ID 查找
    async fn find_by_id(&self, message_id: &str) -> Result<Option<Message>>;

    /// 两人之间的全部消息（双向），按 createdAt 升序，同一时刻按 id 升序
    async fn find_between(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>>;

    /// 用户作为发送方或接收方的全部消息，按 createdAt 降序，同一时刻按 id 降序
    async fn find_involving(&self, user: &UserId) -> Result<Vec<Message>>;

    /// 条件批量标记已读
    ///
    /// 只更新 `message_ids` 中 recipient/sender 匹配且 `read=false` 的消息，
    /// 必须是单次条件更新（update-where），返回实际更新的条数
    async fn mark_read(
        &self,
        recipient: &UserId,
        sender: &UserId,
        message_ids: &[String],
    ) -> Result<u64>;

    /// 按发送方聚合 `recipient` 的未读数
    async fn unread_counts(&self, recipient: &UserId) -> Result<HashMap<UserId, u64>>;

    /// 删除消息，返回是否确实删除
    async fn delete(&self, message_id: &str) -> Result<bool>;
}

/// 用户目录接口（外部资料服务提供）
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 用户是否存在
    async fn exists(&self, user_id: &UserId) -> Result<bool>;
}

/// 认证身份解析接口（外部认证服务签发 token）
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// 从访问令牌解析调用者身份
    async fn resolve(&self, token: &str) -> MessagingResult<UserId>;
}
