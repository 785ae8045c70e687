//! 消息领域服务 - 发送、拉取（含已读标记）与删除

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::domain::model::{Message, UserId};
use crate::domain::repository::{MessageRepository, UserDirectory};
use crate::error::{MessagingError, MessagingResult};

/// 默认消息内容最大长度（字符）
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 5000;

/// 消息领域配置
#[derive(Debug, Clone)]
pub struct MessageDomainConfig {
    pub max_content_length: usize,
}

impl Default for MessageDomainConfig {
    fn default() -> Self {
        Self {
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

/// 消息领域服务
pub struct MessageDomainService {
    repository: Arc<dyn MessageRepository>,
    users: Arc<dyn UserDirectory>,
    config: MessageDomainConfig,
}

impl MessageDomainService {
    pub fn new(
        repository: Arc<dyn MessageRepository>,
        users: Arc<dyn UserDirectory>,
        config: MessageDomainConfig,
    ) -> Self {
        Self {
            repository,
            users,
            config,
        }
    }

    /// 发送消息并持久化
    #[instrument(skip(self, content), fields(sender = %sender, recipient = %recipient))]
    pub async fn send(
        &self,
        sender: &UserId,
        recipient: &UserId,
        content: String,
    ) -> MessagingResult<Message> {
        if content.trim().is_empty() {
            return Err(MessagingError::InvalidInput(
                "Message content is required".to_string(),
            ));
        }

        let length = content.chars().count();
        if length > self.config.max_content_length {
            return Err(MessagingError::InvalidInput(format!(
                "Message content exceeds {} characters",
                self.config.max_content_length
            )));
        }

        if !self.users.exists(recipient).await? {
            return Err(MessagingError::NotFound("Recipient not found".to_string()));
        }

        let message = Message::new(sender.clone(), recipient.clone(), content);
        self.repository.insert(&message).await?;

        debug!(message_id = %message.id, length, "message persisted");
        Ok(message)
    }

    /// 拉取两人之间的消息，并将 `other → user` 方向的未读消息标记为已读
    ///
    /// 已读标记只作用于本次返回的消息，返回值保留拉取时的 read 状态
    #[instrument(skip(self), fields(user = %user, other = %other))]
    pub async fn list_between(&self, user: &UserId, other: &UserId) -> MessagingResult<Vec<Message>> {
        let messages = self.repository.find_between(user, other).await?;

        let unread_ids: Vec<String> = messages
            .iter()
            .filter(|message| message.is_unread_for(user, other))
            .map(|message| message.id.clone())
            .collect();

        if !unread_ids.is_empty() {
            let marked = self.repository.mark_read(user, other, &unread_ids).await?;
            if marked < unread_ids.len() as u64 {
                // 并发拉取已抢先标记，非错误
                debug!(
                    expected = unread_ids.len(),
                    marked, "some messages were already marked read"
                );
            }
            debug!(marked, "messages marked read");
        }

        Ok(messages)
    }

    /// 删除消息（仅发送者）
    #[instrument(skip(self), fields(requester = %requester))]
    pub async fn delete(&self, message_id: &str, requester: &UserId) -> MessagingResult<()> {
        let message = self
            .repository
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| MessagingError::NotFound("Message not found".to_string()))?;

        if &message.sender_id != requester {
            warn!(
                message_id = %message_id,
                sender = %message.sender_id,
                "delete rejected: requester is not the sender"
            );
            return Err(MessagingError::Forbidden("Not authorized".to_string()));
        }

        if !self.repository.delete(message_id).await? {
            return Err(MessagingError::NotFound("Message not found".to_string()));
        }

        info!(message_id = %message_id, "message deleted");
        Ok(())
    }
}
