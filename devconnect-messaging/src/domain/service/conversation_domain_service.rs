//! 会话索引领域服务
//!
//! 每次请求都从消息仓储现算，不做任何缓存

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::model::{ConversationSummary, Message, UserId};
use crate::domain::repository::MessageRepository;
use crate::error::MessagingResult;

/// 会话索引领域服务
pub struct ConversationDomainService {
    repository: Arc<dyn MessageRepository>,
}

impl ConversationDomainService {
    pub fn new(repository: Arc<dyn MessageRepository>) -> Self {
        Self { repository }
    }

    /// 列出用户的全部会话，按最后一条消息时间降序
    #[instrument(skip(self), fields(user = %user))]
    pub async fn list_conversations(
        &self,
        user: &UserId,
    ) -> MessagingResult<Vec<ConversationSummary>> {
        let messages = self.repository.find_involving(user).await?;
        let unread = self.repository.unread_counts(user).await?;

        let summaries = summarize(user, &messages, &unread);
        debug!(
            messages = messages.len(),
            conversations = summaries.len(),
            "conversations derived"
        );
        Ok(summaries)
    }
}

/// 由消息（按时间降序）与未读聚合构建会话摘要
///
/// 每个对方只保留第一次出现的消息（即最新一条），
/// 结果按 `last_message_time` 降序稳定排序
pub fn summarize(
    user: &UserId,
    newest_first: &[Message],
    unread: &HashMap<UserId, u64>,
) -> Vec<ConversationSummary> {
    let mut index: HashMap<&UserId, usize> = HashMap::new();
    let mut summaries: Vec<ConversationSummary> = Vec::new();

    for message in newest_first.iter().filter(|m| m.involves(user)) {
        let counterpart = message.counterpart_of(user);
        if index.contains_key(counterpart) {
            continue;
        }

        index.insert(counterpart, summaries.len());
        summaries.push(ConversationSummary {
            counterpart_id: counterpart.clone(),
            last_message_content: message.content.clone(),
            last_message_time: message.created_at,
            unread_count: 0,
        });
    }

    for summary in summaries.iter_mut() {
        summary.unread_count = unread.get(&summary.counterpart_id).copied().unwrap_or(0);
    }

    summaries.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    summaries
}
