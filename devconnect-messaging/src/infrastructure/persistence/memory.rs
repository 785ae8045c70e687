use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::model::{Message, UserId};
use crate::domain::repository::{MessageRepository, UserDirectory};

/// 内存消息仓储（本地开发与测试）
#[derive(Default)]
pub struct InMemoryMessageRepository {
    inner: Arc<RwLock<Vec<Message>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存储内容的拷贝
    pub async fn snapshot(&self) -> Vec<Message> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert(&self, message: &Message) -> Result<()> {
        let mut guard = self.inner.write().await;
        if guard.iter().any(|existing| existing.id == message.id) {
            anyhow::bail!("duplicate message id {}", message.id);
        }
        guard.push(message.clone());
        Ok(())
    }

    async fn find_by_id(&self, message_id: &str) -> Result<Option<Message>> {
        let guard = self.inner.read().await;
        Ok(guard.iter().find(|message| message.id == message_id).cloned())
    }

    async fn find_between(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>> {
        let guard = self.inner.read().await;
        let mut messages: Vec<Message> = guard
            .iter()
            .filter(|message| message.is_between(a, b))
            .cloned()
            .collect();
        messages.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
        Ok(messages)
    }

    async fn find_involving(&self, user: &UserId) -> Result<Vec<Message>> {
        let guard = self.inner.read().await;
        let mut messages: Vec<Message> = guard
            .iter()
            .filter(|message| message.involves(user))
            .cloned()
            .collect();
        messages.sort_by(|x, y| y.sort_key().cmp(&x.sort_key()));
        Ok(messages)
    }

    async fn mark_read(
        &self,
        recipient: &UserId,
        sender: &UserId,
        message_ids: &[String],
    ) -> Result<u64> {
        let targets: HashSet<&str> = message_ids.iter().map(String::as_str).collect();
        let mut guard = self.inner.write().await;
        let mut updated = 0;
        for message in guard.iter_mut() {
            if targets.contains(message.id.as_str()) && message.is_unread_for(recipient, sender) {
                message.read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn unread_counts(&self, recipient: &UserId) -> Result<HashMap<UserId, u64>> {
        let guard = self.inner.read().await;
        let mut counts = HashMap::new();
        for message in guard
            .iter()
            .filter(|message| !message.read && &message.recipient_id == recipient)
        {
            *counts.entry(message.sender_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn delete(&self, message_id: &str) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|message| message.id != message_id);
        Ok(guard.len() < before)
    }
}

/// 内存用户目录
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashSet<UserId>>,
    accept_all: bool,
}

impl InMemoryUserDirectory {
    /// 任何合法 id 都视为存在（本地开发，无用户服务时）
    pub fn accept_all() -> Self {
        Self {
            accept_all: true,
            ..Self::default()
        }
    }

    /// 以给定用户初始化，非法 id 被忽略
    pub fn with_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let users = users
            .into_iter()
            .filter_map(|user| UserId::new(user).ok())
            .collect();
        Self {
            users: RwLock::new(users),
            accept_all: false,
        }
    }

    pub async fn insert(&self, user_id: UserId) {
        self.users.write().await.insert(user_id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn exists(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.accept_all || self.users.read().await.contains(user_id))
    }
}
