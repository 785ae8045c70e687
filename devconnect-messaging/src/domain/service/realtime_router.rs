//! 实时路由 - 在线绑定冲突处理与尽力投递
//!
//! 投递为 fire-and-forget：接收方离线或下行缓冲已满都不会向发送方报错

use std::sync::Arc;

use devconnect_im_core::metrics::MessagingMetrics;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::model::{ConflictStrategy, ConnectionHandle, PushResult, ServerEvent, UserId};
use crate::domain::service::PresenceRegistry;

pub const KICK_REASON: &str = "Signed in from another connection";

/// 单次投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 已放入接收方连接的下行缓冲
    Delivered,
    /// 接收方不在线，事件被丢弃
    Offline,
    /// 接收方连接缓冲已满或已关闭，事件被丢弃
    Dropped,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Offline => "offline",
            DeliveryOutcome::Dropped => "dropped",
        }
    }
}

/// 实时路由
pub struct RealtimeRouter {
    registry: Arc<PresenceRegistry>,
    strategy: ConflictStrategy,
    metrics: Arc<MessagingMetrics>,
}

impl RealtimeRouter {
    pub fn new(
        registry: Arc<PresenceRegistry>,
        strategy: ConflictStrategy,
        metrics: Arc<MessagingMetrics>,
    ) -> Self {
        Self {
            registry,
            strategy,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    pub fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    /// 将连接绑定到用户身份，按冲突策略处理被替换的旧连接
    pub fn bind(&self, user_id: &UserId, handle: &ConnectionHandle) {
        let replaced = self.registry.register(user_id.clone(), handle.clone());

        if let Some(previous) = replaced.filter(|previous| previous != handle) {
            match self.strategy {
                ConflictStrategy::Exclusive => {
                    previous.evict(KICK_REASON);
                    self.metrics.presence_kicks_total.inc();
                    info!(
                        user_id = %user_id,
                        old_connection = %previous.id(),
                        new_connection = %handle.id(),
                        "previous connection kicked"
                    );
                }
                ConflictStrategy::Replace => {
                    debug!(
                        user_id = %user_id,
                        old_connection = %previous.id(),
                        new_connection = %handle.id(),
                        "previous connection replaced"
                    );
                }
            }
        }

        self.refresh_gauge();
    }

    /// 连接断开时解除绑定（只移除仍指向该连接的记录）
    pub fn unbind(&self, handle: &ConnectionHandle) -> Option<UserId> {
        let removed = self.registry.remove(handle);
        self.refresh_gauge();
        removed
    }

    /// 将消息推送给在线接收方
    pub fn route_message(&self, recipient: &UserId, message: Value) -> DeliveryOutcome {
        self.deliver(recipient, ServerEvent::ReceiveMessage { message })
    }

    /// 将输入状态推送给在线接收方，`user_id` 为发送方
    pub fn route_typing(
        &self,
        sender: &UserId,
        recipient: &UserId,
        is_typing: bool,
    ) -> DeliveryOutcome {
        self.deliver(
            recipient,
            ServerEvent::UserTyping {
                user_id: sender.clone(),
                is_typing,
            },
        )
    }

    fn deliver(&self, recipient: &UserId, event: ServerEvent) -> DeliveryOutcome {
        let name = event.name();
        let outcome = match self.registry.lookup(recipient) {
            None => DeliveryOutcome::Offline,
            Some(handle) => match handle.try_push(event) {
                PushResult::Queued => DeliveryOutcome::Delivered,
                PushResult::Full => {
                    warn!(
                        recipient = %recipient,
                        connection_id = %handle.id(),
                        event = name,
                        "outbound buffer full, event dropped"
                    );
                    DeliveryOutcome::Dropped
                }
                PushResult::Closed => {
                    debug!(
                        recipient = %recipient,
                        connection_id = %handle.id(),
                        event = name,
                        "connection already closed, event dropped"
                    );
                    DeliveryOutcome::Dropped
                }
            },
        };

        self.metrics.record_event(name, outcome.as_str());
        outcome
    }

    fn refresh_gauge(&self) {
        self.metrics
            .online_connections
            .set(self.registry.online_count() as i64);
    }
}
