//! 连接句柄与连接状态
//!
//! 句柄承载有界下行通道与独立的驱逐信号，传输层（WebSocket 写任务）消费另一端

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::{ServerEvent, UserId};

/// 连接ID值对象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 下行推送结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// 已放入连接的下行缓冲区
    Queued,
    /// 下行缓冲区已满，事件被丢弃
    Full,
    /// 连接写端已关闭
    Closed,
}

/// 连接句柄
///
/// 两个句柄相等当且仅当连接ID相同。驱逐信号不经过下行缓冲，缓冲满时也能送达
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<ServerEvent>,
    eviction: Arc<watch::Sender<Option<String>>>,
}

impl ConnectionHandle {
    /// 创建句柄及其下行接收端
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (outbound, receiver) = mpsc::channel(buffer.max(1));
        let (eviction, _) = watch::channel(None);
        (
            Self {
                id: ConnectionId::generate(),
                outbound,
                eviction: Arc::new(eviction),
            },
            receiver,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// 非阻塞推送事件
    pub fn try_push(&self, event: ServerEvent) -> PushResult {
        match self.outbound.try_send(event) {
            Ok(()) => PushResult::Queued,
            Err(TrySendError::Full(_)) => PushResult::Full,
            Err(TrySendError::Closed(_)) => PushResult::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// 标记连接被驱逐，只记录第一次的原因
    pub fn evict(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.eviction.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn is_evicted(&self) -> bool {
        self.eviction.borrow().is_some()
    }

    /// 订阅驱逐信号，供写任务与下行通道一起 select
    pub fn evictions(&self) -> watch::Receiver<Option<String>> {
        self.eviction.subscribe()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("evicted", &self.is_evicted())
            .finish()
    }
}

/// 连接状态机：Connected → Registered → Disconnected（终态）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// 已建立连接，尚未绑定身份
    Connected,
    /// 已在在线表中绑定身份
    Registered(UserId),
    /// 已断开
    Disconnected,
}

impl ConnectionState {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            ConnectionState::Registered(user_id) => Some(user_id),
            _ => None,
        }
    }
}

/// 同一用户重复注册时的冲突策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStrategy {
    /// 互斥：踢出旧连接
    #[default]
    Exclusive,
    /// 覆盖：静默替换，旧连接保持打开但不再可达
    Replace,
}

impl ConflictStrategy {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exclusive" => Some(ConflictStrategy::Exclusive),
            "replace" => Some(ConflictStrategy::Replace),
            _ => None,
        }
    }
}
