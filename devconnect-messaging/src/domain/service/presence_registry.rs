//! 在线表：用户身份 → 当前连接句柄
//!
//! 进程级服务对象，随服务启动创建并注入到各连接处理器中；
//! 每个用户至多一条记录，后注册者覆盖先注册者

use dashmap::DashMap;
use tracing::debug;

use crate::domain::model::{ConnectionHandle, UserId};

/// 在线表
#[derive(Default)]
pub struct PresenceRegistry {
    entries: DashMap<UserId, ConnectionHandle>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 无条件插入或覆盖，返回被替换的旧句柄
    pub fn register(&self, user_id: UserId, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        debug!(user_id = %user_id, connection_id = %handle.id(), "presence registered");
        self.entries.insert(user_id, handle)
    }

    /// 查询用户当前连接
    pub fn lookup(&self, user_id: &UserId) -> Option<ConnectionHandle> {
        self.entries.get(user_id).map(|entry| entry.value().clone())
    }

    /// 移除持有该句柄的记录（至多一条），返回对应的用户
    ///
    /// 只有在删除时该记录仍指向此句柄才会删除，并发的重新注册不会被撤销
    pub fn remove(&self, handle: &ConnectionHandle) -> Option<UserId> {
        let user_id = self
            .entries
            .iter()
            .find(|entry| entry.value() == handle)
            .map(|entry| entry.key().clone())?;

        let removed = self
            .entries
            .remove_if(&user_id, |_, current| current == handle)
            .map(|(user_id, _)| user_id);

        if let Some(user_id) = &removed {
            debug!(user_id = %user_id, connection_id = %handle.id(), "presence removed");
        }
        removed
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.entries.contains_key(user_id)
    }

    /// 当前在线用户数
    pub fn online_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = PresenceRegistry::new();
        let (h1, _rx1) = ConnectionHandle::channel(4);
        let (h2, _rx2) = ConnectionHandle::channel(4);

        assert!(registry.register(uid("u"), h1.clone()).is_none());
        let replaced = registry.register(uid("u"), h2.clone());
        assert_eq!(replaced, Some(h1.clone()));
        assert_eq!(registry.lookup(&uid("u")), Some(h2.clone()));

        // 旧句柄已不在表中，断开时不影响新记录
        assert_eq!(registry.remove(&h1), None);
        assert_eq!(registry.lookup(&uid("u")), Some(h2.clone()));

        assert_eq!(registry.remove(&h2), Some(uid("u")));
        assert_eq!(registry.lookup(&uid("u")), None);
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn test_remove_only_touches_matching_entry() {
        let registry = PresenceRegistry::new();
        let (ha, _rxa) = ConnectionHandle::channel(4);
        let (hb, _rxb) = ConnectionHandle::channel(4);
        registry.register(uid("a"), ha.clone());
        registry.register(uid("b"), hb.clone());

        assert_eq!(registry.remove(&ha), Some(uid("a")));
        assert!(!registry.is_online(&uid("a")));
        assert!(registry.is_online(&uid("b")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_remove() {
        let registry = Arc::new(PresenceRegistry::new());
        let mut tasks = Vec::new();

        for i in 0..64 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (handle, _rx) = ConnectionHandle::channel(1);
                let user = UserId::new(format!("user-{}", i % 8)).unwrap();
                registry.register(user.clone(), handle.clone());
                let _ = registry.lookup(&user);
                registry.remove(&handle);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // 每个连接都移除了自己的记录（若仍在表中）
        assert_eq!(registry.online_count(), 0);
    }
}
