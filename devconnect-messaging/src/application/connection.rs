//! 单连接会话：Connected → Registered → Disconnected
//!
//! 只依赖连接句柄与实时路由，不关心具体传输

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::model::{
    ClientEvent, ConflictStrategy, ConnectionHandle, ConnectionState, ServerEvent, UserId,
};
use crate::domain::service::RealtimeRouter;

pub const ERROR_INVALID_EVENT: &str = "invalid_event";
pub const ERROR_INVALID_ARGUMENT: &str = "invalid_argument";
pub const ERROR_NOT_REGISTERED: &str = "not_registered";
pub const ERROR_UNAUTHENTICATED: &str = "unauthenticated";

/// 单连接会话
pub struct ConnectionSession {
    handle: ConnectionHandle,
    router: Arc<RealtimeRouter>,
    /// 建连时通过 token 证明的身份
    verified_identity: Option<UserId>,
    require_token: bool,
    state: ConnectionState,
}

impl ConnectionSession {
    pub fn new(
        handle: ConnectionHandle,
        router: Arc<RealtimeRouter>,
        verified_identity: Option<UserId>,
        require_token: bool,
    ) -> Self {
        Self {
            handle,
            router,
            verified_identity,
            require_token,
            state: ConnectionState::Connected,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// 处理一帧文本
    pub fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle_event(event),
            Err(err) => {
                if self.state == ConnectionState::Disconnected || self.handle.is_evicted() {
                    return;
                }
                debug!(connection_id = %self.handle.id(), %err, "unparseable client frame");
                self.reply(ServerEvent::error(ERROR_INVALID_EVENT, "Unrecognized event"));
            }
        }
    }

    pub fn handle_event(&mut self, event: ClientEvent) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        if self.handle.is_evicted() {
            self.displaced();
            return;
        }

        match event {
            ClientEvent::Register { user_id } => self.register(user_id),
            ClientEvent::SendMessage {
                recipient_id,
                message,
            } => self.forward_message(recipient_id, message),
            ClientEvent::Typing {
                sender_id,
                recipient_id,
                is_typing,
            } => self.forward_typing(sender_id, recipient_id, is_typing),
        }
    }

    fn register(&mut self, raw_user_id: String) {
        let user_id = match UserId::new(raw_user_id) {
            Ok(user_id) => user_id,
            Err(err) => {
                self.reply(ServerEvent::error(ERROR_INVALID_ARGUMENT, err));
                return;
            }
        };

        let proven = match &self.verified_identity {
            Some(verified) => verified == &user_id,
            None => !self.require_token,
        };
        if !proven {
            warn!(
                connection_id = %self.handle.id(),
                user_id = %user_id,
                verified = ?self.verified_identity,
                "register rejected: identity not proven by token"
            );
            self.reply(ServerEvent::error(
                ERROR_UNAUTHENTICATED,
                "Token does not match the requested user",
            ));
            return;
        }

        if let ConnectionState::Registered(previous) = &self.state {
            if previous != &user_id {
                self.router.unbind(&self.handle);
            }
        }

        self.router.bind(&user_id, &self.handle);
        info!(connection_id = %self.handle.id(), user_id = %user_id, "connection registered");
        self.reply(ServerEvent::Registered {
            user_id: user_id.clone(),
        });
        self.state = ConnectionState::Registered(user_id);
    }

    fn forward_message(&mut self, raw_recipient: String, message: Value) {
        let Some(sender) = self.registered_user() else {
            return;
        };
        let Some(recipient) = self.parse_recipient(raw_recipient) else {
            return;
        };

        let outcome = self.router.route_message(&recipient, message);
        debug!(sender = %sender, recipient = %recipient, outcome = outcome.as_str(), "message forwarded");
    }

    fn forward_typing(&mut self, claimed_sender: Option<String>, raw_recipient: String, is_typing: bool) {
        let Some(sender) = self.registered_user() else {
            return;
        };
        let Some(recipient) = self.parse_recipient(raw_recipient) else {
            return;
        };

        if let Some(claimed) = claimed_sender.filter(|claimed| claimed != sender.as_str()) {
            debug!(
                connection_id = %self.handle.id(),
                bound = %sender,
                claimed = %claimed,
                "typing senderId ignored in favour of bound identity"
            );
        }

        self.router.route_typing(&sender, &recipient, is_typing);
    }

    /// 当前绑定的身份；互斥策略下绑定已被其他连接接管时会话转为断开
    fn registered_user(&mut self) -> Option<UserId> {
        let Some(user) = self.state.user_id().cloned() else {
            self.reply(ServerEvent::error(
                ERROR_NOT_REGISTERED,
                "Register before sending events",
            ));
            return None;
        };

        if self.router.strategy() == ConflictStrategy::Exclusive
            && self.router.registry().lookup(&user).as_ref() != Some(&self.handle)
        {
            self.displaced();
            return None;
        }
        Some(user)
    }

    fn displaced(&mut self) {
        warn!(
            connection_id = %self.handle.id(),
            user = ?self.state.user_id(),
            "connection no longer holds its binding, session closed"
        );
        self.state = ConnectionState::Disconnected;
    }

    fn parse_recipient(&self, raw: String) -> Option<UserId> {
        match UserId::new(raw) {
            Ok(recipient) => Some(recipient),
            Err(err) => {
                self.reply(ServerEvent::error(ERROR_INVALID_ARGUMENT, err));
                None
            }
        }
    }

    fn reply(&self, event: ServerEvent) {
        let _ = self.handle.try_push(event);
    }

    /// 连接结束，只解绑一次
    pub fn close(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        if let Some(user_id) = self.router.unbind(&self.handle) {
            info!(connection_id = %self.handle.id(), user_id = %user_id, "connection unbound");
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ConflictStrategy;
    use crate::domain::service::PresenceRegistry;
    use devconnect_im_core::metrics::MessagingMetrics;
    use serde_json::json;
    use tokio::sync::mpsc::Receiver;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn router() -> Arc<RealtimeRouter> {
        Arc::new(RealtimeRouter::new(
            Arc::new(PresenceRegistry::new()),
            ConflictStrategy::Exclusive,
            Arc::new(MessagingMetrics::new()),
        ))
    }

    fn open(router: &Arc<RealtimeRouter>, verified: Option<UserId>, require_token: bool) -> (ConnectionSession, Receiver<ServerEvent>) {
        open_with_buffer(router, verified, require_token, 8)
    }

    fn open_with_buffer(
        router: &Arc<RealtimeRouter>,
        verified: Option<UserId>,
        require_token: bool,
        buffer: usize,
    ) -> (ConnectionSession, Receiver<ServerEvent>) {
        let (handle, rx) = ConnectionHandle::channel(buffer);
        (
            ConnectionSession::new(handle, router.clone(), verified, require_token),
            rx,
        )
    }

    fn error_code(event: Option<ServerEvent>) -> String {
        match event {
            Some(ServerEvent::Error { code, .. }) => code,
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_events_before_register_are_rejected() {
        let router = router();
        let (mut session, mut rx) = open(&router, None, false);

        session.handle_event(ClientEvent::SendMessage {
            recipient_id: "bob".to_string(),
            message: json!({"content": "hi"}),
        });
        assert_eq!(error_code(rx.recv().await), ERROR_NOT_REGISTERED);
        assert_eq!(session.state(), &ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_register_then_typing_uses_bound_identity() {
        let router = router();
        let (mut alice, mut alice_rx) = open(&router, None, false);
        let (mut bob, mut bob_rx) = open(&router, None, false);

        alice.handle_text(r#"{"event":"register","data":{"userId":"alice"}}"#);
        bob.handle_text(r#"{"event":"register","data":{"userId":"bob"}}"#);
        assert!(matches!(alice_rx.recv().await, Some(ServerEvent::Registered { .. })));
        assert!(matches!(bob_rx.recv().await, Some(ServerEvent::Registered { .. })));

        alice.handle_text(
            r#"{"event":"typing","data":{"senderId":"mallory","recipientId":"bob","isTyping":true}}"#,
        );
        assert_eq!(
            bob_rx.recv().await,
            Some(ServerEvent::UserTyping {
                user_id: uid("alice"),
                is_typing: true
            })
        );
    }

    #[tokio::test]
    async fn test_token_required_register_must_match() {
        let router = router();
        let (mut session, mut rx) = open(&router, Some(uid("alice")), true);

        session.handle_event(ClientEvent::Register {
            user_id: "bob".to_string(),
        });
        assert_eq!(error_code(rx.recv().await), ERROR_UNAUTHENTICATED);
        assert!(!router.registry().is_online(&uid("bob")));

        session.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });
        assert!(router.registry().is_online(&uid("alice")));
    }

    #[tokio::test]
    async fn test_reregister_moves_binding() {
        let router = router();
        let (mut session, _rx) = open(&router, None, false);

        session.handle_event(ClientEvent::Register {
            user_id: "first".to_string(),
        });
        session.handle_event(ClientEvent::Register {
            user_id: "second".to_string(),
        });

        assert!(!router.registry().is_online(&uid("first")));
        assert!(router.registry().is_online(&uid("second")));
        assert_eq!(session.state(), &ConnectionState::Registered(uid("second")));
    }

    #[tokio::test]
    async fn test_close_unbinds_once_and_ignores_later_events() {
        let router = router();
        let (mut session, mut rx) = open(&router, None, false);
        session.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });
        let _ = rx.recv().await;

        session.close();
        assert!(!router.registry().is_online(&uid("alice")));
        assert_eq!(session.state(), &ConnectionState::Disconnected);

        session.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });
        session.close();
        assert!(!router.registry().is_online(&uid("alice")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_kicked_session_close_keeps_new_binding() {
        let router = router();
        let (mut old, mut old_rx) = open(&router, None, false);
        let (mut new, _new_rx) = open(&router, None, false);

        old.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });
        new.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });

        assert!(matches!(old_rx.recv().await, Some(ServerEvent::Registered { .. })));
        assert!(old.handle().is_evicted());

        old.close();
        assert_eq!(
            router.registry().lookup(&uid("alice")).map(|h| h.id()),
            Some(new.handle().id())
        );
    }

    #[tokio::test]
    async fn test_verified_identity_binds_register_without_required_token() {
        let router = router();
        let (mut session, mut rx) = open(&router, Some(uid("alice")), false);

        session.handle_event(ClientEvent::Register {
            user_id: "bob".to_string(),
        });
        assert_eq!(error_code(rx.recv().await), ERROR_UNAUTHENTICATED);
        assert!(!router.registry().is_online(&uid("bob")));
        assert_eq!(session.state(), &ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_displaced_session_with_full_buffer_stops_acting() {
        let router = router();
        let (mut old, mut old_rx) = open_with_buffer(&router, None, false, 1);
        let (mut new, _new_rx) = open(&router, None, false);
        let (mut bob, mut bob_rx) = open(&router, None, false);

        old.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });
        bob.handle_event(ClientEvent::Register {
            user_id: "bob".to_string(),
        });
        let _ = bob_rx.recv().await;

        // 旧连接的下行缓冲已被 registered 占满
        new.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });
        assert!(old.handle().is_evicted());

        old.handle_event(ClientEvent::Typing {
            sender_id: None,
            recipient_id: "bob".to_string(),
            is_typing: true,
        });
        old.handle_event(ClientEvent::SendMessage {
            recipient_id: "bob".to_string(),
            message: json!({"content": "still here"}),
        });

        assert_eq!(old.state(), &ConnectionState::Disconnected);
        assert!(bob_rx.try_recv().is_err());
        assert!(matches!(old_rx.try_recv(), Ok(ServerEvent::Registered { .. })));
        assert!(old_rx.try_recv().is_err());
        assert_eq!(
            router.registry().lookup(&uid("alice")).map(|h| h.id()),
            Some(new.handle().id())
        );
    }

    #[tokio::test]
    async fn test_replaced_session_keeps_acting_under_replace() {
        let router = Arc::new(RealtimeRouter::new(
            Arc::new(PresenceRegistry::new()),
            ConflictStrategy::Replace,
            Arc::new(MessagingMetrics::new()),
        ));
        let (mut old, _old_rx) = open(&router, None, false);
        let (mut new, _new_rx) = open(&router, None, false);
        let (mut bob, mut bob_rx) = open(&router, None, false);

        old.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });
        new.handle_event(ClientEvent::Register {
            user_id: "alice".to_string(),
        });
        bob.handle_event(ClientEvent::Register {
            user_id: "bob".to_string(),
        });
        let _ = bob_rx.recv().await;

        old.handle_event(ClientEvent::Typing {
            sender_id: None,
            recipient_id: "bob".to_string(),
            is_typing: true,
        });
        assert!(matches!(bob_rx.recv().await, Some(ServerEvent::UserTyping { .. })));
        assert_eq!(old.state(), &ConnectionState::Registered(uid("alice")));
    }

    #[tokio::test]
    async fn test_garbage_frame_gets_error_reply() {
        let router = router();
        let (mut session, mut rx) = open(&router, None, false);
        session.handle_text("not json");
        assert_eq!(error_code(rx.recv().await), ERROR_INVALID_EVENT);
    }
}
