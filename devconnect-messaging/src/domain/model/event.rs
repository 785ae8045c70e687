//! 实时事件定义
//!
//! WebSocket 文本帧格式：`{"event": "<name>", "data": {...}}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::UserId;

/// 客户端 → 服务端事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// 将连接绑定到用户身份
    Register { user_id: String },
    /// 转发消息给在线接收方
    SendMessage { recipient_id: String, message: Value },
    /// 输入状态
    Typing {
        #[serde(default)]
        sender_id: Option<String>,
        recipient_id: String,
        is_typing: bool,
    },
}

/// 服务端 → 客户端事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// 新消息
    ReceiveMessage { message: Value },
    /// 对方输入状态
    UserTyping { user_id: UserId, is_typing: bool },
    /// 注册成功
    Registered { user_id: UserId },
    /// 被同一用户的新连接踢下线
    SessionKicked { reason: String },
    /// 事件处理失败
    Error { code: String, message: String },
}

impl ServerEvent {
    /// 事件名（用于日志与指标标签）
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ReceiveMessage { .. } => "receive_message",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::Registered { .. } => "registered",
            ServerEvent::SessionKicked { .. } => "session_kicked",
            ServerEvent::Error { .. } => "error",
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_client_events() {
        let register: ClientEvent =
            serde_json::from_value(json!({"event": "register", "data": {"userId": "u1"}}))
                .unwrap();
        assert_eq!(
            register,
            ClientEvent::Register {
                user_id: "u1".to_string()
            }
        );

        let send: ClientEvent = serde_json::from_value(json!({
            "event": "sendMessage",
            "data": {"recipientId": "u2", "message": {"content": "hi"}}
        }))
        .unwrap();
        assert_eq!(
            send,
            ClientEvent::SendMessage {
                recipient_id: "u2".to_string(),
                message: json!({"content": "hi"})
            }
        );

        let typing: ClientEvent = serde_json::from_value(json!({
            "event": "typing",
            "data": {"recipientId": "u2", "isTyping": true}
        }))
        .unwrap();
        assert_eq!(
            typing,
            ClientEvent::Typing {
                sender_id: None,
                recipient_id: "u2".to_string(),
                is_typing: true
            }
        );
    }

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::UserTyping {
            user_id: UserId::new("u1").unwrap(),
            is_typing: false,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "userTyping", "data": {"userId": "u1", "isTyping": false}})
        );
        assert_eq!(event.name(), "user_typing");
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result =
            serde_json::from_value::<ClientEvent>(json!({"event": "joinRoom", "data": {}}));
        assert!(result.is_err());
    }
}
