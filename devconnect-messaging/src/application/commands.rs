use crate::domain::model::UserId;

/// 发送消息命令
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
}

/// 删除消息命令
#[derive(Debug, Clone)]
pub struct DeleteMessageCommand {
    pub message_id: String,
    pub requester_id: UserId,
}
