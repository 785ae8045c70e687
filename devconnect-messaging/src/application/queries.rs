use crate::domain::model::UserId;

/// 列出会话查询
#[derive(Debug, Clone)]
pub struct ListConversationsQuery {
    pub user_id: UserId,
}

/// 拉取两人消息查询（含已读标记副作用）
#[derive(Debug, Clone)]
pub struct ListMessagesQuery {
    pub user_id: UserId,
    pub other_user_id: UserId,
}
