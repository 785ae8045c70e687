use std::sync::Arc;

use devconnect_im_core::metrics::MessagingMetrics;
use tracing::{debug, info, warn};

use crate::application::commands::{DeleteMessageCommand, SendMessageCommand};
use crate::application::queries::{ListConversationsQuery, ListMessagesQuery};
use crate::domain::model::{ConversationSummary, Message};
use crate::domain::service::{ConversationDomainService, MessageDomainService, RealtimeRouter};
use crate::error::MessagingResult;

/// 消息命令处理器
pub struct MessageCommandHandler {
    domain_service: Arc<MessageDomainService>,
    router: Arc<RealtimeRouter>,
    metrics: Arc<MessagingMetrics>,
    push_on_send: bool,
}

impl MessageCommandHandler {
    pub fn new(
        domain_service: Arc<MessageDomainService>,
        router: Arc<RealtimeRouter>,
        metrics: Arc<MessagingMetrics>,
        push_on_send: bool,
    ) -> Self {
        Self {
            domain_service,
            router,
            metrics,
            push_on_send,
        }
    }

    /// 处理发送消息命令
    ///
    /// 持久化成功即返回；推送（如开启）结果不影响返回值
    pub async fn handle_send_message(&self, command: SendMessageCommand) -> MessagingResult<Message> {
        debug!(
            sender = %command.sender_id,
            recipient = %command.recipient_id,
            "Handling send message command"
        );

        let message = self
            .domain_service
            .send(&command.sender_id, &command.recipient_id, command.content)
            .await?;
        self.metrics.messages_sent_total.inc();

        if self.push_on_send {
            match serde_json::to_value(&message) {
                Ok(payload) => {
                    let outcome = self.router.route_message(&message.recipient_id, payload);
                    debug!(message_id = %message.id, outcome = outcome.as_str(), "message pushed");
                }
                Err(err) => warn!(?err, message_id = %message.id, "failed to encode message for push"),
            }
        }

        info!(message_id = %message.id, "Message sent");
        Ok(message)
    }

    /// 处理删除消息命令
    pub async fn handle_delete_message(&self, command: DeleteMessageCommand) -> MessagingResult<()> {
        debug!(
            message_id = %command.message_id,
            requester = %command.requester_id,
            "Handling delete message command"
        );

        self.domain_service
            .delete(&command.message_id, &command.requester_id)
            .await
    }
}

/// 消息查询处理器
pub struct MessageQueryHandler {
    message_service: Arc<MessageDomainService>,
    conversation_service: Arc<ConversationDomainService>,
}

impl MessageQueryHandler {
    pub fn new(
        message_service: Arc<MessageDomainService>,
        conversation_service: Arc<ConversationDomainService>,
    ) -> Self {
        Self {
            message_service,
            conversation_service,
        }
    }

    pub async fn handle_list_conversations(
        &self,
        query: ListConversationsQuery,
    ) -> MessagingResult<Vec<ConversationSummary>> {
        self.conversation_service
            .list_conversations(&query.user_id)
            .await
    }

    pub async fn handle_list_messages(&self, query: ListMessagesQuery) -> MessagingResult<Vec<Message>> {
        self.message_service
            .list_between(&query.user_id, &query.other_user_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ConflictStrategy, ConnectionHandle, ServerEvent, UserId};
    use crate::domain::service::{MessageDomainConfig, PresenceRegistry};
    use crate::infrastructure::persistence::{InMemoryMessageRepository, InMemoryUserDirectory};

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn handler(push_on_send: bool) -> (MessageCommandHandler, Arc<RealtimeRouter>, Arc<MessagingMetrics>) {
        let repository = Arc::new(InMemoryMessageRepository::new());
        let users = Arc::new(InMemoryUserDirectory::with_users(["alice", "bob"]));
        let domain = Arc::new(MessageDomainService::new(
            repository,
            users,
            MessageDomainConfig::default(),
        ));
        let metrics = Arc::new(MessagingMetrics::new());
        let router = Arc::new(RealtimeRouter::new(
            Arc::new(PresenceRegistry::new()),
            ConflictStrategy::Exclusive,
            metrics.clone(),
        ));
        (
            MessageCommandHandler::new(domain, router.clone(), metrics.clone(), push_on_send),
            router,
            metrics,
        )
    }

    fn send(content: &str) -> SendMessageCommand {
        SendMessageCommand {
            sender_id: uid("alice"),
            recipient_id: uid("bob"),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_counts_only_persisted_messages() {
        let (handler, _, metrics) = handler(false);
        handler.handle_send_message(send("hi")).await.unwrap();
        assert!(handler.handle_send_message(send(" ")).await.is_err());
        assert_eq!(metrics.messages_sent_total.get(), 1);
    }

    #[tokio::test]
    async fn test_push_on_send_routes_to_online_recipient() {
        let (handler, router, _) = handler(true);
        let (handle, mut rx) = ConnectionHandle::channel(4);
        router.bind(&uid("bob"), &handle);

        let message = handler.handle_send_message(send("hi")).await.unwrap();
        match rx.recv().await {
            Some(ServerEvent::ReceiveMessage { message: payload }) => {
                assert_eq!(payload["id"], message.id.as_str());
                assert_eq!(payload["content"], "hi");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_push_disabled_leaves_socket_quiet() {
        let (handler, router, _) = handler(false);
        let (handle, mut rx) = ConnectionHandle::channel(4);
        router.bind(&uid("bob"), &handle);

        handler.handle_send_message(send("hi")).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
