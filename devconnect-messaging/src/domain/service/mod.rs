pub mod conversation_domain_service;
pub mod message_domain_service;
pub mod presence_registry;
pub mod realtime_router;

pub use conversation_domain_service::ConversationDomainService;
pub use message_domain_service::{
    DEFAULT_MAX_CONTENT_LENGTH, MessageDomainConfig, MessageDomainService,
};
pub use presence_registry::PresenceRegistry;
pub use realtime_router::{DeliveryOutcome, RealtimeRouter};
