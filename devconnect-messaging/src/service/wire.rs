//! Wire 风格的依赖注入模块
//!
//! 按依赖顺序构建仓储、领域服务、应用处理器与接口状态

use std::sync::Arc;

use anyhow::{Context, Result};
use devconnect_im_core::config::DevConnectAppConfig;
use devconnect_im_core::error::{ErrorCode, InfraResultExt};
use devconnect_im_core::metrics::MessagingMetrics;
use mongodb::Client;
use mongodb::options::ClientOptions;
use tracing::{info, warn};

use crate::application::handlers::{MessageCommandHandler, MessageQueryHandler};
use crate::config::{MessagingConfig, StorageBackend};
use crate::domain::repository::{IdentityResolver, MessageRepository, UserDirectory};
use crate::domain::service::{
    ConversationDomainService, MessageDomainConfig, MessageDomainService, PresenceRegistry,
    RealtimeRouter,
};
use crate::infrastructure::auth::JwtIdentityResolver;
use crate::infrastructure::persistence::{
    InMemoryMessageRepository, InMemoryUserDirectory, MongoMessageRepository, MongoUserDirectory,
};
use crate::interface::http::HttpState;

/// 应用上下文 - 包含所有已初始化的服务
pub struct ApplicationContext {
    pub config: Arc<MessagingConfig>,
    pub state: HttpState,
    pub registry: Arc<PresenceRegistry>,
}

/// 根据应用配置构建上下文
pub async fn initialize(app_config: &DevConnectAppConfig) -> Result<ApplicationContext> {
    // 1. 私信服务配置
    let config = Arc::new(
        MessagingConfig::from_app_config(app_config)
            .context("Failed to load messaging service configuration")?,
    );

    // 2. 存储
    let (messages, users): (Arc<dyn MessageRepository>, Arc<dyn UserDirectory>) =
        match config.storage {
            StorageBackend::Mongo => {
                let options = ClientOptions::parse(&config.mongo_url)
                    .await
                    .into_service(ErrorCode::ConfigurationError, "invalid mongodb url")?;
                let client = Client::with_options(options)
                    .into_service(ErrorCode::ServiceUnavailable, "mongodb unavailable")?;
                let database = client.database(&config.mongo_database);

                let messages = MongoMessageRepository::new(&database, &config.messages_collection)
                    .await
                    .context("Failed to initialize MongoDB message collection")?;
                let users = MongoUserDirectory::new(&database, &config.users_collection);

                info!(
                    database = %config.mongo_database,
                    messages = %config.messages_collection,
                    users = %config.users_collection,
                    "Using MongoDB storage"
                );
                (
                    Arc::new(messages) as Arc<dyn MessageRepository>,
                    Arc::new(users) as Arc<dyn UserDirectory>,
                )
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage; messages are lost on restart");
                (
                    Arc::new(InMemoryMessageRepository::new()) as Arc<dyn MessageRepository>,
                    Arc::new(InMemoryUserDirectory::accept_all()) as Arc<dyn UserDirectory>,
                )
            }
        };

    // 3. 身份解析
    if config.uses_dev_secret() {
        warn!("No JWT secret configured; using the built-in development secret, tokens can be forged");
    }
    let identity: Arc<dyn IdentityResolver> = Arc::new(JwtIdentityResolver::new(&config.jwt_secret));

    Ok(assemble(config, messages, users, identity))
}

/// 使用给定的仓储与身份解析器组装上下文
pub fn assemble(
    config: Arc<MessagingConfig>,
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserDirectory>,
    identity: Arc<dyn IdentityResolver>,
) -> ApplicationContext {
    let metrics = Arc::new(MessagingMetrics::new());

    let registry = Arc::new(PresenceRegistry::new());
    let router = Arc::new(RealtimeRouter::new(
        registry.clone(),
        config.conflict_strategy,
        metrics.clone(),
    ));

    let message_service = Arc::new(MessageDomainService::new(
        messages.clone(),
        users,
        MessageDomainConfig {
            max_content_length: config.max_content_length,
        },
    ));
    let conversation_service = Arc::new(ConversationDomainService::new(messages));

    let commands = Arc::new(MessageCommandHandler::new(
        message_service.clone(),
        router.clone(),
        metrics,
        config.push_on_send,
    ));
    let queries = Arc::new(MessageQueryHandler::new(
        message_service,
        conversation_service,
    ));

    let state = HttpState {
        commands,
        queries,
        router,
        identity,
        outbound_buffer: config.outbound_buffer,
        require_socket_token: config.require_socket_token,
    };

    ApplicationContext {
        config,
        state,
        registry,
    }
}
