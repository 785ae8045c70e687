//! HTTP / WebSocket 接口层

pub mod auth;
pub mod handlers;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::application::handlers::{MessageCommandHandler, MessageQueryHandler};
use crate::domain::repository::IdentityResolver;
use crate::domain::service::RealtimeRouter;

/// 路由共享状态
#[derive(Clone)]
pub struct HttpState {
    pub commands: Arc<MessageCommandHandler>,
    pub queries: Arc<MessageQueryHandler>,
    pub router: Arc<RealtimeRouter>,
    pub identity: Arc<dyn IdentityResolver>,
    pub outbound_buffer: usize,
    pub require_socket_token: bool,
}

/// 构建完整路由
pub fn build_router(state: HttpState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/ws", get(ws::upgrade))
        .route(
            "/api/messages/conversations",
            get(handlers::list_conversations),
        )
        .route("/api/messages/send", post(handlers::send_message))
        .route(
            "/api/messages/{id}",
            get(handlers::list_messages).delete(handlers::delete_message),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// 未配置来源时放开全部来源
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
