//! WebSocket 传输
//!
//! 每个连接一个读循环加一个写任务；写任务消费连接句柄的下行通道

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::HttpState;
use crate::application::connection::ConnectionSession;
use crate::domain::model::{ConnectionHandle, ServerEvent, UserId};
use crate::error::{MessagingError, MessagingResult};

#[derive(Debug, Default, Deserialize)]
pub struct SocketQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /ws
pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<HttpState>,
    Query(query): Query<SocketQuery>,
) -> MessagingResult<Response> {
    let verified = match query.token.as_deref().filter(|token| !token.is_empty()) {
        Some(token) => Some(state.identity.resolve(token).await?),
        None if state.require_socket_token => {
            return Err(MessagingError::Unauthenticated(
                "No token, authorization denied".to_string(),
            ));
        }
        None => None,
    };

    Ok(ws.on_upgrade(move |socket| serve_socket(socket, state, verified)))
}

async fn serve_socket(socket: WebSocket, state: HttpState, verified: Option<UserId>) {
    let (mut sink, mut stream) = socket.split();
    let (handle, mut outbound) = ConnectionHandle::channel(state.outbound_buffer);
    let mut evictions = handle.evictions();
    let connection_id = handle.id();
    info!(%connection_id, verified = ?verified, "socket connected");

    let mut session = ConnectionSession::new(
        handle,
        state.router.clone(),
        verified,
        state.require_socket_token,
    );

    // 驱逐信号优先于下行缓冲，缓冲积压时踢线也能立即生效
    let mut writer = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                changed = evictions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let reason = evictions.borrow_and_update().clone();
                    match reason {
                        Some(reason) => ServerEvent::SessionKicked { reason },
                        None => continue,
                    }
                }
                event = outbound.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let kicked = matches!(event, ServerEvent::SessionKicked { .. });
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%connection_id, ?err, "failed to encode server event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
            if kicked {
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => session.handle_text(text.as_str()),
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%connection_id, %err, "socket read error");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    session.close();
    writer.abort();
    info!(%connection_id, "socket disconnected");
}
