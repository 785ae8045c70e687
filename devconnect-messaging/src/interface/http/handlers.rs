use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::HttpState;
use super::auth::AuthenticatedUser;
use crate::application::commands::{DeleteMessageCommand, SendMessageCommand};
use crate::application::queries::{ListConversationsQuery, ListMessagesQuery};
use crate::domain::model::{ConversationSummary, Message, UserId};
use crate::error::{MessagingError, MessagingResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// GET /
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "DevConnect API is running!" }))
}

/// GET /metrics
pub async fn metrics() -> Response {
    match devconnect_im_core::metrics::gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(?err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /api/messages/conversations
pub async fn list_conversations(
    State(state): State<HttpState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> MessagingResult<Json<Vec<ConversationSummary>>> {
    let summaries = state
        .queries
        .handle_list_conversations(ListConversationsQuery { user_id })
        .await?;
    Ok(Json(summaries))
}

/// GET /api/messages/{otherUserId}
pub async fn list_messages(
    State(state): State<HttpState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(other_user_id): Path<String>,
) -> MessagingResult<Json<Vec<Message>>> {
    let other_user_id = UserId::new(other_user_id).map_err(MessagingError::InvalidInput)?;
    let messages = state
        .queries
        .handle_list_messages(ListMessagesQuery {
            user_id,
            other_user_id,
        })
        .await?;
    Ok(Json(messages))
}

/// POST /api/messages/send
pub async fn send_message(
    State(state): State<HttpState>,
    AuthenticatedUser(sender_id): AuthenticatedUser,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> MessagingResult<(StatusCode, Json<Message>)> {
    let Json(request) =
        payload.map_err(|rejection| MessagingError::InvalidInput(rejection.body_text()))?;

    let recipient_id = request
        .recipient_id
        .ok_or_else(|| MessagingError::InvalidInput("Recipient is required".to_string()))
        .and_then(|raw| UserId::new(raw).map_err(MessagingError::InvalidInput))?;

    let message = state
        .commands
        .handle_send_message(SendMessageCommand {
            sender_id,
            recipient_id,
            content: request.content.unwrap_or_default(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /api/messages/{messageId}
pub async fn delete_message(
    State(state): State<HttpState>,
    AuthenticatedUser(requester_id): AuthenticatedUser,
    Path(message_id): Path<String>,
) -> MessagingResult<Json<serde_json::Value>> {
    state
        .commands
        .handle_delete_message(DeleteMessageCommand {
            message_id,
            requester_id,
        })
        .await?;
    Ok(Json(json!({ "message": "Message deleted" })))
}
