use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use devconnect_im_core::utils::{datetime_to_millis, millis_to_datetime};
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{CreateIndexOptions, FindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};
use tracing::debug;

use crate::domain::model::{Message, UserId};
use crate::domain::repository::MessageRepository;

/// MongoDB 消息仓储
///
/// 文档结构：`{_id, senderId, recipientId, content, createdAt(ms), read}`
pub struct MongoMessageRepository {
    collection: Collection<Document>,
}

impl MongoMessageRepository {
    pub async fn new(database: &Database, collection_name: &str) -> Result<Self> {
        let collection = database.collection::<Document>(collection_name);
        ensure_indexes(&collection).await?;
        Ok(Self { collection })
    }
}

async fn ensure_indexes(collection: &Collection<Document>) -> Result<()> {
    let pair_index = IndexModel::builder()
        .keys(doc! {"senderId": 1, "recipientId": 1, "createdAt": 1})
        .options(
            IndexOptions::builder()
                .name(Some("idx_pair_created".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(pair_index, None::<CreateIndexOptions>)
        .await?;

    let unread_index = IndexModel::builder()
        .keys(doc! {"recipientId": 1, "read": 1})
        .options(
            IndexOptions::builder()
                .name(Some("idx_recipient_read".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(unread_index, None::<CreateIndexOptions>)
        .await?;

    Ok(())
}

fn to_document(message: &Message) -> Document {
    doc! {
        "_id": message.id.as_str(),
        "senderId": message.sender_id.as_str(),
        "recipientId": message.recipient_id.as_str(),
        "content": message.content.as_str(),
        "createdAt": datetime_to_millis(&message.created_at),
        "read": message.read,
    }
}

fn from_document(document: &Document) -> Result<Message> {
    let id = document.get_str("_id").context("message _id")?.to_string();
    let sender_id = UserId::new(document.get_str("senderId").context("message senderId")?)
        .map_err(|err| anyhow!("message {}: {}", id, err))?;
    let recipient_id = UserId::new(document.get_str("recipientId").context("message recipientId")?)
        .map_err(|err| anyhow!("message {}: {}", id, err))?;
    let created_at = match document.get("createdAt") {
        Some(Bson::Int64(ms)) => millis_to_datetime(*ms),
        Some(Bson::Int32(ms)) => millis_to_datetime(i64::from(*ms)),
        Some(Bson::DateTime(dt)) => millis_to_datetime(dt.timestamp_millis()),
        _ => None,
    }
    .ok_or_else(|| anyhow!("message {}: invalid createdAt", id))?;

    Ok(Message {
        sender_id,
        recipient_id,
        content: document.get_str("content").unwrap_or_default().to_string(),
        created_at,
        read: document.get_bool("read").unwrap_or(false),
        id,
    })
}

impl MongoMessageRepository {
    async fn find_sorted(&self, filter: Document, direction: i32) -> Result<Vec<Message>> {
        let options = FindOptions::builder()
            .sort(doc! {"createdAt": direction, "_id": direction})
            .build();
        let documents: Vec<Document> = self
            .collection
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        documents.iter().map(from_document).collect()
    }
}

#[async_trait]
impl MessageRepository for MongoMessageRepository {
    async fn insert(&self, message: &Message) -> Result<()> {
        self.collection
            .insert_one(to_document(message), None)
            .await
            .with_context(|| format!("insert message {}", message.id))?;
        Ok(())
    }

    async fn find_by_id(&self, message_id: &str) -> Result<Option<Message>> {
        let document = self
            .collection
            .find_one(doc! {"_id": message_id}, None)
            .await?;
        document.as_ref().map(from_document).transpose()
    }

    async fn find_between(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>> {
        let filter = doc! {
            "$or": [
                {"senderId": a.as_str(), "recipientId": b.as_str()},
                {"senderId": b.as_str(), "recipientId": a.as_str()},
            ]
        };
        self.find_sorted(filter, 1).await
    }

    async fn find_involving(&self, user: &UserId) -> Result<Vec<Message>> {
        let filter = doc! {
            "$or": [
                {"senderId": user.as_str()},
                {"recipientId": user.as_str()},
            ]
        };
        self.find_sorted(filter, -1).await
    }

    async fn mark_read(
        &self,
        recipient: &UserId,
        sender: &UserId,
        message_ids: &[String],
    ) -> Result<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let filter = doc! {
            "_id": {"$in": message_ids.to_vec()},
            "recipientId": recipient.as_str(),
            "senderId": sender.as_str(),
            "read": false,
        };
        let result = self
            .collection
            .update_many(filter, doc! {"$set": {"read": true}}, None)
            .await?;

        debug!(
            matched = result.matched_count,
            modified = result.modified_count,
            "mark_read update"
        );
        Ok(result.modified_count)
    }

    async fn unread_counts(&self, recipient: &UserId) -> Result<HashMap<UserId, u64>> {
        let pipeline = vec![
            doc! {"$match": {"recipientId": recipient.as_str(), "read": false}},
            doc! {"$group": {"_id": "$senderId", "count": {"$sum": 1}}},
        ];
        let groups: Vec<Document> = self
            .collection
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;

        let mut counts = HashMap::with_capacity(groups.len());
        for group in groups {
            let Some(sender) = group
                .get_str("_id")
                .ok()
                .and_then(|raw| UserId::new(raw).ok())
            else {
                continue;
            };
            let count = match group.get("count") {
                Some(Bson::Int32(n)) => *n as u64,
                Some(Bson::Int64(n)) => *n as u64,
                _ => 0,
            };
            counts.insert(sender, count);
        }
        Ok(counts)
    }

    async fn delete(&self, message_id: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! {"_id": message_id}, None)
            .await?;
        Ok(result.deleted_count > 0)
    }
}
