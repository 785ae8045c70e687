use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document, doc};
use mongodb::{Collection, Database};

use crate::domain::model::UserId;
use crate::domain::repository::UserDirectory;

/// 基于共享 `users` 集合的用户目录（只读）
pub struct MongoUserDirectory {
    collection: Collection<Document>,
}

impl MongoUserDirectory {
    pub fn new(database: &Database, collection_name: &str) -> Self {
        Self {
            collection: database.collection::<Document>(collection_name),
        }
    }
}

/// 用户 `_id` 可能是 ObjectId，也可能是普通字符串
fn id_candidates(user_id: &UserId) -> Vec<Bson> {
    let mut candidates = vec![Bson::String(user_id.as_str().to_string())];
    if let Ok(oid) = ObjectId::parse_str(user_id.as_str()) {
        candidates.push(Bson::ObjectId(oid));
    }
    candidates
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn exists(&self, user_id: &UserId) -> Result<bool> {
        let filter = doc! {"_id": {"$in": id_candidates(user_id)}};
        let count = self.collection.count_documents(filter, None).await?;
        Ok(count > 0)
    }
}
