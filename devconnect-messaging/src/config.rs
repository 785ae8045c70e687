use anyhow::{Result, bail};
use devconnect_im_core::config::{ConfigManager, DevConnectAppConfig};
use std::env;

use crate::domain::model::ConflictStrategy;
use crate::domain::service::DEFAULT_MAX_CONTENT_LENGTH;

pub const SERVICE_NAME: &str = "devconnect-messaging";

/// 仅供本地开发；未配置密钥时启动会告警
pub const DEV_JWT_SECRET: &str = "devconnect-dev-secret";

/// 消息存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl StorageBackend {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Some(StorageBackend::Mongo),
            "memory" | "in-memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MessagingConfig {
    pub storage: StorageBackend,
    pub mongo_url: String,
    pub mongo_database: String,
    pub messages_collection: String,
    pub users_collection: String,
    pub jwt_secret: String,
    pub conflict_strategy: ConflictStrategy,
    pub outbound_buffer: usize,
    pub push_on_send: bool,
    pub require_socket_token: bool,
    pub max_content_length: usize,
    pub cors_origins: Vec<String>,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Mongo,
            mongo_url: "mongodb://127.0.0.1:27017".to_string(),
            mongo_database: "devconnect".to_string(),
            messages_collection: "messages".to_string(),
            users_collection: "users".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            conflict_strategy: ConflictStrategy::Exclusive,
            outbound_buffer: 64,
            push_on_send: false,
            require_socket_token: false,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            cors_origins: Vec::new(),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

impl MessagingConfig {
    /// 是否仍在使用内置开发密钥
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn from_app_config(app: &DevConnectAppConfig) -> Result<Self> {
        let service_config = app.messaging_service();
        let defaults = Self::default();

        let storage = match env::var("MESSAGING_STORAGE")
            .ok()
            .or_else(|| service_config.storage.clone())
        {
            Some(raw) => match StorageBackend::from_str(&raw) {
                Some(storage) => storage,
                None => bail!("unknown messaging storage backend: {}", raw),
            },
            None => defaults.storage,
        };

        let profile = service_config
            .mongodb
            .as_deref()
            .and_then(|name| ConfigManager::select_mongodb_config(app, name));

        let mongo_url = env::var("MESSAGING_MONGO_URL")
            .or_else(|_| env::var("MONGO_URI"))
            .ok()
            .or_else(|| profile.as_ref().map(|profile| profile.url.clone()))
            .unwrap_or(defaults.mongo_url);

        let mongo_database = env::var("MESSAGING_MONGO_DATABASE")
            .ok()
            .or_else(|| profile.as_ref().and_then(|profile| profile.database.clone()))
            .unwrap_or(defaults.mongo_database);

        let messages_collection = env::var("MESSAGING_MESSAGES_COLLECTION")
            .ok()
            .or_else(|| service_config.messages_collection.clone())
            .unwrap_or(defaults.messages_collection);

        let users_collection = env::var("MESSAGING_USERS_COLLECTION")
            .ok()
            .or_else(|| service_config.users_collection.clone())
            .unwrap_or(defaults.users_collection);

        let jwt_secret = env::var("MESSAGING_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .ok()
            .or_else(|| service_config.token_secret.clone())
            .filter(|secret| !secret.is_empty())
            .unwrap_or(defaults.jwt_secret);

        let conflict_strategy = match env::var("MESSAGING_CONFLICT_STRATEGY")
            .ok()
            .or_else(|| service_config.conflict_strategy.clone())
        {
            Some(raw) => match ConflictStrategy::from_str(&raw) {
                Some(strategy) => strategy,
                None => bail!("unknown presence conflict strategy: {}", raw),
            },
            None => defaults.conflict_strategy,
        };

        let outbound_buffer = env::var("MESSAGING_OUTBOUND_BUFFER")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .or(service_config.outbound_buffer)
            .filter(|v| *v > 0)
            .unwrap_or(defaults.outbound_buffer);

        let push_on_send = env_flag("MESSAGING_PUSH_ON_SEND")
            .or(service_config.push_on_send)
            .unwrap_or(defaults.push_on_send);

        let require_socket_token = env_flag("MESSAGING_REQUIRE_SOCKET_TOKEN")
            .or(service_config.require_socket_token)
            .unwrap_or(defaults.require_socket_token);

        let max_content_length = env::var("MESSAGING_MAX_CONTENT_LENGTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .or(service_config.max_content_length)
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_content_length);

        let cors_origins = match env::var("MESSAGING_CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            Err(_) => service_config.cors_origins.clone(),
        };

        Ok(Self {
            storage,
            mongo_url,
            mongo_database,
            messages_collection,
            users_collection,
            jwt_secret,
            conflict_strategy,
            outbound_buffer,
            push_on_send,
            require_socket_token,
            max_content_length,
            cors_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(StorageBackend::from_str("Mongo"), Some(StorageBackend::Mongo));
        assert_eq!(StorageBackend::from_str("memory"), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::from_str("redis"), None);
    }

    #[test]
    fn test_defaults_are_usable() {
        let config = MessagingConfig::default();
        assert_eq!(config.conflict_strategy, ConflictStrategy::Exclusive);
        assert!(!config.push_on_send);
        assert_eq!(config.max_content_length, 5000);
        assert!(config.outbound_buffer > 0);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_configured_secret_is_not_the_dev_secret() {
        let app: DevConnectAppConfig = toml::from_str(
            r#"
            [services.messaging]
            token_secret = "a-real-secret"
            "#,
        )
        .unwrap();
        if env::var("MESSAGING_JWT_SECRET").is_err() && env::var("JWT_SECRET").is_err() {
            let config = MessagingConfig::from_app_config(&app).unwrap();
            assert_eq!(config.jwt_secret, "a-real-secret");
            assert!(!config.uses_dev_secret());
        }
    }

    #[test]
    fn test_from_app_config_reads_service_section() {
        let app: DevConnectAppConfig = toml::from_str(
            r#"
            [mongodb.primary]
            url = "mongodb://db.internal:27017"
            database = "devconnect_test"

            [services.messaging]
            mongodb = "primary"
            messages_collection = "dm"
            conflict_strategy = "replace"
            push_on_send = true
            "#,
        )
        .unwrap();

        let config = MessagingConfig::from_app_config(&app).unwrap();
        assert_eq!(config.messages_collection, "dm");
        assert_eq!(config.conflict_strategy, ConflictStrategy::Replace);
        assert!(config.push_on_send);
        if env::var("MESSAGING_MONGO_URL").is_err() && env::var("MONGO_URI").is_err() {
            assert_eq!(config.mongo_url, "mongodb://db.internal:27017");
        }
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let app: DevConnectAppConfig = toml::from_str(
            r#"
            [services.messaging]
            conflict_strategy = "fanout"
            "#,
        )
        .unwrap();
        if env::var("MESSAGING_CONFLICT_STRATEGY").is_err() {
            assert!(MessagingConfig::from_app_config(&app).is_err());
        }
    }
}
