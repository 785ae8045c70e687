//! 配置管理器 - 负责处理不同环境下的配置覆盖
//!
//! 该模块提供了配置管理功能，包括：
//! - 根据环境变量选择 MongoDB 配置
//! - 加载环境特定配置
//! - 合并配置值

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;

use super::{DevConnectAppConfig, MongoInstanceConfig};

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 根据环境变量或配置选择 MongoDB 配置
    ///
    /// 优先级：
    /// 1. 环境变量 DEVCONNECT_MONGO_PROFILE 指定的配置
    /// 2. 配置文件中指定的配置
    pub fn select_mongodb_config(
        config: &DevConnectAppConfig,
        profile_name: &str,
    ) -> Option<MongoInstanceConfig> {
        if let Ok(env_profile) = env::var("DEVCONNECT_MONGO_PROFILE") {
            if let Some(mongo_config) = config.mongodb_profile(&env_profile) {
                return Some(mongo_config.clone());
            }
        }

        config.mongodb_profile(profile_name).cloned()
    }

    /// 获取当前环境名称
    ///
    /// 从环境变量 DEVCONNECT_ENV 获取，未设置时为 "development"
    pub fn get_environment() -> String {
        env::var("DEVCONNECT_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置
    ///
    /// 加载 config/environments/{environment}.toml 中的 MongoDB 与日志配置，
    /// 并将其合并到基础配置中
    pub fn load_environment_config(base_config: &mut DevConnectAppConfig) -> Result<()> {
        let env = Self::get_environment();
        let env_config_path = format!("config/environments/{}.toml", env);

        if Path::new(&env_config_path).exists() {
            let env_config_content = fs::read_to_string(&env_config_path)
                .with_context(|| format!("无法读取环境配置文件: {}", env_config_path))?;
            let env_config: Value = toml::from_str(&env_config_content)
                .with_context(|| format!("无效的环境配置格式: {}", env_config_path))?;

            Self::apply_environment_values(base_config, &env_config);
        }

        Ok(())
    }

    /// 将环境配置中的值合并到基础配置中
    pub(crate) fn apply_environment_values(
        base_config: &mut DevConnectAppConfig,
        env_config: &Value,
    ) {
        Self::merge_mongodb_profiles(&mut base_config.mongodb, env_config);

        if let Some(level) = env_config
            .get("logging")
            .and_then(|logging| logging.get("level"))
            .and_then(|v| v.as_str())
        {
            base_config.core.logging.level = level.to_string();
        }
    }

    /// 合并 MongoDB 配置
    ///
    /// 只有包含 url 的条目才会覆盖基础配置
    fn merge_mongodb_profiles(
        mongodb: &mut HashMap<String, MongoInstanceConfig>,
        env_config: &Value,
    ) {
        let Some(tables) = env_config.get("mongodb").and_then(|v| v.as_table()) else {
            return;
        };

        for (key, value) in tables {
            if let Some(url) = value.get("url").and_then(|v| v.as_str()) {
                let database = value
                    .get("database")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| mongodb.get(key).and_then(|p| p.database.clone()));

                mongodb.insert(
                    key.clone(),
                    MongoInstanceConfig {
                        url: url.to_string(),
                        database,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn test_environment_overrides_mongodb_and_logging() {
        let mut cfg = default_config();
        cfg.mongodb.insert(
            "primary".to_string(),
            MongoInstanceConfig {
                url: "mongodb://localhost:27017".to_string(),
                database: Some("devconnect".to_string()),
            },
        );

        let overlay: Value = toml::from_str(
            r#"
[logging]
level = "warn"

[mongodb.primary]
url = "mongodb://mongo.prod:27017"

[mongodb.broken]
database = "ignored"
"#,
        )
        .unwrap();

        ConfigManager::apply_environment_values(&mut cfg, &overlay);

        let primary = cfg.mongodb_profile("primary").unwrap();
        assert_eq!(primary.url, "mongodb://mongo.prod:27017");
        // 未覆盖的数据库名沿用基础配置
        assert_eq!(primary.database.as_deref(), Some("devconnect"));
        assert!(cfg.mongodb_profile("broken").is_none());
        assert_eq!(cfg.logging().level, "warn");
    }
}
