//! DevConnect Core 配置模块
//!
//! 该模块提供了应用程序配置管理功能，包括：
//! - 配置文件 / 配置目录的加载和合并
//! - 环境特定配置覆盖
//! - 日志、MongoDB 与各服务配置定义

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use toml::Value;
use tracing::warn;

mod manager;
pub use manager::ConfigManager;

/// 全局应用配置实例，使用 OnceLock 确保只初始化一次
static APP_CONFIG: OnceLock<DevConnectAppConfig> = OnceLock::new();

/// 服务标识配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// 服务名称
    pub name: String,
    /// 服务版本
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "devconnect-im-core".to_string(),
            version: default_version(),
        }
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// 监听地址配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default)]
    pub address: String,
    /// 监听端口
    #[serde(default)]
    pub port: u16,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（EnvFilter 语法）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 是否输出 target
    #[serde(default = "default_true")]
    pub with_target: bool,
    /// 是否输出线程 ID
    #[serde(default)]
    pub with_thread_ids: bool,
    /// 是否输出文件名
    #[serde(default)]
    pub with_file: bool,
    /// 是否输出行号
    #[serde(default)]
    pub with_line_number: bool,
    /// 是否使用 JSON 格式输出
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// 核心配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CoreConfig {
    /// 服务标识
    #[serde(default)]
    pub service: ServiceConfig,
    /// 默认监听地址
    #[serde(default)]
    pub server: ServerConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MongoDB 实例配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MongoInstanceConfig {
    /// MongoDB 连接 URL
    pub url: String,
    /// 数据库名称
    #[serde(default)]
    pub database: Option<String>,
}

/// 服务端点配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceEndpointConfig {
    /// 服务地址
    pub address: Option<String>,
    /// 服务端口
    pub port: Option<u16>,
}

/// 服务运行时配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceRuntimeConfig {
    /// 服务名称
    #[serde(default)]
    pub service_name: Option<String>,
    /// 服务器配置
    #[serde(default)]
    pub server: Option<ServiceEndpointConfig>,
}

/// 私信服务配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessagingServiceConfig {
    /// 运行时配置
    #[serde(flatten)]
    pub runtime: ServiceRuntimeConfig,
    /// 存储后端（mongo / memory）
    #[serde(default)]
    pub storage: Option<String>,
    /// MongoDB 配置引用
    #[serde(default)]
    pub mongodb: Option<String>,
    /// 消息集合名称
    #[serde(default)]
    pub messages_collection: Option<String>,
    /// 用户集合名称
    #[serde(default)]
    pub users_collection: Option<String>,
    /// JWT 校验密钥
    #[serde(default)]
    pub token_secret: Option<String>,
    /// 在线冲突策略（exclusive / replace）
    #[serde(default)]
    pub conflict_strategy: Option<String>,
    /// 每个连接的下行缓冲区大小
    #[serde(default)]
    pub outbound_buffer: Option<usize>,
    /// REST 发送后是否同时推送
    #[serde(default)]
    pub push_on_send: Option<bool>,
    /// WebSocket 注册是否要求 token
    #[serde(default)]
    pub require_socket_token: Option<bool>,
    /// 消息内容最大长度（字符）
    #[serde(default)]
    pub max_content_length: Option<usize>,
    /// 允许的跨域来源
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// 服务配置集合
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServicesConfig {
    /// 私信服务配置
    #[serde(default)]
    pub messaging: Option<MessagingServiceConfig>,
}

/// DevConnect 应用配置主结构体
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DevConnectAppConfig {
    /// 核心配置
    #[serde(flatten)]
    pub core: CoreConfig,
    /// MongoDB 配置映射
    #[serde(default)]
    pub mongodb: HashMap<String, MongoInstanceConfig>,
    /// 服务配置
    #[serde(default)]
    pub services: ServicesConfig,
}

impl DevConnectAppConfig {
    /// 获取核心配置
    pub fn base(&self) -> &CoreConfig {
        &self.core
    }

    /// 获取日志配置
    pub fn logging(&self) -> &LoggingConfig {
        &self.core.logging
    }

    /// 获取 MongoDB 配置
    pub fn mongodb_profile(&self, name: &str) -> Option<&MongoInstanceConfig> {
        self.mongodb.get(name)
    }

    /// 获取私信服务配置
    pub fn messaging_service(&self) -> MessagingServiceConfig {
        self.services.messaging.clone().unwrap_or_default()
    }

    /// 组合服务配置
    pub fn compose_service_config(
        &self,
        runtime: &ServiceRuntimeConfig,
        fallback_name: &str,
    ) -> CoreConfig {
        let mut cfg = self.core.clone();
        cfg.service.name = runtime
            .service_name
            .as_ref()
            .cloned()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        if let Some(server) = runtime.server.as_ref() {
            if let Some(address) = server.address.as_ref() {
                cfg.server.address = address.clone();
            }
            if let Some(port) = server.port {
                cfg.server.port = port;
            }
        }

        cfg
    }

    /// 校验配置引用
    ///
    /// 服务引用的 MongoDB 配置名必须存在
    pub fn validate_references(&self) -> Result<()> {
        if let Some(messaging) = self.services.messaging.as_ref() {
            if let Some(name) = messaging.mongodb.as_ref() {
                if !self.mongodb.contains_key(name) {
                    return Err(anyhow!(
                        "services.messaging references unknown mongodb profile `{name}`"
                    ));
                }
            }
        }
        Ok(())
    }

    /// 确保配置有默认值
    fn ensure_defaults(&mut self) {
        if self.core.server.address.is_empty() {
            self.core.server.address = "0.0.0.0".to_string();
        }
        if self.core.server.port == 0 {
            self.core.server.port = 5000;
        }
    }
}

/// 加载配置
pub fn load_config(path: Option<&str>) -> &'static DevConnectAppConfig {
    let candidates: Vec<PathBuf> = match path {
        Some(p) => vec![PathBuf::from(p)],
        None => vec![PathBuf::from("config"), PathBuf::from("config.toml")],
    };

    APP_CONFIG.get_or_init(|| {
        let mut cfg = load_with_fallback(&candidates);
        if let Err(e) = manager::ConfigManager::load_environment_config(&mut cfg) {
            warn!("failed to load environment config: {}", e);
        }
        cfg
    })
}

/// 获取应用配置
pub fn app_config() -> Option<&'static DevConnectAppConfig> {
    APP_CONFIG.get()
}

/// 使用备选方案加载配置
fn load_with_fallback(candidates: &[PathBuf]) -> DevConnectAppConfig {
    for path in candidates {
        match load_config_from_source(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("failed to load config from {}: {err}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    default_config()
}

/// 从源加载配置（文件或目录）
pub fn load_config_from_source(path: &Path) -> Result<DevConnectAppConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    let metadata = path
        .metadata()
        .with_context(|| format!("unable to read metadata for {}", path.display()))?;

    let mut cfg = if metadata.is_dir() {
        load_config_from_directory(path)?
    } else {
        load_config_from_file(path)?
    };
    cfg.ensure_defaults();
    Ok(cfg)
}

/// 从文件加载配置
fn load_config_from_file(path: &Path) -> Result<DevConnectAppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file: {}", path.display()))?;
    let cfg: DevConnectAppConfig = toml::from_str(&content)
        .with_context(|| format!("invalid config format: {}", path.display()))?;
    Ok(cfg)
}

/// 从目录加载配置
///
/// 合并顺序：`base.toml` → `shared/` → `services/` → `overrides/`
fn load_config_from_directory(path: &Path) -> Result<DevConnectAppConfig> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;

    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    merge_directory(&mut merged, &path.join("shared"))?;
    merge_directory(&mut merged, &path.join("services"))?;
    merge_directory(&mut merged, &path.join("overrides"))?;

    let cfg: DevConnectAppConfig = merged
        .try_into()
        .with_context(|| format!("invalid configuration after merging {}", path.display()))?;

    Ok(cfg)
}

/// 合并目录中的配置
fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("toml"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let value = load_toml_value(&entry.path())?;
        merge_value(root, value);
    }

    Ok(())
}

/// 加载 TOML 值
fn load_toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config fragment {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in fragment {}", path.display()))?;
    Ok(value)
}

/// 合并值：表逐键递归合并，其余类型直接覆盖
pub(crate) fn merge_value(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Table(overlay_table) => {
            if let Value::Table(base_table) = base {
                for (key, overlay_value) in overlay_table.into_iter() {
                    match base_table.get_mut(&key) {
                        Some(base_value) => merge_value(base_value, overlay_value),
                        None => {
                            base_table.insert(key, overlay_value);
                        }
                    }
                }
            } else {
                *base = Value::Table(overlay_table);
            }
        }
        other => {
            *base = other;
        }
    }
}

/// 默认配置
pub fn default_config() -> DevConnectAppConfig {
    let mut cfg = DevConnectAppConfig::default();
    cfg.ensure_defaults();
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(
            &file,
            r#"
[service]
name = "devconnect-messaging"

[server]
port = 5001

[mongodb.primary]
url = "mongodb://localhost:27017"
database = "devconnect"

[services.messaging]
mongodb = "primary"
conflict_strategy = "replace"
"#,
        )
        .unwrap();

        let cfg = load_config_from_source(&file).unwrap();
        assert_eq!(cfg.core.service.name, "devconnect-messaging");
        assert_eq!(cfg.core.server.port, 5001);
        // 缺省地址被补齐
        assert_eq!(cfg.core.server.address, "0.0.0.0");
        assert_eq!(
            cfg.mongodb_profile("primary").and_then(|p| p.database.clone()),
            Some("devconnect".to_string())
        );
        assert_eq!(
            cfg.messaging_service().conflict_strategy.as_deref(),
            Some("replace")
        );
        assert!(cfg.validate_references().is_ok());
    }

    #[test]
    fn test_directory_merge_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            r#"
[server]
address = "127.0.0.1"
port = 5000

[logging]
level = "debug"
"#,
        )
        .unwrap();
        fs::create_dir(dir.path().join("services")).unwrap();
        fs::write(
            dir.path().join("services").join("messaging.toml"),
            r#"
[services.messaging]
storage = "memory"
outbound_buffer = 16
"#,
        )
        .unwrap();
        fs::create_dir(dir.path().join("overrides")).unwrap();
        fs::write(
            dir.path().join("overrides").join("local.toml"),
            r#"
[server]
port = 6000

[services.messaging]
outbound_buffer = 64
"#,
        )
        .unwrap();

        let cfg = load_config_from_source(dir.path()).unwrap();
        assert_eq!(cfg.core.server.address, "127.0.0.1");
        assert_eq!(cfg.core.server.port, 6000);
        assert_eq!(cfg.logging().level, "debug");

        let messaging = cfg.messaging_service();
        assert_eq!(messaging.storage.as_deref(), Some("memory"));
        assert_eq!(messaging.outbound_buffer, Some(64));
    }

    #[test]
    fn test_directory_without_base_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from_source(dir.path()).unwrap_err();
        assert!(err.to_string().contains("missing base configuration"));
    }

    #[test]
    fn test_unknown_mongodb_reference() {
        let mut cfg = default_config();
        cfg.services.messaging = Some(MessagingServiceConfig {
            mongodb: Some("missing".to_string()),
            ..Default::default()
        });
        assert!(cfg.validate_references().is_err());
    }

    #[test]
    fn test_compose_service_config() {
        let cfg = default_config();
        let runtime = ServiceRuntimeConfig {
            service_name: None,
            server: Some(ServiceEndpointConfig {
                address: None,
                port: Some(7000),
            }),
        };
        let composed = cfg.compose_service_config(&runtime, "devconnect-messaging");
        assert_eq!(composed.service.name, "devconnect-messaging");
        assert_eq!(composed.server.address, "0.0.0.0");
        assert_eq!(composed.server.port, 7000);
    }
}
