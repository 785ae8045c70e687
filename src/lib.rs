//! DevConnect IM Core 公共库
//!
//! 提供统一的配置加载、错误类型、日志初始化与指标收集功能

pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing;
pub mod utils;

pub use config::{
    ConfigManager, CoreConfig, DevConnectAppConfig, LoggingConfig, MessagingServiceConfig,
    MongoInstanceConfig, ServiceEndpointConfig, ServiceRuntimeConfig, app_config, load_config,
};
pub use error::*;
pub use utils::*;
