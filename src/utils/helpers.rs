//! 服务启动辅助
//!
//! 配置加载校验与监听地址解析

use crate::config::{DevConnectAppConfig, ServiceRuntimeConfig};
use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};

pub struct ServiceHelper;

impl ServiceHelper {
    /// 加载全局配置并校验 profile 引用
    ///
    /// `strict` 为 true 时引用不一致直接返回错误，否则只记录告警
    pub fn load_config(
        config_path: Option<&str>,
        strict: bool,
    ) -> Result<&'static DevConnectAppConfig> {
        let config = crate::config::load_config(config_path);

        match config.validate_references() {
            Ok(()) => Ok(config),
            Err(err) if strict => Err(err.context("configuration references are inconsistent")),
            Err(err) => {
                tracing::warn!(error = %err, "continuing with inconsistent configuration references");
                Ok(config)
            }
        }
    }

    /// 服务监听地址：运行时覆盖优先，其次全局 `[server]`
    pub fn parse_server_addr(
        config: &DevConnectAppConfig,
        runtime: &ServiceRuntimeConfig,
        fallback_name: &str,
    ) -> Result<SocketAddr> {
        let composed = config.compose_service_config(runtime, fallback_name);
        let server = &composed.server;

        let ip: IpAddr = server.address.parse().with_context(|| {
            format!(
                "{} has an invalid listen address `{}`",
                composed.service.name, server.address
            )
        })?;
        Ok(SocketAddr::new(ip, server.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServiceEndpointConfig, default_config};

    #[test]
    fn test_parse_server_addr_uses_runtime_override() {
        let config = default_config();
        let runtime = ServiceRuntimeConfig {
            service_name: Some("devconnect-messaging".to_string()),
            server: Some(ServiceEndpointConfig {
                address: Some("127.0.0.1".to_string()),
                port: Some(5050),
            }),
        };

        let addr = ServiceHelper::parse_server_addr(&config, &runtime, "fallback").unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:5050");
    }

    #[test]
    fn test_parse_server_addr_rejects_garbage() {
        let config = default_config();
        let runtime = ServiceRuntimeConfig {
            service_name: None,
            server: Some(ServiceEndpointConfig {
                address: Some("not an address".to_string()),
                port: None,
            }),
        };

        assert!(ServiceHelper::parse_server_addr(&config, &runtime, "fallback").is_err());
    }
}
