pub mod wire;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use devconnect_im_core::ServiceHelper;
use devconnect_im_core::config::DevConnectAppConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::SERVICE_NAME;
use crate::interface::http::build_router;

pub struct MessagingServiceApp {
    router: Router,
    address: SocketAddr,
}

impl MessagingServiceApp {
    pub async fn new(app_config: &DevConnectAppConfig) -> Result<Self> {
        let service_config = app_config.messaging_service();

        let address = ServiceHelper::parse_server_addr(
            app_config,
            &service_config.runtime,
            SERVICE_NAME,
        )
        .context("invalid messaging server address")?;

        let context = wire::initialize(app_config).await?;
        let router = build_router(context.state, &context.config.cors_origins);

        Ok(Self { router, address })
    }

    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.address)
            .await
            .with_context(|| format!("failed to bind {}", self.address))?;

        info!(address = %self.address, "{} listening", SERVICE_NAME);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown signal received (Ctrl+C)");
                }
            })
            .await
            .context("http server error")
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}
