use anyhow::Result;
use devconnect_im_core::tracing::init_tracing_from_config;
use devconnect_im_core::{ErrorBuilder, ErrorCode, ServiceHelper};
use devconnect_messaging::MessagingServiceApp;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("DEVCONNECT_CONFIG").unwrap_or_else(|_| "config".to_string());
    let app_config = ServiceHelper::load_config(Some(&config_path), true)?;

    init_tracing_from_config(Some(app_config.logging()));

    let app = MessagingServiceApp::new(app_config).await.map_err(|err| {
        ErrorBuilder::new(
            ErrorCode::ServiceUnavailable,
            "failed to start messaging service",
        )
        .details(format!("{err:#}"))
        .build_error()
    })?;

    info!(address = %app.address(), "Starting devconnect-messaging service");

    app.run().await
}
