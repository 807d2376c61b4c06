use dstools_api::{setup_routes, AppState};
use dstools_core::Settings;
use dstools_storage::UnifiedDispatcher;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let settings = Settings::from_env()?;

    dstools_infra::init_telemetry(&settings.log_level, settings.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let dispatcher = UnifiedDispatcher::new();
    tracing::info!(
        storage_types = ?dispatcher.supported_types(),
        "Storage backends registered"
    );

    let state = Arc::new(AppState::new(dispatcher, settings.clone()));
    let router = setup_routes(state);

    dstools_api::setup::server::start_server(&settings, router).await?;

    Ok(())
}
