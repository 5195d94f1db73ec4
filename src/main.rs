use kumo::{Config, Kumo, run_with_shutdown};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().inspect_err(|e| error!(error = %e, "Failed to load configuration"))?;
    let kumo = Kumo::new(config).inspect_err(|e| error!(error = %e, "Failed to initialize"))?;

    kumo.start()
        .await
        .inspect_err(|e| error!(error = %e, "Failed to start"))?;
    info!(version = env!("CARGO_PKG_VERSION"), "kumo running");

    run_with_shutdown(kumo).await?;
    Ok(())
}
