//! Sigil Server: loads configuration, migrates SurrealDB and checks the local KMS.

use std::error::Error;

use sigil_db::{DbConfig, DbManager};
use sigil_pki::{LocalKms, LocalKmsConfig, PkiConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sigil=info".parse().unwrap()))
        .json()
        .init();

    tracing::info!("Starting Sigil server...");

    if let Err(err) = run().await {
        tracing::error!(error = %err, "Sigil server failed");
        std::process::exit(1);
    }

    tracing::info!("Sigil server stopped.");
}

async fn run() -> Result<(), Box<dyn Error>> {
    let db_config = DbConfig::from_env();
    let pki_config = PkiConfig::from_env()?;
    // Refuse to start without a usable master key.
    LocalKms::new(&LocalKmsConfig::from_env()?)?;

    let manager = DbManager::connect(&db_config).await?;
    sigil_db::run_migrations(manager.client()).await?;
    tracing::info!("Schema migrations applied");

    tracing::info!(
        site_url = %pki_config.site_url,
        api_prefix = %pki_config.api_prefix,
        "Issuance engine ready"
    );

    // TODO: build EstService and SubscriberService over `manager.client()` once
    // an HTTP listener and a production Authorizer exist to host them.
    tokio::signal::ctrl_c().await?;
    Ok(())
}
