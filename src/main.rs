use std::path::Path;
use std::sync::Arc;

use tracing::info;

use recon_engine::api::{create_router, AppState};
use recon_engine::config::{AccountRoles, Settings};
use recon_engine::observability::{init_logging, init_metrics, LogConfig, LogFormat};
use recon_engine::repositories::AccountRepository;
use recon_engine::store::{DocumentStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    // Initialize logging
    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(settings.application.log_format.as_str()),
        ..LogConfig::default()
    });
    info!("Configuration loaded");

    // Open the ledger store
    let store: Arc<dyn DocumentStore> = match &settings.store.snapshot_path {
        Some(path) => {
            info!("Loading snapshot from {}...", path);
            Arc::new(MemoryStore::from_snapshot(
                Path::new(path),
                settings.store.batch_ceiling,
            )?)
        }
        None => Arc::new(MemoryStore::with_batch_ceiling(
            settings.store.batch_ceiling,
        )),
    };

    // Resolve account roles up front; a chart missing a required account is
    // a startup failure, not a mid-repair surprise.
    let accounts = AccountRepository::new(store.clone()).find_all().await?;
    let roles = AccountRoles::resolve(&settings.engine.roles, &accounts)?;
    info!(
        accounts = accounts.len(),
        balance_adjustment = %roles.balance_adjustment.account_name,
        "account roles resolved"
    );

    // Install metrics
    let metrics_handle = init_metrics()?;

    let state = AppState::new(
        store,
        roles,
        settings.engine.sign_policy(),
        settings.engine.tolerance()?,
    )
    .with_authorization_code(settings.engine.authorization_code.clone())
    .with_renumber_kinds(settings.engine.renumber.clone())
    .with_metrics(metrics_handle);

    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", settings.application.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
