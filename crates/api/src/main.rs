use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use warden_api::{AppConfig, AppState};
use warden_infra::{InMemoryDirectory, bootstrap_admin, migrate_legacy_secrets, seed_default_rbac};

const CSRF_SWEEP_EVERY: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    warden_observability::init(config.log_format);
    tracing::info!(mode = %config.mode, cross_domain = config.cross_domain, "starting warden");

    let directory = Arc::new(InMemoryDirectory::new());
    seed_default_rbac(&directory)?;
    if let Some((username, password)) = &config.bootstrap_admin {
        bootstrap_admin(directory.as_ref(), username, password).await?;
    }
    if config.migrate_legacy_secrets {
        migrate_legacy_secrets(directory.as_ref()).await?;
    }

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, directory)?;
    warden_api::app::spawn_csrf_sweeper(state.csrf.clone(), CSRF_SWEEP_EVERY);
    let app = warden_api::router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
