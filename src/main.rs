use anyhow::Result;
use costwise::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let pool = db::connect(
        &app_config.database.path,
        app_config.database.max_pool_size,
    )
    .await?;
    let cipher = Arc::new(credentials::CredentialCipher::new(
        &app_config.security.encryption_password,
        &app_config.security.encryption_salt,
    ));
    let account_repo = Arc::new(account_repo::AccountRepo::new(pool.clone(), cipher));
    account_repo.init().await?;
    let run_repo = Arc::new(run_repo::RunRepo::new(pool));
    run_repo.init().await?;

    let gateway = Arc::new(match &app_config.gateway.fixture_path {
        Some(path) => {
            tracing::info!(path = %path, "serving gateway data from fixture");
            gateway::FixtureGateway::load(path)?
        }
        None => {
            tracing::warn!("gateway.fixture_path not set; every inventory will be empty");
            gateway::FixtureGateway::new(gateway::Fixture::default())
        }
    });

    let orchestrator = Arc::new(orchestrator::Orchestrator::with_default_families(
        gateway.clone(),
        &app_config.analysis,
    ));
    tracing::info!(families = ?orchestrator.families(), "analyzers registered");
    let coordinator = Arc::new(coordinator::RunCoordinator::new(
        orchestrator,
        cost_analyzer::CostAnalyzer::new(gateway),
        run_repo.clone(),
    ));

    let scheduler_handle = app_config.schedule.enabled.then(|| {
        scheduler::spawn(
            account_repo.clone(),
            coordinator.clone(),
            app_config.schedule.clone(),
        )
    });

    let app = routes::app(
        account_repo,
        run_repo,
        coordinator,
        app_config.security.clone(),
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            if let Some(handle) = scheduler_handle {
                handle.abort();
            }
        }
    }

    Ok(())
}
