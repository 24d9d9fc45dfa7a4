use anyhow::Result;
use docker_stats_exporter::*;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Duration;
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

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
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
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(name = version::NAME, version = version::VERSION, "Starting");
    for label in &app_config.labels.filter {
        tracing::info!(label = %label, "Filter containers by label");
    }

    let sink = Arc::new(sink::PrometheusSink::new(app_config.labels.scrape.clone())?);

    // Bind before touching Docker; a taken port is fatal.
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Start scrape server on http://{}/metrics", addr);

    let docker = source::DockerSource::connect()?;
    docker.log_server_version().await;

    let registry = Arc::new(registry::MonitorRegistry::new());
    let reconciler = Arc::new(reconciler::Reconciler::new(
        Arc::new(docker),
        registry.clone(),
        sink.clone(),
        reconciler::ReconcilerConfig::from(&app_config),
    ));
    let (reconcile_shutdown_tx, reconcile_shutdown_rx) = oneshot::channel();
    let reconciler_handle = reconciler.spawn(reconcile_shutdown_rx);

    let (server_shutdown_tx, server_shutdown_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(
        axum::serve(listener, routes::app(sink))
            .with_graceful_shutdown(async move {
                let _ = server_shutdown_rx.await;
            })
            .into_future(),
    );

    tokio::select! {
        result = &mut server => {
            result??;
            anyhow::bail!("scrape server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = reconcile_shutdown_tx.send(());
    if let Err(e) = reconciler_handle.await {
        tracing::warn!(error = %e, "Reconciler task failed");
    }
    registry.stop_all();

    let _ = server_shutdown_tx.send(());
    let timeout = Duration::from_secs(app_config.server.shutdown_timeout_secs);
    match tokio::time::timeout(timeout, server).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            timeout_secs = app_config.server.shutdown_timeout_secs,
            "Can not gracefully stop metrics server in time"
        ),
    }

    Ok(())
}
