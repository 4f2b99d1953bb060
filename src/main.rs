use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use yogabook::notify::NotifyHub;
use yogabook::store::Store;
use yogabook::wire::{self, StudioFactory};
use yogabook::{maintenance, notify, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = yogabook::config::load_config().context("loading settings")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    observability::init(settings.metrics.port).context("installing metrics exporter")?;

    let tls_acceptor = yogabook::tls::load_tls_acceptor(
        settings.tls.cert.as_deref(),
        settings.tls.key.as_deref(),
    )
    .context("loading TLS certificate")?;

    let data_dir = &settings.storage.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    let hub = Arc::new(NotifyHub::new());
    tokio::spawn(notify::run_logger(hub.subscribe()));

    let wal_path = settings.storage.wal_path();
    let store = Arc::new(
        Store::open(wal_path.clone(), hub)
            .with_context(|| format!("opening {}", wal_path.display()))?,
    );
    tokio::spawn(maintenance::run_compactor(
        store.clone(),
        settings.storage.compact_threshold,
    ));

    if settings.auth.admin_password == yogabook::config::DEFAULT_ADMIN_PASSWORD {
        tracing::warn!("admin password is the default, set YOGABOOK_AUTH__ADMIN_PASSWORD");
    }
    let factory = Arc::new(StudioFactory::new(
        store,
        settings.auth.admin_password.clone(),
        settings.auth.public_password.clone(),
    ));

    let max_connections = settings.server.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = settings.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("yogabook listening on {addr}");
    info!("  wal: {}", wal_path.display());
    info!("  max_connections: {max_connections}");
    info!("  tls: {}", if tls_acceptor.is_some() { "enabled" } else { "disabled" });

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                tracing::debug!("connection from {peer}");
                metrics::counter!(observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(observability::CONNECTIONS_ACTIVE).increment(1.0);
                let factory = factory.clone();
                let tls = tls_acceptor.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = wire::process_connection(socket, factory, tls).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    info!("yogabook stopped");
    Ok(())
}
