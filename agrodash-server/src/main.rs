/**
 * AGRODASH SERVER - Point d'entrée du dashboard capteurs
 *
 * RÔLE : Bootstrap : .env, logs, horloge locale, configuration, routeur HTTP.
 * Chaque requête du dashboard ouvre son propre cycle vers le broker TCP ;
 * le serveur ne garde aucun état entre deux requêtes.
 */

use agrodash_server::broker::{BrokerClient, TcpConnector};
use agrodash_server::clock::{Clock, SystemClock};
use agrodash_server::config::load_config;
use agrodash_server::http::{build_router, AppState};

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agrodash_server=info,tower_http=info".into()),
        )
        .init();

    // le fuseau local doit être lu avant que tokio ne lance ses threads
    let clock = SystemClock::local();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(run(clock))
}

async fn run(clock: SystemClock) -> anyhow::Result<()> {
    let cfg = load_config().await.context("invalid configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(clock);

    let settings = cfg.broker.settings();
    tracing::info!(host = %settings.host, port = settings.port, "broker target");

    let app_state = AppState {
        broker: Arc::new(BrokerClient::new(TcpConnector, clock.clone(), settings)),
        clock,
    };
    let app = build_router(app_state);

    let listener = TcpListener::bind(&cfg.http.listen)
        .await
        .with_context(|| format!("cannot listen on {}", cfg.http.listen))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
