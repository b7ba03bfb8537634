use config::{Config, MissingConfigError, StoreBackend};
use media::S3MediaStore;
use plaza_db::{
    client::DbClient,
    memory::MemoryStore,
    store::{Store, StoreError},
};
use server::ServerState;
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod media;
mod server;
mod social;
#[cfg(test)]
mod test_util;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error(transparent)]
    MissingConfig(#[from] MissingConfigError),
    #[error("Error preparing the store: {0}")]
    Store(#[from] StoreError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "plaza_api=debug,plaza_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_config() -> Result<Config, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    Config::from_env().map_err(InitError::from)
}

async fn connect_store(config: &Config) -> Result<Arc<dyn Store>, InitError> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let client =
                DbClient::connect(config.database_url()?, config.database_max_connections)
                    .await?;
            client.migrate().await?;
            info!("Connected to Postgres and applied migrations");
            Ok(Arc::new(client))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store, nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let config = get_config()?;

    let missing_buckets = config.missing_buckets();
    if !missing_buckets.is_empty() {
        warn!(
            ?missing_buckets,
            "Bucket bindings are missing, endpoints needing them will fail"
        );
    }

    let store = connect_store(&config).await?;
    let media = S3MediaStore::from_env(config.media_url_expiry()).await;

    let shutdown = CancellationToken::new();
    let reconciler = config.reconcile_interval().map(|interval| {
        tokio::spawn(social::reconcile::run_periodically(
            store.clone(),
            interval,
            shutdown.clone(),
        ))
    });

    let server_address = SocketAddr::new(config.server_address, config.server_port);
    let state = ServerState {
        store,
        media: Arc::new(media),
        config: Arc::new(config),
    };
    let app = server::app(state);

    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(InitError::TcpServe)?;

    if let Some(reconciler) = reconciler
        && let Err(err) = reconciler.await
    {
        warn!(error = %err, "Reconciliation task ended abnormally");
    }

    Ok(())
}
