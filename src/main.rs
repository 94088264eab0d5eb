use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use portal_access::config::{PortalConfig, StorageBackend};
use portal_access::storage::{InMemoryListStorage, ListStorage, SqliteListStorage};
use portal_access::{create_app, db, docs, stores};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let config = PortalConfig::from_env()?;
    let storage = open_storage(&config).await?;

    let app = create_app(storage).await?;
    let openapi = docs::build_openapi(config.port)?;
    let app = app.merge(docs::swagger_routes(openapi));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    match &config.tls {
        Some(tls) => {
            let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .context("failed to load TLS certificate or key")?;
            tracing::info!("listening on https://{}", addr);
            axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            tracing::info!("listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}

async fn open_storage(config: &PortalConfig) -> anyhow::Result<Arc<dyn ListStorage>> {
    match config.storage_backend {
        StorageBackend::Sqlite => {
            let pool = db::init(config.database_url()?).await?;
            tracing::info!("using sqlite list storage");
            Ok(Arc::new(SqliteListStorage::new(pool)))
        }
        StorageBackend::Memory => {
            // nothing survives a restart, so provision on every start
            let storage = Arc::new(InMemoryListStorage::new());
            stores::provision(storage.as_ref(), config).await?;
            tracing::warn!("using in-memory list storage; data is lost on exit");
            Ok(storage)
        }
    }
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
