use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use flipbook::app::auth::AdminAuth;
use flipbook::app::blob_store::{BlobStore, GcsBlobStore, LocalFsBlobStore};
use flipbook::app::routes::{self, AppState, DEFAULT_MAX_UPLOAD_BYTES, RouterOptions};

#[derive(Debug, Parser)]
#[command(author, version, about = "Serve the flipbook API, admin pages and viewer")]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Blob root for the local filesystem store.
    #[arg(long, default_value = "workspace-app")]
    data_dir: PathBuf,

    /// Static web assets directory (serve if exists).
    #[arg(long, default_value = "web/dist")]
    web_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn try_main() -> anyhow::Result<()> {
    flipbook::logging::init(flipbook::logging::SERVER_DEFAULT_FILTER)?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting flipbook-app");

    let bucket = env_value("FLIPBOOK_BLOB_BUCKET");
    let signed_url_ttl_secs = env_value("FLIPBOOK_SIGNED_URL_TTL_SECS")
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v >= 60 && *v <= 604_800)
        .unwrap_or(3600);

    let blobs: Arc<dyn BlobStore> = match &bucket {
        Some(bucket) => {
            tracing::info!(bucket = %bucket, signed_url_ttl_secs, "using GCS blob store");
            Arc::new(GcsBlobStore::new(bucket.clone()))
        }
        None => {
            tracing::info!(data_dir = %args.data_dir.display(), "using local filesystem blob store");
            Arc::new(LocalFsBlobStore::new(args.data_dir.clone()))
        }
    };

    let admin = AdminAuth::new(env_value("FLIPBOOK_ADMIN_PASSWORD"));
    if !admin.is_configured() {
        tracing::warn!("FLIPBOOK_ADMIN_PASSWORD is not set; admin login is disabled");
    }

    let state = AppState::new(blobs, admin, signed_url_ttl_secs);
    let options = RouterOptions {
        web_dir: Some(args.web_dir.clone()),
        max_upload_bytes: args.max_upload_bytes,
    };
    let app = routes::router(state, &options);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
