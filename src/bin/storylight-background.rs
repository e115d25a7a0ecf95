use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use storylight::sync::background::{Background, router};
use storylight::sync::store::{ArticleStore, LocalFsArticleStore};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct BackgroundArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    addr: SocketAddr,

    /// Article store directory.
    #[arg(long, default_value = "storylight-data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    storylight::logging::init_with_default("info,tower_http=debug")?;

    let args = BackgroundArgs::parse();
    tracing::info!(?args, "starting storylight-background");

    let store: Arc<dyn ArticleStore> = Arc::new(LocalFsArticleStore::new(&args.data_dir));
    let app = router(Arc::new(Background::new(store)));

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
