use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use kwsearch_core::persist::IndexPaths;
use kwsearch_core::{StandardTokenizer, StopWords};
use kwsearch_server::app_from_disk;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path [env: KWSEARCH_INDEX_DIR, default: ./cache]
    #[arg(long)]
    index: Option<PathBuf>,
    /// Stopword file used when the index was built [env: KWSEARCH_STOPWORDS]
    #[arg(long)]
    stopwords: Option<PathBuf>,
    /// Disable stemming (must match the build)
    #[arg(long, default_value_t = false)]
    no_stem: bool,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let paths = IndexPaths::resolve(args.index.as_deref());
    let stopwords = StopWords::resolve(args.stopwords.as_deref()).context("loading stopwords")?;
    let tokenizer = Arc::new(StandardTokenizer::new(stopwords, !args.no_stem));
    let app: Router = app_from_disk(paths, tokenizer)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
