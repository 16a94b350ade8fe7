//! Accession API stub server.
//!
//! Listens on `SEEDBANK_STUB_PORT` (default 8095). Log filtering follows
//! `RUST_LOG`, defaulting to `info`. The revive state for depleted
//! accessions comes from `EngineConfig::from_env`.

use std::net::SocketAddr;

use anyhow::Context;
use seedbank_accession::{EngineConfig, InMemoryAccessionRepository};
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 8095;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = match std::env::var("SEEDBANK_STUB_PORT") {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid SEEDBANK_STUB_PORT {raw:?}"))?,
        Err(_) => DEFAULT_PORT,
    };

    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let store = InMemoryAccessionRepository::new().with_revive_state(config.revive_state);
    let app = seedbank_stub::router(store);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("seedbank-stub listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;
    Ok(())
}
