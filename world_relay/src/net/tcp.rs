use crate::config::Config;
use anyhow::{Context, Result};
use tokio::net::TcpListener;

pub async fn bind(cfg: &Config) -> Result<TcpListener> {
    TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("bind {}", cfg.bind_addr))
}
