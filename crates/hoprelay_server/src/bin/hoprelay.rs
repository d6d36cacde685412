/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use hoprelay_server::{load_config, log_filter, run};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .init();

    let cfg = load_config()?;
    info!(
        timeout_secs = cfg.http_timeout_secs,
        max_body_bytes = cfg.max_body_bytes,
        max_response_bytes = cfg.max_response_bytes,
        metrics = %cfg.metrics_path,
        "hoprelay starting"
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => warn!("ctrl-c handler failed: {e}"),
        }
        signal.cancel();
    });

    run(cfg, shutdown).await
}
