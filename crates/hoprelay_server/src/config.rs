/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub http_timeout_secs: u64,
    pub http_connect_timeout_secs: u64,
    pub http_pool_idle_timeout_secs: u64,
    pub http_pool_max_idle_per_host: usize,
    pub max_body_bytes: usize,
    /// Upstream answers larger than this are not relayed.
    pub max_response_bytes: usize,
    /// Empty when the metrics route is disabled.
    pub metrics_path: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            http_timeout_secs: 30,
            http_connect_timeout_secs: 10,
            http_pool_idle_timeout_secs: 90,
            http_pool_max_idle_per_host: 16,
            max_body_bytes: 1024 * 1024,
            max_response_bytes: 50 * 1024 * 1024,
            metrics_path: "/metrics".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout_secs)
    }

    pub fn metrics_enabled(&self) -> bool {
        !self.metrics_path.is_empty()
    }
}

pub fn load_config() -> Result<RelayConfig> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Same as [`load_config`] with a custom variable source.
pub fn load_config_from<F>(var: F) -> Result<RelayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RelayConfig::default();

    let bind = match var("HOPRELAY_BIND") {
        Some(v) => v
            .trim()
            .parse::<SocketAddr>()
            .with_context(|| format!("HOPRELAY_BIND invalid: {v}"))?,
        None => defaults.bind,
    };

    let http_timeout_secs = parse_var(&var, "HOPRELAY_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?;
    if http_timeout_secs == 0 {
        bail!("HOPRELAY_HTTP_TIMEOUT_SECS must be > 0");
    }
    let http_connect_timeout_secs = parse_var(
        &var,
        "HOPRELAY_HTTP_CONNECT_TIMEOUT_SECS",
        defaults.http_connect_timeout_secs,
    )?
    .max(1);
    let http_pool_idle_timeout_secs = parse_var(
        &var,
        "HOPRELAY_HTTP_POOL_IDLE_TIMEOUT_SECS",
        defaults.http_pool_idle_timeout_secs,
    )?;
    let http_pool_max_idle_per_host = parse_var(
        &var,
        "HOPRELAY_HTTP_POOL_MAX_IDLE_PER_HOST",
        defaults.http_pool_max_idle_per_host,
    )?;
    let max_body_bytes = parse_var(&var, "HOPRELAY_MAX_BODY_BYTES", defaults.max_body_bytes)?;
    let max_response_bytes = parse_var(
        &var,
        "HOPRELAY_MAX_RESPONSE_BYTES",
        defaults.max_response_bytes,
    )?;
    if max_response_bytes == 0 {
        bail!("HOPRELAY_MAX_RESPONSE_BYTES must be > 0");
    }

    let metrics_path = var("HOPRELAY_METRICS_PATH")
        .map(|v| v.trim().to_string())
        .unwrap_or(defaults.metrics_path);
    if !metrics_path.is_empty() {
        if !metrics_path.starts_with('/') || metrics_path == "/" {
            bail!("HOPRELAY_METRICS_PATH must be a path below / (got {metrics_path:?})");
        }
        if metrics_path == crate::server::HEALTHZ_PATH {
            bail!("HOPRELAY_METRICS_PATH collides with {}", crate::server::HEALTHZ_PATH);
        }
    }

    Ok(RelayConfig {
        bind,
        http_timeout_secs,
        http_connect_timeout_secs,
        http_pool_idle_timeout_secs,
        http_pool_max_idle_per_host,
        max_body_bytes,
        max_response_bytes,
        metrics_path,
    })
}

pub fn log_filter() -> EnvFilter {
    log_filter_from(std::env::var("RUST_LOG").ok().as_deref())
}

/// `RUST_LOG` is used as given when set and valid, otherwise `info`.
pub fn log_filter_from(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn parse_var<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} invalid: {v}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<RelayConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_config_from(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.http_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.http_connect_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.max_body_bytes, 1024 * 1024);
        assert_eq!(cfg.max_response_bytes, 50 * 1024 * 1024);
        assert_eq!(cfg.metrics_path, "/metrics");
        assert!(cfg.metrics_enabled());
    }

    #[test]
    fn reads_overrides() {
        let cfg = load(&[
            ("HOPRELAY_BIND", "127.0.0.1:9000"),
            ("HOPRELAY_HTTP_TIMEOUT_SECS", "5"),
            ("HOPRELAY_HTTP_POOL_MAX_IDLE_PER_HOST", "2"),
            ("HOPRELAY_MAX_BODY_BYTES", "4096"),
            ("HOPRELAY_MAX_RESPONSE_BYTES", "65536"),
            ("HOPRELAY_METRICS_PATH", "/_relay/metrics"),
        ])
        .unwrap();
        assert_eq!(cfg.bind.port(), 9000);
        assert_eq!(cfg.http_timeout_secs, 5);
        assert_eq!(cfg.http_pool_max_idle_per_host, 2);
        assert_eq!(cfg.max_body_bytes, 4096);
        assert_eq!(cfg.max_response_bytes, 65536);
        assert_eq!(cfg.metrics_path, "/_relay/metrics");
    }

    #[test]
    fn empty_metrics_path_disables_route() {
        let cfg = load(&[("HOPRELAY_METRICS_PATH", "")]).unwrap();
        assert!(!cfg.metrics_enabled());
    }

    #[test]
    fn log_filter_honours_rust_log() {
        assert_eq!(log_filter_from(Some("warn")).to_string(), "warn");
        assert_eq!(log_filter_from(None).to_string(), "info");
        assert_eq!(log_filter_from(Some("  ")).to_string(), "info");
        assert_eq!(log_filter_from(Some("hoprelay=loud")).to_string(), "info");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[("HOPRELAY_BIND", "not-an-addr")]).is_err());
        assert!(load(&[("HOPRELAY_HTTP_TIMEOUT_SECS", "soon")]).is_err());
        assert!(load(&[("HOPRELAY_HTTP_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("HOPRELAY_MAX_RESPONSE_BYTES", "0")]).is_err());
        assert!(load(&[("HOPRELAY_METRICS_PATH", "metrics")]).is_err());
        assert!(load(&[("HOPRELAY_METRICS_PATH", "/")]).is_err());
        assert!(load(&[("HOPRELAY_METRICS_PATH", "/healthz")]).is_err());
    }
}
