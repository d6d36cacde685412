/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use hoprelay_protocol::parse_relay_request;
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::forward::{Forwarder, HopContext, UpstreamReply, CORRELATION_ID};
use crate::metrics::{RelayMetrics, RelayOutcome};

pub const HEALTHZ_PATH: &str = "/healthz";
pub const REQUEST_ID: &str = "x-request-id";

static REQ_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    let id = REQ_ID.fetch_add(1, Ordering::Relaxed);
    format!("req-{id}")
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<RelayConfig>,
    pub forwarder: Forwarder,
    pub metrics: Arc<RelayMetrics>,
}

impl AppState {
    pub fn new(cfg: RelayConfig) -> Result<Self> {
        let forwarder = Forwarder::from_config(&cfg)?;
        Ok(Self {
            cfg: Arc::new(cfg),
            forwarder,
            metrics: Arc::new(RelayMetrics::new()),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut app: Router<AppState> = Router::new().route(HEALTHZ_PATH, get(healthz));
    if state.cfg.metrics_enabled() {
        app = app.route(&state.cfg.metrics_path, get(metrics_prom));
    }
    app.fallback(relay)
        .layer(axum::extract::DefaultBodyLimit::max(state.cfg.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), track_metrics))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                let request_id = req
                    .headers()
                    .get(REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("req");
                let correlation_id = req
                    .headers()
                    .get(CORRELATION_ID)
                    .and_then(|v| v.to_str().ok());
                info_span!(
                    "http",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id,
                    correlation_id = ?correlation_id
                )
            }),
        )
        .layer(from_fn(echo_request_ids))
        .layer(from_fn(ensure_request_ids))
        .with_state(state)
}

/// Serves until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr = listener.local_addr().context("listener addr")?;
    let app = build_router(state);
    info!("hoprelay listening on http://{addr}");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("serve")?;
    info!("hoprelay on {addr} stopped");
    Ok(())
}

pub async fn run(cfg: RelayConfig, shutdown: CancellationToken) -> Result<()> {
    let bind: SocketAddr = cfg.bind;
    let state = AppState::new(cfg)?;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    serve(listener, state, shutdown).await
}

async fn relay(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let ctx = HopContext::from_headers(&headers);
    match relay_once(&state, &ctx, &body).await {
        Ok(reply) => {
            if reply.is_upstream_error() {
                state.metrics.record_outcome(RelayOutcome::UpstreamError);
            } else {
                state.metrics.record_outcome(RelayOutcome::Forwarded);
            }
            reply.into_response()
        }
        Err(e) => {
            match &e {
                RelayError::MalformedRequest(_) => {
                    state.metrics.record_outcome(RelayOutcome::Malformed);
                    warn!(hop = ctx.hop, "{e}");
                }
                RelayError::UpstreamUnreachable { .. } => {
                    state.metrics.record_outcome(RelayOutcome::Unreachable);
                    error!(hop = ctx.hop, "{e}");
                }
                RelayError::ResponseTooLarge { .. } => {
                    state.metrics.record_outcome(RelayOutcome::TooLarge);
                    warn!(hop = ctx.hop, "{e}");
                }
            }
            e.into_response()
        }
    }
}

async fn relay_once(state: &AppState, ctx: &HopContext, body: &[u8]) -> crate::error::Result<UpstreamReply> {
    let req = parse_relay_request(body)?;
    let reply = state.forwarder.forward(&req, ctx).await?;
    if reply.is_upstream_error() {
        warn!(
            method = %req.method,
            url = %req.url,
            status = reply.status.as_u16(),
            depth = req.depth(),
            hop = ctx.hop,
            "upstream answered with error status"
        );
    } else {
        info!(
            method = %req.method,
            url = %req.url,
            status = reply.status.as_u16(),
            depth = req.depth(),
            hop = ctx.hop,
            "relayed"
        );
    }
    Ok(reply)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_prom(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.render_prometheus(),
    )
}

async fn track_metrics(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = metrics_method_label(req.method());
    let path = metrics_path_label(&state.cfg, req.uri().path());
    let resp = next.run(req).await;
    state
        .metrics
        .record_request(method, path, resp.status().as_u16(), start.elapsed());
    resp
}

fn metrics_method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::PATCH => "PATCH",
        Method::DELETE => "DELETE",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

// Relay traffic may arrive on any path, keep label cardinality bounded.
fn metrics_path_label<'a>(cfg: &'a RelayConfig, path: &str) -> &'a str {
    if path == HEALTHZ_PATH {
        HEALTHZ_PATH
    } else if cfg.metrics_enabled() && path == cfg.metrics_path {
        cfg.metrics_path.as_str()
    } else {
        "/"
    }
}

async fn ensure_request_ids(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let headers = req.headers_mut();
    if headers.get(REQUEST_ID).is_none() {
        let request_id = next_request_id();
        headers.insert(
            REQUEST_ID,
            HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("req")),
        );
    }
    if headers.get(CORRELATION_ID).is_none() {
        if let Some(req_id) = headers.get(REQUEST_ID).cloned() {
            headers.insert(CORRELATION_ID, req_id);
        }
    }
    next.run(req).await
}

async fn echo_request_ids(req: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = req.headers().get(REQUEST_ID).cloned();
    let correlation_id = req.headers().get(CORRELATION_ID).cloned();
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    if let Some(v) = request_id {
        headers.insert(REQUEST_ID, v);
    }
    if let Some(v) = correlation_id {
        headers.insert(CORRELATION_ID, v);
    }
    resp
}
