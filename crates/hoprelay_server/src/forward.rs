/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Outbound side of a relay hop: turn one [`RelayRequest`] layer into an HTTP
//! call and collect what the upstream answered.

use std::time::Duration;

use anyhow::Context;
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use hoprelay_protocol::{RelayMethod, RelayRequest};
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use reqwest::Method;
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

pub const CORRELATION_ID: &str = "x-correlation-id";
pub const RELAY_HOP: &str = "x-relay-hop";

// Never copied from the upstream answer back to our caller.
const SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "content-length",
];

pub fn build_http_client(cfg: &RelayConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(cfg.http_timeout())
        .connect_timeout(cfg.http_connect_timeout())
        .pool_idle_timeout(Duration::from_secs(cfg.http_pool_idle_timeout_secs))
        .pool_max_idle_per_host(cfg.http_pool_max_idle_per_host)
        .build()
        .context("http client init")
}

/// Where the current hop sits in its chain.
#[derive(Debug, Clone, Default)]
pub struct HopContext {
    pub correlation_id: Option<String>,
    /// Value of the inbound `x-relay-hop` header, 0 for the first hop.
    pub hop: u32,
}

impl HopContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let correlation_id = headers
            .get(CORRELATION_ID)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let hop = headers
            .get(RELAY_HOP)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);
        Self {
            correlation_id,
            hop,
        }
    }
}

/// What the upstream answered, 2xx or not.
#[derive(Debug)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn is_upstream_error(&self) -> bool {
        !self.status.is_success()
    }
}

impl IntoResponse for UpstreamReply {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in self.headers.iter() {
            if SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        (self.status, headers, self.body).into_response()
    }
}

fn to_http_method(method: RelayMethod) -> Method {
    match method {
        RelayMethod::Get => Method::GET,
        RelayMethod::Head => Method::HEAD,
        RelayMethod::Post => Method::POST,
        RelayMethod::Put => Method::PUT,
        RelayMethod::Patch => Method::PATCH,
        RelayMethod::Delete => Method::DELETE,
        RelayMethod::Options => Method::OPTIONS,
    }
}

/// Issues relay requests over a shared connection pool.
#[derive(Clone)]
pub struct Forwarder {
    http: reqwest::Client,
    max_response_bytes: usize,
}

impl Forwarder {
    pub fn new(http: reqwest::Client, max_response_bytes: usize) -> Self {
        Self {
            http,
            max_response_bytes,
        }
    }

    pub fn from_config(cfg: &RelayConfig) -> anyhow::Result<Self> {
        Ok(Self::new(build_http_client(cfg)?, cfg.max_response_bytes))
    }

    /// Sends exactly one outbound request for the outer layer of `req`. The
    /// nested layer, if any, travels as the JSON body.
    pub async fn forward(&self, req: &RelayRequest, ctx: &HopContext) -> Result<UpstreamReply> {
        let url = req.url.as_str();
        let mut builder = self
            .http
            .request(to_http_method(req.method), url)
            .header(RELAY_HOP, (ctx.hop.saturating_add(1)).to_string());
        if let Some(correlation_id) = &ctx.correlation_id {
            if let Ok(value) = HeaderValue::from_str(correlation_id) {
                builder = builder.header(HeaderName::from_static(CORRELATION_ID), value);
            }
        }
        if let Some(payload) = req.nested_payload()? {
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(payload);
        }

        debug!(method = %req.method, %url, depth = req.depth(), "relay outbound");
        let mut resp = builder
            .send()
            .await
            .map_err(|e| RelayError::unreachable(url, &e))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = self.read_body(url, &mut resp).await?;

        Ok(UpstreamReply {
            status,
            headers,
            body,
        })
    }

    // Stops reading as soon as the answer grows past the limit.
    async fn read_body(&self, url: &str, resp: &mut reqwest::Response) -> Result<Bytes> {
        let limit = self.max_response_bytes;
        let too_large = || RelayError::ResponseTooLarge {
            url: url.to_string(),
            limit,
        };
        if resp.content_length().is_some_and(|len| len > limit as u64) {
            return Err(too_large());
        }
        let mut buf = BytesMut::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| RelayError::unreachable(url, &e))?
        {
            if buf.len() + chunk.len() > limit {
                return Err(too_large());
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}
