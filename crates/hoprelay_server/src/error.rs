/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::response::{IntoResponse, Response};
use hoprelay_protocol::ProtocolError;
use http::StatusCode;
use thiserror::Error;

/// Failures local to one relay hop. A non-2xx answer from the upstream is not
/// one of these: it is passed through to the caller as-is.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("malformed relay request: {0}")]
    MalformedRequest(#[from] ProtocolError),

    #[error("upstream {url} unreachable: {reason}")]
    UpstreamUnreachable { url: String, reason: String },

    #[error("upstream {url} response too large (limit {limit} bytes)")]
    ResponseTooLarge { url: String, limit: usize },
}

impl RelayError {
    pub fn unreachable(url: &str, err: &reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            "timed out".to_string()
        } else if err.is_connect() {
            format!("connect failed: {err}")
        } else {
            err.to_string()
        };
        RelayError::UpstreamUnreachable {
            url: url.to_string(),
            reason,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamUnreachable { .. } | RelayError::ResponseTooLarge { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
