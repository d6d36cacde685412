/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Wire types shared by relay hops.
//!
//! A relay hop receives a [`RelayRequest`] as its JSON body, issues the
//! described request, and forwards the nested `body` (if any) as the JSON
//! payload of that request so the next hop can do the same.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid relay request: {0}")]
    InvalidShape(String),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("unsupported url scheme `{scheme}` in {url}")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("url has no host: {0}")]
    MissingHost(String),

    #[error("failed to encode relay request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProtocolError {
    fn from_decode(err: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match err.classify() {
            Category::Data => ProtocolError::InvalidShape(err.to_string()),
            Category::Syntax | Category::Eof | Category::Io => {
                ProtocolError::InvalidJson(err.to_string())
            }
        }
    }
}

/// HTTP verbs a relay hop is willing to issue upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RelayMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl RelayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMethod::Get => "GET",
            RelayMethod::Head => "HEAD",
            RelayMethod::Post => "POST",
            RelayMethod::Put => "PUT",
            RelayMethod::Patch => "PATCH",
            RelayMethod::Delete => "DELETE",
            RelayMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for RelayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.trim().to_ascii_uppercase().as_str() {
            "GET" => RelayMethod::Get,
            "HEAD" => RelayMethod::Head,
            "POST" => RelayMethod::Post,
            "PUT" => RelayMethod::Put,
            "PATCH" => RelayMethod::Patch,
            "DELETE" => RelayMethod::Delete,
            "OPTIONS" => RelayMethod::Options,
            _ => return Err(ProtocolError::UnsupportedMethod(s.to_string())),
        };
        Ok(method)
    }
}

impl TryFrom<String> for RelayMethod {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RelayMethod> for String {
    fn from(value: RelayMethod) -> Self {
        value.as_str().to_string()
    }
}

/// One layer of a relay chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub method: RelayMethod,
    pub url: Url,
    /// Payload for the upstream; itself a relay request for the next hop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<RelayRequest>>,
}

impl RelayRequest {
    pub fn leaf(method: RelayMethod, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
        }
    }

    pub fn wrapping(method: RelayMethod, url: Url, inner: RelayRequest) -> Self {
        Self {
            method,
            url,
            body: Some(Box::new(inner)),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.body.is_none()
    }

    /// Number of layers in the chain, a leaf counts as one.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut cur = self;
        while let Some(next) = cur.body.as_deref() {
            depth += 1;
            cur = next;
        }
        depth
    }

    /// Checks every layer of the chain, outermost first.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let mut cur = Some(self);
        while let Some(layer) = cur {
            validate_url(&layer.url)?;
            cur = layer.body.as_deref();
        }
        Ok(())
    }

    /// JSON payload to attach to the outbound request, `None` for a leaf.
    pub fn nested_payload(&self) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.body.as_deref() {
            Some(inner) => Ok(Some(serde_json::to_vec(inner)?)),
            None => Ok(None),
        }
    }
}

fn validate_url(url: &Url) -> Result<(), ProtocolError> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ProtocolError::UnsupportedScheme {
                scheme: other.to_string(),
                url: url.to_string(),
            })
        }
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(ProtocolError::MissingHost(url.to_string()));
    }
    Ok(())
}

/// Parses an inbound body into a validated [`RelayRequest`].
pub fn parse_relay_request(body: &[u8]) -> Result<RelayRequest, ProtocolError> {
    let req: RelayRequest = serde_json::from_slice(body).map_err(ProtocolError::from_decode)?;
    req.validate()?;
    Ok(req)
}
