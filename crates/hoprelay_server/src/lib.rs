/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Recursive HTTP relay.
//!
//! Each inbound request carries a JSON [`RelayRequest`](hoprelay_protocol::RelayRequest)
//! describing one outbound call. The hop issues that call, attaching the nested
//! layer (if any) as the outbound JSON body, and answers with whatever the
//! upstream returned. Chains of any depth emerge from hops pointing at other
//! hops (or at themselves).

pub mod config;
pub mod error;
pub mod forward;
pub mod metrics;
pub mod server;

pub use config::{load_config, load_config_from, log_filter, log_filter_from, RelayConfig};
pub use error::RelayError;
pub use forward::{Forwarder, HopContext, UpstreamReply};
pub use metrics::{RelayMetrics, RelayOutcome};
pub use server::{build_router, run, serve, AppState};
