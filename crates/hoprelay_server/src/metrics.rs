/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Forwarded,
    UpstreamError,
    Malformed,
    Unreachable,
    TooLarge,
}

impl RelayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOutcome::Forwarded => "forwarded",
            RelayOutcome::UpstreamError => "upstream_error",
            RelayOutcome::Malformed => "malformed",
            RelayOutcome::Unreachable => "unreachable",
            RelayOutcome::TooLarge => "too_large",
        }
    }
}

#[derive(Default)]
pub struct RelayMetrics {
    pub forwarded: AtomicU64,
    pub upstream_errors: AtomicU64,
    pub malformed: AtomicU64,
    pub unreachable: AtomicU64,
    pub too_large: AtomicU64,

    duration_buckets: [AtomicU64; DURATION_BUCKETS.len()],
    duration_count: AtomicU64,
    duration_sum_us: AtomicU64,

    // (method, path, status) -> count
    requests: Mutex<BTreeMap<(String, String, u16), u64>>,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, outcome: RelayOutcome) {
        let counter = match outcome {
            RelayOutcome::Forwarded => &self.forwarded,
            RelayOutcome::UpstreamError => &self.upstream_errors,
            RelayOutcome::Malformed => &self.malformed,
            RelayOutcome::Unreachable => &self.unreachable,
            RelayOutcome::TooLarge => &self.too_large,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn outcome_count(&self, outcome: RelayOutcome) -> u64 {
        match outcome {
            RelayOutcome::Forwarded => self.forwarded.load(Ordering::Relaxed),
            RelayOutcome::UpstreamError => self.upstream_errors.load(Ordering::Relaxed),
            RelayOutcome::Malformed => self.malformed.load(Ordering::Relaxed),
            RelayOutcome::Unreachable => self.unreachable.load(Ordering::Relaxed),
            RelayOutcome::TooLarge => self.too_large.load(Ordering::Relaxed),
        }
    }

    pub fn record_request(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        {
            let mut g = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            *g.entry((method.to_string(), path.to_string(), status))
                .or_insert(0) += 1;
        }
        let secs = elapsed.as_secs_f64();
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            if secs <= *bound {
                self.duration_buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.duration_count.fetch_add(1, Ordering::Relaxed);
        self.duration_sum_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn request_count(&self, method: &str, path: &str, status: u16) -> u64 {
        let g = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        g.get(&(method.to_string(), path.to_string(), status))
            .copied()
            .unwrap_or(0)
    }

    /// Prometheus text exposition format, version 0.0.4.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP hoprelay_http_requests_total Total number of HTTP requests\n");
        out.push_str("# TYPE hoprelay_http_requests_total counter\n");
        {
            let g = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            for ((method, path, status), count) in g.iter() {
                out.push_str(&format!(
                    "hoprelay_http_requests_total{{method=\"{}\",path=\"{}\",status=\"{status}\"}} {count}\n",
                    escape_label(method),
                    escape_label(path),
                ));
            }
        }

        out.push_str("# HELP hoprelay_http_request_duration_seconds HTTP request duration in seconds\n");
        out.push_str("# TYPE hoprelay_http_request_duration_seconds histogram\n");
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            out.push_str(&format!(
                "hoprelay_http_request_duration_seconds_bucket{{le=\"{bound}\"}} {}\n",
                self.duration_buckets[i].load(Ordering::Relaxed)
            ));
        }
        let count = self.duration_count.load(Ordering::Relaxed);
        out.push_str(&format!(
            "hoprelay_http_request_duration_seconds_bucket{{le=\"+Inf\"}} {count}\n"
        ));
        let sum = self.duration_sum_us.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        out.push_str(&format!("hoprelay_http_request_duration_seconds_sum {sum}\n"));
        out.push_str(&format!("hoprelay_http_request_duration_seconds_count {count}\n"));

        out.push_str("# HELP hoprelay_relay_outcomes_total Relay results by outcome\n");
        out.push_str("# TYPE hoprelay_relay_outcomes_total counter\n");
        for outcome in [
            RelayOutcome::Forwarded,
            RelayOutcome::UpstreamError,
            RelayOutcome::Malformed,
            RelayOutcome::Unreachable,
            RelayOutcome::TooLarge,
        ] {
            out.push_str(&format!(
                "hoprelay_relay_outcomes_total{{outcome=\"{}\"}} {}\n",
                outcome.as_str(),
                self.outcome_count(outcome)
            ));
        }
        out
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
