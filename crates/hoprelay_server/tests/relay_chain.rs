/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use hoprelay_server::{serve, AppState, RelayConfig, RelayOutcome};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Hop {
    url: String,
    state: AppState,
    shutdown: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
}

impl Hop {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cfg = RelayConfig {
            bind: addr,
            http_timeout_secs: 5,
            http_connect_timeout_secs: 2,
            ..RelayConfig::default()
        };
        let state = AppState::new(cfg).unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve(listener, state.clone(), shutdown.clone()));
        Self {
            url: format!("http://{addr}/"),
            state,
            shutdown,
            task,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn two_hop_chain_returns_leaf_status() {
    let leaf = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teapot"))
        .respond_with(ResponseTemplate::new(418).set_body_string("short and stout"))
        .expect(1)
        .mount(&leaf)
        .await;

    let a = Hop::spawn().await;
    let b = Hop::spawn().await;

    let resp = reqwest::Client::new()
        .post(&a.url)
        .json(&json!({
            "method": "GET",
            "url": b.url,
            "body": {
                "method": "GET",
                "url": format!("{}/teapot", leaf.uri())
            }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 418);
    assert_eq!(resp.text().await.unwrap(), "short and stout");
    // 418 is non-2xx, so both hops count it as a passed-through upstream error.
    assert_eq!(a.state.metrics.outcome_count(RelayOutcome::UpstreamError), 1);
    assert_eq!(b.state.metrics.outcome_count(RelayOutcome::UpstreamError), 1);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn self_referential_chain_peels_one_layer_per_hop() {
    let leaf = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/done"))
        .and(header("x-correlation-id", "chain-1"))
        .and(header("x-relay-hop", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .expect(1)
        .mount(&leaf)
        .await;

    let a = Hop::spawn().await;
    let resp = reqwest::Client::new()
        .post(&a.url)
        .header("x-correlation-id", "chain-1")
        .json(&json!({
            "method": "POST",
            "url": a.url,
            "body": {
                "method": "POST",
                "url": a.url,
                "body": {
                    "method": "GET",
                    "url": format!("{}/done", leaf.uri())
                }
            }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["x-correlation-id"], "chain-1");
    assert_eq!(resp.text().await.unwrap(), "done");
    assert_eq!(a.state.metrics.outcome_count(RelayOutcome::Forwarded), 3);

    a.stop().await;
}

#[tokio::test]
async fn failed_hop_terminates_chain() {
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        format!("http://127.0.0.1:{port}/")
    };

    let a = Hop::spawn().await;
    let b = Hop::spawn().await;

    let resp = reqwest::Client::new()
        .post(&a.url)
        .json(&json!({
            "method": "POST",
            "url": b.url,
            "body": {"method": "GET", "url": dead}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 502);
    assert!(resp.text().await.unwrap().contains("unreachable"));
    assert_eq!(b.state.metrics.outcome_count(RelayOutcome::Unreachable), 1);
    assert_eq!(a.state.metrics.outcome_count(RelayOutcome::UpstreamError), 1);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn broken_inner_layer_is_rejected_at_first_hop() {
    let a = Hop::spawn().await;
    let b = Hop::spawn().await;

    let resp = reqwest::Client::new()
        .post(&a.url)
        .json(&json!({
            "method": "POST",
            "url": b.url,
            "body": {"method": "GET"}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(a.state.metrics.outcome_count(RelayOutcome::Malformed), 1);
    assert_eq!(b.state.metrics.request_count("POST", "/", 200), 0);
    assert_eq!(b.state.metrics.outcome_count(RelayOutcome::Malformed), 0);

    a.stop().await;
    b.stop().await;
}
