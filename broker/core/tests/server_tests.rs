// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::pki_types::{CertificateDer, ServerName};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;

use common::Harness;
use dataverse_broker_core::domain::config::TlsConfig;
use dataverse_broker_core::presentation::server::{load_tls_config, serve};

type ServerHandle = JoinHandle<anyhow::Result<()>>;

async fn start(router: Router, grace: Duration) -> (SocketAddr, CancellationToken, ServerHandle) {
    start_with_tls(router, None, grace).await
}

async fn start_with_tls(
    router: Router,
    tls: Option<Arc<rustls::ServerConfig>>,
    grace: Duration,
) -> (SocketAddr, CancellationToken, ServerHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(serve(listener, router, tls, shutdown.clone(), grace));
    (addr, shutdown, handle)
}

/// Self-signed `localhost` certificate as inline TLS config plus its DER for the client.
fn self_signed() -> (TlsConfig, CertificateDer<'static>) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let config = TlsConfig {
        cert: Some(STANDARD.encode(certified.cert.pem())),
        key: Some(STANDARD.encode(certified.key_pair.serialize_pem())),
        ..Default::default()
    };
    (config, certified.cert.der().clone())
}

fn tls_connector(root: CertificateDer<'static>) -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.add(root).unwrap();
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    TlsConnector::from(Arc::new(config))
}

/// Send a bare HTTP/1.1 GET over TLS and return the raw response text.
async fn tls_get(connector: &TlsConnector, addr: SocketAddr, path: &str) -> String {
    let tcp = TcpStream::connect(addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let mut stream = connector.connect(server_name, tcp).await.unwrap();

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nX-Broker-API-Version: 2.13\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut received = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => received.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&received).into_owned()
}

#[tokio::test]
async fn test_serves_until_cancelled() {
    let harness = Harness::new(false);
    let (addr, shutdown, handle) = start(harness.router(), Duration::from_secs(1)).await;

    let body: serde_json::Value = reqwest::get(format!("http://{}/healthz", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    let response = reqwest::Client::new()
        .get(format!("http://{}/v2/catalog", addr))
        .header("X-Broker-API-Version", "2.13")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_in_flight_request_is_cut_off_after_grace() {
    let router = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "done"
        }),
    );
    let (addr, shutdown, handle) = start(router, Duration::from_millis(200)).await;

    let request = tokio::spawn(reqwest::get(format!("http://{}/slow", addr)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server ignored the grace period")
        .unwrap()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    request.abort();
}

#[tokio::test]
async fn test_stops_accepting_after_cancel() {
    let harness = Harness::new(false);
    let (addr, shutdown, handle) = start(harness.router(), Duration::from_millis(200)).await;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    let result = reqwest::Client::new()
        .get(format!("http://{}/healthz", addr))
        .timeout(Duration::from_millis(500))
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_serves_over_tls_until_cancelled() {
    let (tls, root) = self_signed();
    let server_config = load_tls_config(&tls).unwrap();
    let harness = Harness::new(false);
    let (addr, shutdown, handle) =
        start_with_tls(harness.router(), Some(server_config), Duration::from_secs(1)).await;
    let connector = tls_connector(root);

    let response = tls_get(&connector, addr, "/healthz").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    assert!(response.contains(r#"{"status":"ok"}"#));

    let response = tls_get(&connector, addr, "/v2/catalog").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);

    // Plain HTTP against the TLS port gets no response.
    let plain = reqwest::Client::new()
        .get(format!("http://{}/healthz", addr))
        .timeout(Duration::from_millis(500))
        .send()
        .await;
    assert!(plain.is_err());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_tls_in_flight_request_is_cut_off_after_grace() {
    let (tls, root) = self_signed();
    let server_config = load_tls_config(&tls).unwrap();
    let router = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "done"
        }),
    );
    let (addr, shutdown, handle) =
        start_with_tls(router, Some(server_config), Duration::from_millis(200)).await;
    let connector = tls_connector(root);

    let request = tokio::spawn(async move { tls_get(&connector, addr, "/slow").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server ignored the grace period")
        .unwrap()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    // The connection is closed without a response once the grace period lapses.
    let response = tokio::time::timeout(Duration::from_secs(2), request)
        .await
        .expect("connection outlived the grace period")
        .unwrap();
    assert!(!response.contains("done"));
}

#[test]
fn test_tls_config_rejects_mismatched_key() {
    let (mut tls, _) = self_signed();
    let (other, _) = self_signed();
    tls.key = other.key;
    let err = load_tls_config(&tls).unwrap_err();
    assert!(err.to_string().contains("do not match"), "{:#}", err);
}
