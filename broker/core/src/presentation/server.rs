// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Transport Server
//!
//! Serves the router over plain HTTP (`axum::serve`) or TLS (`tokio-rustls`
//! handshake, then hyper's auto HTTP/1 + HTTP/2 connection). Both paths stop
//! accepting when the shutdown token fires, give in-flight requests up to
//! `grace` to finish, and then return, dropping whatever is still open.

use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::domain::config::TlsConfig;

/// Build a rustls server config from inline base64 PEM or PEM files.
pub fn load_tls_config(tls: &TlsConfig) -> Result<Arc<rustls::ServerConfig>> {
    let cert_pem = read_pem(tls.cert.as_deref(), tls.cert_file.as_deref(), "certificate")?;
    let key_pem = read_pem(tls.key.as_deref(), tls.key_file.as_deref(), "private key")?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid TLS certificate PEM")?;
    if certs.is_empty() {
        bail!("No certificate found in TLS certificate PEM");
    }
    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .context("Invalid TLS private key PEM")?
        .ok_or_else(|| anyhow!("No private key found in TLS key PEM"))?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("Unsupported TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("TLS certificate and private key do not match")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

fn read_pem(inline: Option<&str>, file: Option<&Path>, what: &str) -> Result<Vec<u8>> {
    match (inline, file) {
        (Some(encoded), _) => STANDARD
            .decode(encoded.trim())
            .with_context(|| format!("TLS {} is not valid base64", what)),
        (None, Some(path)) => std::fs::read(path)
            .with_context(|| format!("Failed to read TLS {} file: {:?}", what, path)),
        (None, None) => bail!("No TLS {} configured", what),
    }
}

/// Serve `router` on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    tls: Option<Arc<rustls::ServerConfig>>,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<()> {
    match tls {
        Some(config) => serve_tls(listener, router, config, shutdown, grace).await,
        None => serve_plain(listener, router, shutdown, grace).await,
    }
}

async fn grace_expired(shutdown: &CancellationToken, grace: Duration) {
    shutdown.cancelled().await;
    tokio::time::sleep(grace).await;
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<()> {
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result.context("HTTP server failed")?,
        _ = grace_expired(&shutdown, grace) => {
            warn!(grace_secs = grace.as_secs_f64(), "Shutdown grace period expired, closing open connections");
        }
    }
    Ok(())
}

async fn serve_tls(
    listener: TcpListener,
    router: Router,
    config: Arc<rustls::ServerConfig>,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<()> {
    let acceptor = TlsAcceptor::from(config);
    let builder = Arc::new(Builder::new(TokioExecutor::new()));
    let tracker = TaskTracker::new();

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let builder = Arc::clone(&builder);
        let service = TowerToHyperService::new(router.clone());
        let shutdown = shutdown.clone();

        tracker.spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    debug!(peer = %peer, "TLS handshake failed: {}", e);
                    return;
                }
            };

            let conn = builder.serve_connection_with_upgrades(TokioIo::new(tls_stream), service);
            tokio::pin!(conn);
            let mut draining = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            debug!(peer = %peer, "Connection closed with error: {}", e);
                        }
                        break;
                    }
                    _ = shutdown.cancelled(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                    _ = grace_expired(&shutdown, grace) => {
                        debug!(peer = %peer, "Dropping connection still open after grace period");
                        break;
                    }
                }
            }
        });
    }

    tracker.close();
    info!(connections = tracker.len(), "Draining open connections");
    if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
        warn!(grace_secs = grace.as_secs_f64(), "Shutdown grace period expired, closing open connections");
    }
    Ok(())
}
