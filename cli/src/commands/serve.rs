// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `serve` command: assemble the broker from configuration and run it until
//! SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dataverse_broker_core::application::StandardServiceBroker;
use dataverse_broker_core::domain::config::BrokerConfig;
use dataverse_broker_core::infrastructure::{
    DataverseClient, InMemoryInstanceRepository, KubernetesTokenReviewer, StaticCatalogProvider,
};
use dataverse_broker_core::presentation::server::{load_tls_config, serve};
use dataverse_broker_core::presentation::{app, AppState};

/// Flags layered over the configuration file. Unset flags keep file values.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, value_name = "ADDR")]
    pub bind_address: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Serve plain HTTP instead of TLS
    #[arg(long)]
    pub insecure: bool,

    /// PEM certificate file
    #[arg(long, value_name = "FILE", conflicts_with = "tls_cert")]
    pub tls_cert_file: Option<PathBuf>,

    /// PEM private key file
    #[arg(long, value_name = "FILE", conflicts_with = "tls_key")]
    pub tls_private_key_file: Option<PathBuf>,

    /// Base64-encoded PEM certificate
    #[arg(long, value_name = "BASE64")]
    pub tls_cert: Option<String>,

    /// Base64-encoded PEM private key
    #[arg(long, value_name = "BASE64")]
    pub tls_key: Option<String>,

    /// Report provision and deprovision as asynchronous when the platform allows it
    #[arg(long = "async")]
    pub async_mode: bool,

    /// Require bearer tokens reviewed by the Kubernetes API server
    #[arg(long)]
    pub authenticate_k8s_token: bool,

    /// Kubernetes API server URL (defaults to the in-cluster address)
    #[arg(long, value_name = "URL")]
    pub kube_api_server: Option<String>,

    /// Serve the catalog from this whitelist directory instead of searching
    #[arg(long, value_name = "DIR")]
    pub whitelist: Option<PathBuf>,

    /// Dataverse server to search for collections
    #[arg(long, value_name = "URL")]
    pub dataverse_server: Option<String>,

    /// Short name for the Dataverse server, used in service names
    #[arg(long, value_name = "ALIAS")]
    pub dataverse_alias: Option<String>,

    /// Maximum number of collections to advertise
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Seconds to let in-flight requests finish on shutdown
    #[arg(long, value_name = "SECS")]
    pub shutdown_timeout: Option<u64>,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut BrokerConfig) {
        if let Some(addr) = &self.bind_address {
            config.server.bind_address = addr.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.insecure {
            config.server.insecure = true;
        }

        let tls = &mut config.server.tls;
        if let Some(cert) = &self.tls_cert {
            tls.cert = Some(cert.clone());
            tls.cert_file = None;
        }
        if let Some(path) = &self.tls_cert_file {
            tls.cert_file = Some(path.clone());
            tls.cert = None;
        }
        if let Some(key) = &self.tls_key {
            tls.key = Some(key.clone());
            tls.key_file = None;
        }
        if let Some(path) = &self.tls_private_key_file {
            tls.key_file = Some(path.clone());
            tls.key = None;
        }

        if self.async_mode {
            config.broker.async_mode = true;
        }
        if self.authenticate_k8s_token {
            config.auth.authenticate_k8s_token = true;
        }
        if let Some(server) = &self.kube_api_server {
            config.auth.kube_api_server = Some(server.clone());
        }
        if let Some(dir) = &self.whitelist {
            config.dataverse.whitelist_path = Some(dir.clone());
        }
        if let Some(url) = &self.dataverse_server {
            config.dataverse.server_url = url.clone();
        }
        if let Some(alias) = &self.dataverse_alias {
            config.dataverse.server_alias = alias.clone();
        }
        if let Some(max) = self.max_results {
            config.dataverse.max_results = max;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.server.shutdown_timeout_secs = secs;
        }
    }
}

pub async fn run(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config =
        BrokerConfig::load_or_default(config_path).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let client = DataverseClient::new(config.dataverse.request_timeout())
        .context("Failed to build Dataverse client")?;

    let catalog = match &config.dataverse.whitelist_path {
        Some(dir) => StaticCatalogProvider::from_whitelist(dir)
            .with_context(|| format!("Failed to load whitelist from {:?}", dir))?,
        None => StaticCatalogProvider::from_search(
            &client,
            &config.dataverse.server_alias,
            &config.dataverse.server_url,
            config.dataverse.max_results,
        )
        .await
        .with_context(|| format!("Failed to search {}", config.dataverse.server_url))?,
    };

    let repository = Arc::new(InMemoryInstanceRepository::new());
    let broker = StandardServiceBroker::new(repository, Arc::new(catalog), Arc::new(client))
        .with_async_mode(config.broker.async_mode)
        .with_min_api_version(config.broker.min_api_version);

    let mut state = AppState::new(Arc::new(broker)).with_metrics(metrics);
    if config.auth.authenticate_k8s_token {
        let reviewer = KubernetesTokenReviewer::from_config(&config.auth)
            .context("Failed to configure Kubernetes token review")?;
        state = state.with_token_reviewer(Arc::new(reviewer));
        info!("Bearer token authentication enabled");
    }

    let tls = if config.server.insecure {
        warn!("Serving plain HTTP");
        None
    } else {
        Some(load_tls_config(&config.server.tls).context("Failed to load TLS material")?)
    };

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        address = %addr,
        tls = tls.is_some(),
        async_mode = config.broker.async_mode,
        min_api_version = %config.broker.min_api_version,
        "Dataverse broker listening"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    serve(listener, app(state), tls, shutdown, config.server.shutdown_timeout()).await?;
    info!("Dataverse broker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
