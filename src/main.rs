// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, ensure};
use clap::Parser;
use tacplus_server_rs::{
    cfg::{
        cli::{Cli, resolve_config_path},
        config::Config,
        logger::init_logger,
    },
    policy::build::{SharedSnapshot, Snapshot},
    server::{Server, ServerOptions, build_tls_acceptor},
};
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logger(cli.level)?;

    let config_path = resolve_config_path(&cli.config)?;
    let cfg = Config::load_from_file(&config_path)
        .context("failed to load the policy document")?;
    let snapshot = Snapshot::build(&cfg, cli.acct_log_path.as_deref())
        .context("failed to build the initial policy snapshot")?;
    let shared = Arc::new(SharedSnapshot::new(snapshot));

    let tls = if cli.tls {
        ensure!(
            cli.tls_cert.is_some() && cli.tls_key.is_some(),
            "--tls requires --tls-cert and --tls-key"
        );
        Some(build_tls_acceptor(
            cli.tls_cert.as_deref().context("--tls-cert")?,
            cli.tls_key.as_deref().context("--tls-key")?,
            cli.tls_ca.as_deref(),
            cli.tls_require_client_cert,
        )?)
    } else {
        None
    };

    let listener = TcpListener::bind(cli.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", cli.bind_address()))?;

    let cancel = CancellationToken::new();
    spawn_reload_task(
        Arc::clone(&shared),
        config_path,
        cli.acct_log_path.clone(),
        cancel.clone(),
    );

    let opts = ServerOptions {
        idle_timeout: Duration::from_secs(60),
        proxy: cli.proxy,
        tls,
    };
    let server = Server::new(Arc::clone(&shared), opts, cancel.clone());

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        res = server.serve(listener) => res?,
        _ = tokio::signal::ctrl_c() => info!("SIGINT, draining"),
        _ = sigterm.recv() => info!("SIGTERM, draining"),
    }
    cancel.cancel();

    // Give in-flight connections a moment to flush their current reply.
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}

/// SIGHUP rebuilds the snapshot from disk. A rebuild that fails keeps the
/// serving snapshot; exchanges already in flight stay on whatever snapshot
/// their connection started with either way.
fn spawn_reload_task(
    shared: Arc<SharedSnapshot>,
    config_path: std::path::PathBuf,
    acct_log_path: Option<std::path::PathBuf>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut hup = match signal(SignalKind::hangup()) {
            Ok(sig) => sig,
            Err(e) => {
                warn!(error = %e, "failed to install SIGHUP handler");
                return;
            },
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = hup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("SIGHUP, rebuilding policy snapshot");
                    let rebuilt = Config::load_from_file(&config_path)
                        .and_then(|cfg| Snapshot::build(&cfg, acct_log_path.as_deref()));
                    match rebuilt {
                        Ok(snapshot) => shared.store(snapshot),
                        Err(e) => {
                            warn!(error = %e, "reload failed, keeping the serving snapshot");
                        },
                    }
                },
            }
        }
    });
}
