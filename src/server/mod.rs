// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::module_inception)]

//! TCP/TLS acceptor.
//!
//! Each accepted connection is gated by the prefix allow/deny lists, then
//! resolved to `(scope, secret, handler)` through the secret-provider
//! registry, then handed its own task running the frame loop. Connections
//! observe the policy snapshot that was current when they arrived; a
//! reload only affects later arrivals.

pub mod common;
pub mod connection;

use std::{net::IpAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
};
use tokio_rustls::{
    TlsAcceptor,
    rustls::{
        RootCertStore, ServerConfig as RustlsConfig,
        server::WebPkiClientVerifier,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    metrics,
    policy::build::{ScopeUsers, SharedSnapshot},
    server::connection::{ConnectionCtx, serve_connection},
};

/// Listener-level knobs that do not come from the policy document.
#[derive(Clone)]
pub struct ServerOptions {
    pub idle_timeout: Duration,
    /// Expect a HAProxy PROXY v1 line before the first frame and trust the
    /// source address it names.
    pub proxy: bool,
    pub tls: Option<TlsAcceptor>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            proxy: false,
            tls: None,
        }
    }
}

pub struct Server {
    snapshot: Arc<SharedSnapshot>,
    opts: ServerOptions,
    cancel: CancellationToken,
}

impl Server {
    pub fn new(
        snapshot: Arc<SharedSnapshot>,
        opts: ServerOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            snapshot,
            opts,
            cancel,
        }
    }

    /// Accept loop. Returns once the cancellation token fires; in-flight
    /// connections keep draining on their own tasks.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "listening");

        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("acceptor stopping");
                    return Ok(());
                },
                accepted = listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                },
            };
            metrics::CONNECTIONS.inc();

            let snapshot = self.snapshot.load();
            let opts = self.opts.clone();
            let cancel = self.cancel.child_token();

            tokio::spawn(async move {
                let peer_ip = peer.ip();
                if let Err(e) =
                    handle_accepted(stream, peer_ip, snapshot, opts, cancel).await
                {
                    debug!(peer = %peer_ip, error = %e, "connection ended");
                }
            });
        }
    }
}

async fn handle_accepted(
    mut stream: TcpStream,
    accepted_peer: IpAddr,
    snapshot: Arc<crate::policy::build::Snapshot>,
    opts: ServerOptions,
    cancel: CancellationToken,
) -> Result<()> {
    stream.set_nodelay(true)?;

    let peer = if opts.proxy {
        read_proxy_source(&mut stream).await?
    } else {
        accepted_peer
    };

    // Gate before any provider work; a denied peer gets no bytes back.
    if !snapshot.admits(peer) {
        debug!(%peer, "closed by prefix list");
        return Ok(());
    }

    let Some(resolved) = snapshot.registry.lookup(peer).await else {
        metrics::SECRET_PROVIDER_MISS.inc();
        debug!(%peer, "no secret provider matched");
        return Ok(());
    };

    let users: Arc<ScopeUsers> = snapshot
        .scope_users(&resolved.scope)
        .unwrap_or_else(|| Arc::new(Default::default()));

    let ctx = ConnectionCtx {
        peer,
        secret: resolved.secret,
        handler: resolved.handler,
        users,
        idle_timeout: opts.idle_timeout,
        plaintext_required: opts.tls.is_some(),
    };

    match &opts.tls {
        Some(acceptor) => {
            let tls_stream = acceptor
                .accept(stream)
                .await
                .with_context(|| format!("TLS handshake with {peer} failed"))?;
            serve_connection(tls_stream, ctx, cancel).await
        },
        None => serve_connection(stream, ctx, cancel).await,
    }
}

/// Longest legal PROXY v1 line per the haproxy spec.
const PROXY_LINE_MAX: usize = 107;

/// Reads `PROXY TCP4/TCP6 <src> <dst> <sport> <dport>\r\n` and returns the
/// source address. Anything else is a hard close.
async fn read_proxy_source(stream: &mut TcpStream) -> Result<IpAddr> {
    let mut line = Vec::with_capacity(PROXY_LINE_MAX);
    loop {
        let byte = stream.read_u8().await.context("reading PROXY line")?;
        if byte == b'\n' {
            break;
        }
        line.push(byte);
        if line.len() > PROXY_LINE_MAX {
            bail!("PROXY line too long");
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }

    let text = std::str::from_utf8(&line).context("PROXY line is not ASCII")?;
    let mut fields = text.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some("PROXY"), Some("TCP4" | "TCP6"), Some(src)) => {
            src.parse().context("bad PROXY source address")
        },
        _ => bail!("malformed PROXY line {text:?}"),
    }
}

/// Builds the TLS acceptor from PEM files. A CA bundle switches on client
/// certificate verification; `require_client_cert` makes it mandatory.
pub fn build_tls_acceptor(
    cert_path: &std::path::Path,
    key_path: &std::path::Path,
    ca_path: Option<&std::path::Path>,
    require_client_cert: bool,
) -> Result<TlsAcceptor> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(
        std::fs::File::open(cert_path)
            .with_context(|| format!("failed to open {cert_path:?}"))?,
    ))
    .collect::<std::io::Result<Vec<_>>>()
    .context("failed to parse server certificates")?;

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(
        std::fs::File::open(key_path)
            .with_context(|| format!("failed to open {key_path:?}"))?,
    ))
    .context("failed to parse server key")?
    .context("no private key found")?;

    let builder = RustlsConfig::builder();
    let config = match ca_path {
        Some(ca) => {
            let mut roots = RootCertStore::empty();
            for cert in rustls_pemfile::certs(&mut std::io::BufReader::new(
                std::fs::File::open(ca)
                    .with_context(|| format!("failed to open {ca:?}"))?,
            )) {
                roots.add(cert.context("failed to parse CA certificate")?)?;
            }
            let verifier = if require_client_cert {
                WebPkiClientVerifier::builder(Arc::new(roots)).build()?
            } else {
                WebPkiClientVerifier::builder(Arc::new(roots))
                    .allow_unauthenticated()
                    .build()?
            };
            builder.with_client_cert_verifier(verifier)
        },
        None => builder.with_no_client_auth(),
    }
    .with_single_cert(certs, key)
    .context("failed to assemble TLS configuration")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
