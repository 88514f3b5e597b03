// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

/// Default listen port of this server.
pub const DEFAULT_PORT: u16 = 2046;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Tcp6,
}

#[derive(Parser, Debug)]
#[command(name = "tacplusd", about = "TACACS+ (RFC 8907) AAA server")]
pub struct Cli {
    /// Address family to listen on when --address is not given.
    #[arg(long, value_enum, default_value = "tcp")]
    pub network: Network,

    /// host:port to bind.
    #[arg(long)]
    pub address: Option<String>,

    /// Path to the policy document.
    #[arg(long, default_value = "tacplus.yaml")]
    pub config: String,

    /// Log level: 10 debug, 20 info, 30 warn.
    #[arg(long, default_value_t = 20)]
    pub level: u8,

    /// Expect a HAProxy PROXY v1 line on every connection.
    #[arg(long)]
    pub proxy: bool,

    /// Wrap the listener in TLS; bodies must then use the cleartext flag.
    #[arg(long)]
    pub tls: bool,

    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    #[arg(long)]
    pub tls_key: Option<PathBuf>,

    /// CA bundle for client certificates.
    #[arg(long)]
    pub tls_ca: Option<PathBuf>,

    #[arg(long)]
    pub tls_require_client_cert: bool,

    /// Overrides the path of every file-backed accounter.
    #[arg(long)]
    pub acct_log_path: Option<PathBuf>,
}

impl Cli {
    pub fn bind_address(&self) -> String {
        match &self.address {
            Some(addr) => addr.clone(),
            None => match self.network {
                Network::Tcp => format!("0.0.0.0:{DEFAULT_PORT}"),
                Network::Tcp6 => format!("[::]:{DEFAULT_PORT}"),
            },
        }
    }
}

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
