// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Accounting sinks.
//!
//! Records are newline-delimited JSON. The file sink funnels every record
//! through one writer task per path so concurrent connections cannot
//! interleave partial lines; the sink side only ever does a channel send
//! and stays non-blocking.

use std::{
    io::Write,
    os::unix::net::UnixDatagram,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use dashmap::DashMap;
use enum_dispatch::enum_dispatch;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::mpsc};
use tracing::warn;

use crate::{cfg::enums::AccounterKind, models::acct::AcctRequest, policy::AccounterRef};

/// One accounting event, ready for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct AcctRecord {
    pub timestamp: String,
    pub kind: String,
    pub user: String,
    pub port: String,
    pub rem_addr: String,
    pub args: Vec<String>,
}

impl AcctRecord {
    pub fn from_request(req: &AcctRequest) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind: req.kind().to_string(),
            user: req.user.clone(),
            port: req.port.clone(),
            rem_addr: req.rem_addr.clone(),
            args: req.args.iter().map(ToString::to_string).collect(),
        }
    }

    fn to_line(&self) -> Result<String> {
        let mut line =
            serde_json::to_string(self).context("failed to serialize record")?;
        line.push('\n');
        Ok(line)
    }
}

#[enum_dispatch]
pub trait Accounter {
    /// Hands one record to the sink. An `Err` is surfaced to the client as
    /// an accounting error status and logged; it never kills the session.
    fn record(&self, rec: &AcctRecord) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct StderrAccounter;

impl Accounter for StderrAccounter {
    fn record(&self, rec: &AcctRecord) -> Result<()> {
        let line = rec.to_line()?;
        std::io::stderr()
            .lock()
            .write_all(line.as_bytes())
            .context("failed to write record to stderr")
    }
}

const DEV_LOG: &str = "/dev/log";
/// LOG_AUTHPRIV.LOG_INFO
const SYSLOG_PRIORITY: u8 = 10 * 8 + 6;

/// RFC 3164 lines over the local syslog datagram socket.
#[derive(Debug, Clone)]
pub struct SyslogAccounter {
    sock: Arc<UnixDatagram>,
}

impl SyslogAccounter {
    pub fn new() -> Result<Self> {
        let sock = UnixDatagram::unbound().context("failed to open syslog socket")?;
        Ok(Self { sock: Arc::new(sock) })
    }
}

impl Accounter for SyslogAccounter {
    fn record(&self, rec: &AcctRecord) -> Result<()> {
        let payload = rec.to_line()?;
        let msg = format!(
            "<{SYSLOG_PRIORITY}>{} tacplusd: {payload}",
            Utc::now().format("%b %e %H:%M:%S")
        );
        self.sock
            .send_to(msg.as_bytes(), DEV_LOG)
            .context("failed to send record to syslog")?;
        Ok(())
    }
}

static FILE_WRITERS: Lazy<DashMap<PathBuf, mpsc::UnboundedSender<String>>> =
    Lazy::new(DashMap::new);

/// Append-only file sink. All records for one path are serialized through
/// a single writer task, so appends stay atomic per line.
#[derive(Debug, Clone)]
pub struct FileAccounter {
    path: PathBuf,
    tx: mpsc::UnboundedSender<String>,
}

impl FileAccounter {
    pub fn new(path: &Path) -> Self {
        let tx = FILE_WRITERS
            .entry(path.to_path_buf())
            .or_insert_with(|| spawn_writer(path.to_path_buf()))
            .clone();
        Self {
            path: path.to_path_buf(),
            tx,
        }
    }
}

fn spawn_writer(path: PathBuf) -> mpsc::UnboundedSender<String> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await;

        let mut file = match file {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "accounting log unavailable");
                FILE_WRITERS.remove(&path);
                return;
            },
        };

        while let Some(line) = rx.recv().await {
            if let Err(e) = file.write_all(line.as_bytes()).await {
                warn!(path = %path.display(), error = %e, "accounting write failed");
                crate::metrics::ACCT_SINK_ERRORS.inc();
            }
        }
    });

    tx
}

impl Accounter for FileAccounter {
    fn record(&self, rec: &AcctRecord) -> Result<()> {
        self.tx
            .send(rec.to_line()?)
            .map_err(|_| anyhow!("accounting writer for {:?} is gone", self.path))
    }
}

/// Stand-in for a user whose accounter could not be resolved at build time.
#[derive(Debug, Clone, Default)]
pub struct DenyAccounter;

impl Accounter for DenyAccounter {
    fn record(&self, _rec: &AcctRecord) -> Result<()> {
        Err(anyhow!("no accounter assigned"))
    }
}

#[enum_dispatch(Accounter)]
#[derive(Debug, Clone)]
pub enum AnyAccounter {
    Stderr(StderrAccounter),
    Syslog(SyslogAccounter),
    File(FileAccounter),
    Deny(DenyAccounter),
}

impl AnyAccounter {
    /// Instantiates the sink a policy reference describes. `path_override`
    /// comes from the command line and beats the per-user `path` option.
    pub fn from_ref(
        reference: &AccounterRef,
        path_override: Option<&Path>,
    ) -> Result<Self> {
        Ok(match reference.kind {
            AccounterKind::Stderr => Self::Stderr(StderrAccounter),
            AccounterKind::Syslog => Self::Syslog(SyslogAccounter::new()?),
            AccounterKind::File => {
                let path = match path_override {
                    Some(p) => p.to_path_buf(),
                    None => reference
                        .options
                        .get("path")
                        .context("file accounter options are missing the path key")?
                        .into(),
                };
                Self::File(FileAccounter::new(&path))
            },
        })
    }

    pub fn deny() -> Self {
        Self::Deny(DenyAccounter)
    }
}
