// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-connection frame loop.
//!
//! Reads exactly one header, then exactly one body, deobfuscates with the
//! connection's shared secret, feeds the engine, and writes the framed
//! reply back. Framing, obfuscation, protocol, and deadline errors all end
//! the connection; status-level failures were already turned into replies
//! by the engine.

use std::{net::IpAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::enums::HandlerKind,
    models::{
        common::{Flags, HEADER_LEN, Header},
        obfuscate,
    },
    policy::build::ScopeUsers,
    server::common::io_with_timeout,
    state_machine::engine::SessionEngine,
};

/// Everything a connection task needs, resolved before the first frame.
pub struct ConnectionCtx {
    pub peer: IpAddr,
    pub secret: Vec<u8>,
    pub handler: HandlerKind,
    pub users: Arc<ScopeUsers>,
    pub idle_timeout: Duration,
    /// Cleartext bodies are only legal when the transport already
    /// encrypts, i.e. under TLS.
    pub plaintext_required: bool,
}

/// Drives one accepted (and, when enabled, TLS-wrapped) stream to
/// completion. Returns `Ok` on an orderly peer close.
pub async fn serve_connection<S>(
    stream: S,
    ctx: ConnectionCtx,
    cancel: CancellationToken,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut engine = SessionEngine::new(Arc::clone(&ctx.users), ctx.handler);

    loop {
        let mut header_buf = [0u8; HEADER_LEN];
        match io_with_timeout(
            "read header",
            reader.read_exact(&mut header_buf),
            ctx.idle_timeout,
            &cancel,
        )
        .await
        {
            Ok(_) => {},
            Err(e) => {
                // EOF between frames is the peer hanging up, not an error.
                if let Some(ioe) = e.downcast_ref::<std::io::Error>()
                    && ioe.kind() == std::io::ErrorKind::UnexpectedEof
                {
                    debug!(peer = %ctx.peer, "peer closed the connection");
                    return Ok(());
                }
                return Err(e).context("while waiting for a header");
            },
        }

        let header = Header::from_bytes(&header_buf)
            .with_context(|| format!("bad header from {}", ctx.peer))?;

        let mut body = BytesMut::zeroed(header.length as usize);
        io_with_timeout(
            "read body",
            reader.read_exact(&mut body),
            ctx.idle_timeout,
            &cancel,
        )
        .await
        .context("while reading a body")?;

        let plaintext = header.flags.contains(Flags::UNENCRYPTED);
        if plaintext != ctx.plaintext_required {
            bail!(
                "peer {} sent a {} body on a {} transport",
                ctx.peer,
                if plaintext { "cleartext" } else { "obfuscated" },
                if ctx.plaintext_required { "TLS" } else { "cleartext" },
            );
        }
        if !plaintext {
            obfuscate::toggle(&header, &ctx.secret, &mut body);
        }

        let (reply_header, mut reply_body) = match engine.handle_packet(&header, &body)
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(peer = %ctx.peer, error = %e, "closing connection");
                return Err(e.into());
            },
        };

        if !reply_header.flags.contains(Flags::UNENCRYPTED) {
            obfuscate::toggle(&reply_header, &ctx.secret, &mut reply_body);
        }

        writer
            .write_all(&reply_header.to_bytes())
            .await
            .context("while writing a reply header")?;
        writer
            .write_all(&reply_body)
            .await
            .context("while writing a reply body")?;
        writer.flush().await.context("while flushing a reply")?;

        // Shutdown lets the in-flight reply finish, then closes.
        if cancel.is_cancelled() {
            debug!(peer = %ctx.peer, "draining connection on shutdown");
            return Ok(());
        }
    }
}
