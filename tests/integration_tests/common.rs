// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared plumbing for the loopback scenarios: spin a real listener on an
//! ephemeral port and speak the wire protocol back at it with a minimal
//! in-test client codec.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tacplus_server_rs::{
    cfg::config::Config,
    models::{
        common::{Flags, HEADER_LEN, Header, MinorVersion, PacketType, Version},
        obfuscate,
    },
    policy::build::{SharedSnapshot, Snapshot},
    server::{Server, ServerOptions},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;

pub const SECRET: &[u8] = b"fortytwo";

/// Builds a snapshot from `doc`, binds an ephemeral loopback port, and
/// serves until the returned token is cancelled.
pub async fn start_server(doc: &str) -> Result<(SocketAddr, CancellationToken)> {
    let mut cfg: Config = serde_yaml::from_str(doc).context("inline doc")?;
    cfg.validate_and_normalize()?;
    let snapshot = Snapshot::build(&cfg, None)?;
    let shared = Arc::new(SharedSnapshot::new(snapshot));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let cancel = CancellationToken::new();
    let opts = ServerOptions {
        idle_timeout: Duration::from_secs(5),
        proxy: false,
        tls: None,
    };
    let server = Server::new(shared, opts, cancel.clone());
    tokio::spawn(async move { server.serve(listener).await });

    Ok((addr, cancel))
}

/// Sends one obfuscated frame and reads back the reply.
pub async fn transact(
    stream: &mut TcpStream,
    ty: PacketType,
    seq_no: u8,
    session_id: u32,
    body: &[u8],
) -> Result<(Header, Vec<u8>)> {
    let header = Header {
        version: Version::new(MinorVersion::Default),
        ty,
        seq_no,
        flags: Flags::empty(),
        session_id,
        length: body.len() as u32,
    };

    let mut payload = body.to_vec();
    obfuscate::toggle(&header, SECRET, &mut payload);
    stream.write_all(&header.to_bytes()).await?;
    stream.write_all(&payload).await?;

    let mut header_buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut header_buf).await?;
    let reply_header = Header::from_bytes(&header_buf).context("reply header")?;

    let mut reply_body = vec![0u8; reply_header.length as usize];
    stream.read_exact(&mut reply_body).await?;
    obfuscate::toggle(&reply_header, SECRET, &mut reply_body);

    Ok((reply_header, reply_body))
}

pub fn authen_start_body(user: &str) -> Vec<u8> {
    let mut body = vec![0x01, 0x01, 0x01, 0x01, user.len() as u8, 0, 0, 0];
    body.extend_from_slice(user.as_bytes());
    body
}

pub fn authen_continue_body(msg: &[u8], abort: bool) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(msg.len() as u16).to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.push(u8::from(abort));
    body.extend_from_slice(msg);
    body
}

pub fn author_request_body(user: &str, args: &[&str]) -> Vec<u8> {
    let mut body = vec![
        0x06,
        15,
        0x01,
        0x01,
        user.len() as u8,
        0,
        0,
        args.len() as u8,
    ];
    for arg in args {
        body.push(arg.len() as u8);
    }
    body.extend_from_slice(user.as_bytes());
    for arg in args {
        body.extend_from_slice(arg.as_bytes());
    }
    body
}

pub fn acct_request_body(user: &str, args: &[&str]) -> Vec<u8> {
    let mut body = vec![
        0x02,
        0x06,
        15,
        0x01,
        0x01,
        user.len() as u8,
        0,
        0,
        args.len() as u8,
    ];
    for arg in args {
        body.push(arg.len() as u8);
    }
    body.extend_from_slice(user.as_bytes());
    for arg in args {
        body.extend_from_slice(arg.as_bytes());
    }
    body
}
