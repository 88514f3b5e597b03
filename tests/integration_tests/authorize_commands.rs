// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use tacplus_server_rs::models::{author::AuthorStatus, common::PacketType};
use tokio::net::TcpStream;

use crate::integration_tests::common::{author_request_body, start_server, transact};

const DOC: &str = r#"
secrets:
  - name: localhost
    secret: fortytwo
    provider: 1
    handler: 2
    options:
      prefixes: '["127.0.0.0/8"]'
users:
  - name: oper
    scopes: [localhost]
    commands:
      - name: show
        action: 2
      - name: "|"
        action: 2
        match: ["sudo.*", "grep.*"]
  - name: restricted
    scopes: [localhost]
    commands:
      - name: show
        action: 2
"#;

#[tokio::test]
async fn plain_command_passes_over_the_wire() -> Result<()> {
    let (addr, cancel) = start_server(DOC).await?;
    let mut stream = TcpStream::connect(addr).await?;

    let (h, body) = transact(
        &mut stream,
        PacketType::Author,
        1,
        0x2222_0001,
        &author_request_body(
            "oper",
            &["service=shell", "cmd=show", "cmd-arg=version"],
        ),
    )
    .await?;
    assert_eq!(h.seq_no, 2);
    assert_eq!(body[0], u8::from(AuthorStatus::PassAdd));

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn pipeline_requires_the_pipe_rule() -> Result<()> {
    let (addr, cancel) = start_server(DOC).await?;
    let piped = [
        "service=shell",
        "cmd=show",
        "cmd-arg=version",
        "cmd-arg=|",
        "cmd-arg=grep uptime",
    ];

    // Multiplexed over one span connection: two sessions, two answers.
    let mut stream = TcpStream::connect(addr).await?;
    let (_, denied) = transact(
        &mut stream,
        PacketType::Author,
        1,
        0x2222_0002,
        &author_request_body("restricted", &piped),
    )
    .await?;
    assert_eq!(denied[0], u8::from(AuthorStatus::Fail));

    let (_, allowed) = transact(
        &mut stream,
        PacketType::Author,
        1,
        0x2222_0003,
        &author_request_body("oper", &piped),
    )
    .await?;
    assert_eq!(allowed[0], u8::from(AuthorStatus::PassAdd));

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn unknown_user_is_denied() -> Result<()> {
    let (addr, cancel) = start_server(DOC).await?;
    let mut stream = TcpStream::connect(addr).await?;

    let (_, body) = transact(
        &mut stream,
        PacketType::Author,
        1,
        0x2222_0004,
        &author_request_body("ghost", &["service=shell", "cmd=show"]),
    )
    .await?;
    assert_eq!(body[0], u8::from(AuthorStatus::Fail));

    cancel.cancel();
    Ok(())
}
