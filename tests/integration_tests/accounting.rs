// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use tacplus_server_rs::models::{acct::AcctStatus, common::PacketType};
use tokio::net::TcpStream;

use crate::integration_tests::common::{acct_request_body, start_server, transact};

#[tokio::test]
async fn accounting_record_lands_in_the_log_file() -> Result<()> {
    let log_path = std::env::temp_dir().join(format!(
        "tacplus-acct-{:016x}.log",
        rand::random::<u64>()
    ));

    let doc = format!(
        r#"
secrets:
  - name: localhost
    secret: fortytwo
    provider: 1
    handler: 1
    options:
      prefixes: '["127.0.0.0/8"]'
users:
  - name: oper
    scopes: [localhost]
    accounter:
      type: 3
      options:
        path: "{}"
"#,
        log_path.display()
    );

    let (addr, cancel) = start_server(&doc).await?;
    let mut stream = TcpStream::connect(addr).await?;

    let (h, body) = transact(
        &mut stream,
        PacketType::Acct,
        1,
        0x3333_0001,
        &acct_request_body("oper", &["task_id=41", "service=shell", "cmd=show"]),
    )
    .await?;
    assert_eq!(h.seq_no, 2);
    assert_eq!(body[4], u8::from(AcctStatus::Success));

    // The writer task owns the file; give it a beat to flush.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let contents = tokio::fs::read_to_string(&log_path).await?;
    assert!(contents.contains("task_id=41"));
    assert!(contents.contains("\"kind\":\"start\""));
    assert!(contents.ends_with('\n'));

    cancel.cancel();
    tokio::fs::remove_file(&log_path).await.ok();
    Ok(())
}

#[tokio::test]
async fn user_without_accounter_reports_error() -> Result<()> {
    const DOC: &str = r#"
secrets:
  - name: localhost
    secret: fortytwo
    provider: 1
    handler: 1
    options:
      prefixes: '["127.0.0.0/8"]'
users:
  - name: oper
    scopes: [localhost]
"#;

    let (addr, cancel) = start_server(DOC).await?;
    let mut stream = TcpStream::connect(addr).await?;

    let (_, body) = transact(
        &mut stream,
        PacketType::Acct,
        1,
        0x3333_0002,
        &acct_request_body("oper", &["task_id=42"]),
    )
    .await?;
    assert_eq!(body[4], u8::from(AcctStatus::Error));

    cancel.cancel();
    Ok(())
}
