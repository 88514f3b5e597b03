// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use sha2::{Digest, Sha512};
use tacplus_server_rs::{
    cfg::enums::HandlerKind,
    models::{
        acct::AcctStatus,
        authen::AuthenStatus,
        author::AuthorStatus,
        common::{Flags, Header, MinorVersion, PacketType, Version},
    },
    policy::build::ScopeUsers,
    state_machine::{common::EngineError, engine::SessionEngine},
};

use super::scope_users;

fn users() -> Arc<ScopeUsers> {
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
  - name: mr_uses_group
    scopes: [localhost]
    authenticator:
      type: 2
      options:
        hash: "{}"
    accounter:
      type: 1
    commands:
      - name: show
        action: 2
"#,
        hex::encode(Sha512::digest(b"hunter2"))
    );
    scope_users(&doc, "localhost")
}

fn header(ty: PacketType, seq_no: u8, session_id: u32, len: usize) -> Header {
    Header {
        version: Version::new(MinorVersion::Default),
        ty,
        seq_no,
        flags: Flags::empty(),
        session_id,
        length: len as u32,
    }
}

fn authen_start(user: &str) -> Vec<u8> {
    let mut body = vec![0x01, 0x01, 0x01, 0x01, user.len() as u8, 0, 0, 0];
    body.extend_from_slice(user.as_bytes());
    body
}

fn authen_continue(msg: &[u8], abort: bool) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(msg.len() as u16).to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.push(u8::from(abort));
    body.extend_from_slice(msg);
    body
}

fn author_request(user: &str, args: &[&[u8]]) -> Vec<u8> {
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
        body.extend_from_slice(arg);
    }
    body
}

fn acct_request(user: &str, args: &[&[u8]]) -> Vec<u8> {
    let mut body = vec![
        0x02, // start record
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
        body.extend_from_slice(arg);
    }
    body
}

#[test]
fn ascii_login_exchange_keeps_sequence_discipline() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Start);
    let session_id = 0x5EED_0001;

    let start = authen_start("");
    let (h1, b1) = engine
        .handle_packet(&header(PacketType::Authen, 1, session_id, start.len()), &start)
        .expect("start accepted");
    assert_eq!(h1.seq_no, 2);
    assert_eq!(h1.session_id, session_id);
    assert_eq!(b1[0], u8::from(AuthenStatus::GetUser));

    let user = authen_continue(b"mr_uses_group", false);
    let (h2, b2) = engine
        .handle_packet(&header(PacketType::Authen, 3, session_id, user.len()), &user)
        .expect("username accepted");
    assert_eq!(h2.seq_no, 4);
    assert_eq!(b2[0], u8::from(AuthenStatus::GetPass));

    let pass = authen_continue(b"hunter2", false);
    let (h3, b3) = engine
        .handle_packet(&header(PacketType::Authen, 5, session_id, pass.len()), &pass)
        .expect("password accepted");
    assert_eq!(h3.seq_no, 6);
    assert_eq!(b3[0], u8::from(AuthenStatus::Pass));

    assert_eq!(engine.bound_user(), Some("mr_uses_group"));
}

#[test]
fn abort_mid_login_fails_and_retires_the_session() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Start);
    let session_id = 0x5EED_0002;

    let start = authen_start("");
    engine
        .handle_packet(&header(PacketType::Authen, 1, session_id, start.len()), &start)
        .expect("start accepted");

    let abort = authen_continue(b"", true);
    let (_, body) = engine
        .handle_packet(&header(PacketType::Authen, 3, session_id, abort.len()), &abort)
        .expect("abort handled");
    assert_eq!(body[0], u8::from(AuthenStatus::Fail));

    // The session is gone; a fresh start on the same id is legal again.
    let start = authen_start("");
    engine
        .handle_packet(&header(PacketType::Authen, 1, session_id, start.len()), &start)
        .expect("session id reusable after the exchange ended");
}

#[test]
fn out_of_order_sequence_is_fatal() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Start);
    let session_id = 0x5EED_0003;

    let start = authen_start("");
    engine
        .handle_packet(&header(PacketType::Authen, 1, session_id, start.len()), &start)
        .expect("start accepted");

    let cont = authen_continue(b"mr_uses_group", false);
    let err = engine
        .handle_packet(&header(PacketType::Authen, 5, session_id, cont.len()), &cont)
        .expect_err("skipped sequence number");
    assert_eq!(
        err,
        EngineError::BadSequence {
            session_id,
            got: 5,
            want: 3
        }
    );
}

#[test]
fn duplicate_start_on_live_session_is_fatal() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Span);
    let session_id = 0x5EED_0004;

    let start = authen_start("");
    engine
        .handle_packet(&header(PacketType::Authen, 1, session_id, start.len()), &start)
        .expect("start accepted");

    let err = engine
        .handle_packet(&header(PacketType::Authen, 1, session_id, start.len()), &start)
        .expect_err("same session id started twice");
    assert_eq!(err, EngineError::DuplicateSession(session_id));
}

#[test]
fn wrong_packet_type_on_live_session_is_fatal() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Span);
    let session_id = 0x5EED_0005;

    let start = authen_start("");
    engine
        .handle_packet(&header(PacketType::Authen, 1, session_id, start.len()), &start)
        .expect("start accepted");

    let body = author_request("mr_uses_group", &[b"service=shell", b"cmd=show"]);
    let err = engine
        .handle_packet(&header(PacketType::Author, 3, session_id, body.len()), &body)
        .expect_err("authorization packet on an authentication session");
    assert!(matches!(err, EngineError::WrongType { .. }));
}

#[test]
fn start_handler_refuses_multiplexed_sessions() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Start);

    let start = authen_start("");
    engine
        .handle_packet(&header(PacketType::Authen, 1, 0xA, start.len()), &start)
        .expect("first session accepted");

    let err = engine
        .handle_packet(&header(PacketType::Authen, 1, 0xB, start.len()), &start)
        .expect_err("second concurrent session");
    assert_eq!(err, EngineError::MultiplexRefused);
}

#[test]
fn span_handler_advertises_single_connection() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Span);

    let start = authen_start("");
    let mut first = header(PacketType::Authen, 1, 0xA, start.len());
    first.flags = Flags::SINGLE_CONNECT;
    let (h, _) = engine
        .handle_packet(&first, &start)
        .expect("start accepted");
    assert!(h.flags.contains(Flags::SINGLE_CONNECT));

    // Both sides advertised, so a second concurrent session is fine.
    engine
        .handle_packet(&header(PacketType::Authen, 1, 0xB, start.len()), &start)
        .expect("second concurrent session accepted");
}

#[test]
fn span_handler_still_needs_the_peer_capability() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Span);

    let start = authen_start("");
    engine
        .handle_packet(&header(PacketType::Authen, 1, 0xA, start.len()), &start)
        .expect("first session accepted");

    // The peer never set SINGLE_CONNECT, so no multiplexing.
    let err = engine
        .handle_packet(&header(PacketType::Authen, 1, 0xB, start.len()), &start)
        .expect_err("second concurrent session without the capability");
    assert_eq!(err, EngineError::MultiplexRefused);
}

#[test]
fn authorize_is_single_shot() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Start);
    let session_id = 0x5EED_0006;

    let body = author_request(
        "mr_uses_group",
        &[b"service=shell", b"cmd=show", b"cmd-arg=version"],
    );
    let (h, reply) = engine
        .handle_packet(&header(PacketType::Author, 1, session_id, body.len()), &body)
        .expect("authorization handled");
    assert_eq!(h.seq_no, 2);
    assert_eq!(reply[0], u8::from(AuthorStatus::PassAdd));

    // Terminal after one reply; the id is free again.
    engine
        .handle_packet(&header(PacketType::Author, 1, session_id, body.len()), &body)
        .expect("session id reusable");
}

#[test]
fn accounting_reports_success() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Start);

    let body = acct_request("mr_uses_group", &[b"task_id=41", b"service=shell"]);
    let (_, reply) = engine
        .handle_packet(&header(PacketType::Acct, 1, 0x5EED_0007, body.len()), &body)
        .expect("accounting handled");
    // status is the fifth octet of an accounting reply
    assert_eq!(reply[4], u8::from(AcctStatus::Success));
}

#[test]
fn continue_without_a_session_is_fatal() {
    let mut engine = SessionEngine::new(users(), HandlerKind::Start);
    let cont = authen_continue(b"whoever", false);
    let err = engine
        .handle_packet(&header(PacketType::Authen, 3, 0xDEAD, cont.len()), &cont)
        .expect_err("continue with no start");
    assert_eq!(err, EngineError::NoSuchSession(0xDEAD));
}
