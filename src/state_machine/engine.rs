// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-connection session engine.
//!
//! Demultiplexes packets by session id, enforces the sequence discipline,
//! and routes each fully received request to its sub-machine. Only
//! authentication spans multiple packets, so only those sessions keep
//! state; authorization and accounting retire after one reply.
//!
//! Replies come back unobfuscated; the connection layer owns the keystream
//! because it owns the secret.

use std::{collections::HashMap, sync::Arc};

use crate::{
    cfg::enums::HandlerKind,
    metrics,
    models::{
        authen::{AuthenContinue, AuthenStart, AuthenStatus},
        common::{Flags, Header, PacketType},
    },
    policy::build::ScopeUsers,
    state_machine::{
        acct_states, authen_states::AuthenSession, author_states,
        common::{EngineError, Transition},
    },
};

struct Slot {
    ty: PacketType,
    last_seq: u8,
    machine: AuthenSession,
}

pub struct SessionEngine {
    users: Arc<ScopeUsers>,
    handler: HandlerKind,
    sessions: HashMap<u32, Slot>,
    /// Identity pinned by a successful authentication on this connection.
    bound_user: Option<String>,
    /// The peer advertised the single-connection capability. Multiplexing
    /// needs both sides: this flag and a span handler.
    peer_single_connect: bool,
}

impl SessionEngine {
    pub fn new(users: Arc<ScopeUsers>, handler: HandlerKind) -> Self {
        Self {
            users,
            handler,
            sessions: HashMap::new(),
            bound_user: None,
            peer_single_connect: false,
        }
    }

    pub fn bound_user(&self) -> Option<&str> {
        self.bound_user.as_deref()
    }

    /// Feeds one decrypted packet through the engine and returns the reply
    /// to frame. Any `Err` must close the connection.
    pub fn handle_packet(
        &mut self,
        header: &Header,
        body: &[u8],
    ) -> Result<(Header, Vec<u8>), EngineError> {
        if header.seq_no == u8::MAX {
            return Err(EngineError::SequenceExhausted(header.session_id));
        }
        if header.flags.contains(Flags::SINGLE_CONNECT) {
            self.peer_single_connect = true;
        }

        let reply_body = if self.sessions.contains_key(&header.session_id) {
            self.continue_session(header, body)?
        } else {
            self.open_session(header, body)?
        };

        let mut flags = Flags::empty();
        if self.handler == HandlerKind::Span {
            flags |= Flags::SINGLE_CONNECT;
        }
        if header.flags.contains(Flags::UNENCRYPTED) {
            flags |= Flags::UNENCRYPTED;
        }

        let reply_header = header.reply(flags, reply_body.len() as u32);
        Ok((reply_header, reply_body))
    }

    fn open_session(
        &mut self,
        header: &Header,
        body: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        if header.seq_no != 1 {
            return Err(EngineError::NoSuchSession(header.session_id));
        }
        if !self.sessions.is_empty()
            && !(self.handler == HandlerKind::Span && self.peer_single_connect)
        {
            return Err(EngineError::MultiplexRefused);
        }

        match header.ty {
            PacketType::Authen => {
                let start = AuthenStart::decode(body)?;
                let transition = AuthenSession::on_start(&start, &self.users);

                match &transition {
                    Transition::Next(_) => {
                        self.sessions.insert(
                            header.session_id,
                            Slot {
                                ty: PacketType::Authen,
                                last_seq: header.seq_no,
                                machine: AuthenSession::awaiting_user(),
                            },
                        );
                        metrics::SESSIONS_ACTIVE.inc();
                    },
                    Transition::Done(reply) => {
                        if reply.status == AuthenStatus::Pass {
                            self.bound_user = Some(start.user.clone());
                        }
                    },
                }
                Ok(transition.reply().encode())
            },
            PacketType::Author => {
                let reply = author_states::evaluate(
                    body,
                    self.bound_user.as_deref(),
                    &self.users,
                )?;
                Ok(reply.encode()?)
            },
            PacketType::Acct => {
                let reply = acct_states::record(body, &self.users)?;
                Ok(reply.encode())
            },
        }
    }

    fn continue_session(
        &mut self,
        header: &Header,
        body: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        let (reply_body, done, passed_user) = {
            let slot = self
                .sessions
                .get_mut(&header.session_id)
                .ok_or(EngineError::NoSuchSession(header.session_id))?;

            if header.ty != slot.ty {
                return Err(EngineError::WrongType {
                    session_id: header.session_id,
                    got: header.ty,
                    want: slot.ty,
                });
            }
            if header.seq_no == 1 {
                return Err(EngineError::DuplicateSession(header.session_id));
            }
            let want = slot.last_seq.checked_add(2).ok_or(
                EngineError::BadSequence {
                    session_id: header.session_id,
                    got: header.seq_no,
                    want: 0,
                },
            )?;
            if header.seq_no != want {
                return Err(EngineError::BadSequence {
                    session_id: header.session_id,
                    got: header.seq_no,
                    want,
                });
            }
            slot.last_seq = header.seq_no;

            let cont = AuthenContinue::decode(body)?;
            let transition = slot.machine.on_continue(&cont, &self.users);

            let passed_user = (transition.reply().status == AuthenStatus::Pass)
                .then(|| slot.machine.username().map(str::to_string))
                .flatten();
            (transition.reply().encode(), transition.is_done(), passed_user)
        };

        if done {
            self.sessions.remove(&header.session_id);
            metrics::SESSIONS_ACTIVE.dec();
        }
        if let Some(user) = passed_user {
            self.bound_user = Some(user);
        }
        Ok(reply_body)
    }
}
