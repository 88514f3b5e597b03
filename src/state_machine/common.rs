// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::models::common::{PacketType, WireError};

/// Outcome of feeding one packet to a sub-machine.
pub enum Transition<R> {
    /// Send the reply and await the next packet of this session.
    Next(R),
    /// Send the reply and retire the session.
    Done(R),
}

impl<R> Transition<R> {
    pub fn reply(&self) -> &R {
        match self {
            Transition::Next(reply) | Transition::Done(reply) => reply,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Transition::Done(_))
    }
}

/// Errors that end the connection. Anything a status reply can express is
/// handled inside the sub-machines instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("session {session_id:#010x}: sequence {got}, expected {want}")]
    BadSequence { session_id: u32, got: u8, want: u8 },

    #[error("session {0:#010x}: start for a session id that is still live")]
    DuplicateSession(u32),

    #[error("session {session_id:#010x}: {got} packet on a {want} session")]
    WrongType {
        session_id: u32,
        got: PacketType,
        want: PacketType,
    },

    #[error("session {0:#010x}: continue without a preceding start")]
    NoSuchSession(u32),

    #[error("second concurrent session without single-connection capability")]
    MultiplexRefused,

    #[error("session {0:#010x}: sequence number space exhausted")]
    SequenceExhausted(u32),
}
