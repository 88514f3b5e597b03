// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Authorization bodies: Request from the client, Reply from the server
//! (RFC 8907 § 6).

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::models::{
    avp::{Args, Avp, AvpError},
    common::{BodyCursor, WireError},
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum AuthorStatus {
    PassAdd = 0x01,
    PassRepl = 0x02,
    Fail = 0x10,
    Error = 0x11,
    Follow = 0x21,
}

/// A Request that is structurally sound but carries malformed arguments is
/// answered with a status reply instead of killing the connection, so the
/// two failure classes stay distinct here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorDecodeError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Avp(#[from] AvpError),
}

/// Decoded authorization Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRequest {
    pub authen_method: u8,
    pub priv_lvl: u8,
    pub authen_type: u8,
    pub authen_service: u8,
    pub user: String,
    pub port: String,
    pub rem_addr: String,
    pub args: Args,
}

impl AuthorRequest {
    pub fn decode(body: &[u8]) -> Result<Self, AuthorDecodeError> {
        let mut cur = BodyCursor::new(body);

        let authen_method = cur.u8("author request method")?;
        let priv_lvl = cur.u8("author request priv_lvl")?;
        let authen_type = cur.u8("author request type")?;
        let authen_service = cur.u8("author request service")?;

        let user_len = cur.u8("author request user_len")? as usize;
        let port_len = cur.u8("author request port_len")? as usize;
        let rem_addr_len = cur.u8("author request rem_addr_len")? as usize;
        let arg_cnt = cur.u8("author request arg_cnt")? as usize;

        let mut arg_lens = Vec::with_capacity(arg_cnt);
        for _ in 0..arg_cnt {
            arg_lens.push(cur.u8("author request arg_len")? as usize);
        }

        let user = String::from_utf8_lossy(cur.take(user_len, "author request user")?)
            .into_owned();
        let port = String::from_utf8_lossy(cur.take(port_len, "author request port")?)
            .into_owned();
        let rem_addr =
            String::from_utf8_lossy(cur.take(rem_addr_len, "author request rem_addr")?)
                .into_owned();

        let mut raw_args = Vec::with_capacity(arg_cnt);
        for len in arg_lens {
            raw_args.push(cur.take(len, "author request arg")?);
        }
        cur.finish("author request trailing bytes")?;

        Ok(Self {
            authen_method,
            priv_lvl,
            authen_type,
            authen_service,
            user,
            port,
            rem_addr,
            args: Args::from_wire(raw_args)?,
        })
    }
}

/// Authorization Reply body, server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorReply {
    pub status: AuthorStatus,
    pub server_msg: String,
    pub args: Vec<Avp>,
}

impl AuthorReply {
    pub fn status(status: AuthorStatus) -> Self {
        Self {
            status,
            server_msg: String::new(),
            args: Vec::new(),
        }
    }

    pub fn with_message(status: AuthorStatus, server_msg: impl Into<String>) -> Self {
        Self {
            status,
            server_msg: server_msg.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(status: AuthorStatus, args: Vec<Avp>) -> Self {
        Self {
            status,
            server_msg: String::new(),
            args,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let encoded_args: Vec<Vec<u8>> =
            self.args.iter().map(Avp::encode).collect();
        for arg in &encoded_args {
            if arg.len() > usize::from(u8::MAX) {
                return Err(WireError::BadLength(arg.len() as u32));
            }
        }

        let msg = self.server_msg.as_bytes();
        let total: usize =
            6 + encoded_args.len() + msg.len() + encoded_args.iter().map(Vec::len).sum::<usize>();

        let mut out = Vec::with_capacity(total);
        out.push(self.status.into());
        out.push(encoded_args.len() as u8);
        out.extend_from_slice(&(msg.len() as u16).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // data_len, unused
        for arg in &encoded_args {
            out.push(arg.len() as u8);
        }
        out.extend_from_slice(msg);
        for arg in &encoded_args {
            out.extend_from_slice(arg);
        }
        Ok(out)
    }
}
