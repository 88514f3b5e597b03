// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Accounting bodies: Request from the client, Reply from the server
//! (RFC 8907 § 7).

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::models::{
    author::AuthorDecodeError,
    avp::Args,
    common::{BodyCursor, WireError},
};

bitflags! {
    /// Record kind bits. Watchdog without Stop is an in-progress update.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AcctFlags: u8 {
        const START = 0b0000_0010;
        const STOP = 0b0000_0100;
        const WATCHDOG = 0b0000_1000;
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum AcctStatus {
    Success = 0x01,
    Error = 0x02,
    Follow = 0x21,
}

/// Decoded accounting Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcctRequest {
    pub flags: AcctFlags,
    pub authen_method: u8,
    pub priv_lvl: u8,
    pub authen_type: u8,
    pub authen_service: u8,
    pub user: String,
    pub port: String,
    pub rem_addr: String,
    pub args: Args,
}

impl AcctRequest {
    pub fn decode(body: &[u8]) -> Result<Self, AuthorDecodeError> {
        let mut cur = BodyCursor::new(body);

        let flags = AcctFlags::from_bits_truncate(cur.u8("acct request flags")?);
        let authen_method = cur.u8("acct request method")?;
        let priv_lvl = cur.u8("acct request priv_lvl")?;
        let authen_type = cur.u8("acct request type")?;
        let authen_service = cur.u8("acct request service")?;

        let user_len = cur.u8("acct request user_len")? as usize;
        let port_len = cur.u8("acct request port_len")? as usize;
        let rem_addr_len = cur.u8("acct request rem_addr_len")? as usize;
        let arg_cnt = cur.u8("acct request arg_cnt")? as usize;

        let mut arg_lens = Vec::with_capacity(arg_cnt);
        for _ in 0..arg_cnt {
            arg_lens.push(cur.u8("acct request arg_len")? as usize);
        }

        let user = String::from_utf8_lossy(cur.take(user_len, "acct request user")?)
            .into_owned();
        let port = String::from_utf8_lossy(cur.take(port_len, "acct request port")?)
            .into_owned();
        let rem_addr =
            String::from_utf8_lossy(cur.take(rem_addr_len, "acct request rem_addr")?)
                .into_owned();

        let mut raw_args = Vec::with_capacity(arg_cnt);
        for len in arg_lens {
            raw_args.push(cur.take(len, "acct request arg")?);
        }
        cur.finish("acct request trailing bytes")?;

        Ok(Self {
            flags,
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

    /// Record kind as a stable label for sinks and metrics.
    pub fn kind(&self) -> &'static str {
        if self.flags.contains(AcctFlags::WATCHDOG) {
            "watchdog"
        } else if self.flags.contains(AcctFlags::STOP) {
            "stop"
        } else if self.flags.contains(AcctFlags::START) {
            "start"
        } else {
            "unknown"
        }
    }
}

/// Accounting Reply body, server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcctReply {
    pub status: AcctStatus,
    pub server_msg: String,
}

impl AcctReply {
    pub fn status(status: AcctStatus) -> Self {
        Self {
            status,
            server_msg: String::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let msg = self.server_msg.as_bytes();
        let mut out = Vec::with_capacity(5 + msg.len());
        out.extend_from_slice(&(msg.len() as u16).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // data_len, unused
        out.push(self.status.into());
        out.extend_from_slice(msg);
        out
    }
}
