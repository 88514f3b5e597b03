// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Authentication bodies: Start and Continue from the client, Reply from
//! the server (RFC 8907 § 5).

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::models::common::{BodyCursor, WireError};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum AuthenAction {
    Login = 0x01,
    ChangePass = 0x02,
    SendAuth = 0x04,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum AuthenType {
    Ascii = 0x01,
    Pap = 0x02,
    Chap = 0x03,
    MsChap = 0x05,
    MsChapV2 = 0x06,
}

/// Service the authentication is performed for. Carried through to
/// accounting records but not otherwise interpreted here.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum AuthenService {
    None = 0x00,
    Login = 0x01,
    Enable = 0x02,
    Ppp = 0x03,
    Pt = 0x05,
    Rcmd = 0x06,
    X25 = 0x07,
    Nasi = 0x08,
    FwProxy = 0x09,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum AuthenStatus {
    Pass = 0x01,
    Fail = 0x02,
    GetData = 0x03,
    GetUser = 0x04,
    GetPass = 0x05,
    Restart = 0x06,
    Error = 0x07,
    Follow = 0x21,
}

/// Decoded authentication Start body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenStart {
    pub action: AuthenAction,
    pub priv_lvl: u8,
    pub authen_type: AuthenType,
    pub authen_service: u8,
    pub user: String,
    pub port: String,
    pub rem_addr: String,
    /// Free-form per-type payload; for PAP this is the password.
    pub data: Vec<u8>,
}

impl AuthenStart {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut cur = BodyCursor::new(body);

        let action_raw = cur.u8("authen start action")?;
        let action = AuthenAction::try_from(action_raw)
            .map_err(|_| WireError::BadType(action_raw))?;
        let priv_lvl = cur.u8("authen start priv_lvl")?;
        let type_raw = cur.u8("authen start type")?;
        let authen_type =
            AuthenType::try_from(type_raw).map_err(|_| WireError::BadType(type_raw))?;
        let authen_service = cur.u8("authen start service")?;

        let user_len = cur.u8("authen start user_len")? as usize;
        let port_len = cur.u8("authen start port_len")? as usize;
        let rem_addr_len = cur.u8("authen start rem_addr_len")? as usize;
        let data_len = cur.u8("authen start data_len")? as usize;

        let user = String::from_utf8_lossy(cur.take(user_len, "authen start user")?)
            .into_owned();
        let port = String::from_utf8_lossy(cur.take(port_len, "authen start port")?)
            .into_owned();
        let rem_addr =
            String::from_utf8_lossy(cur.take(rem_addr_len, "authen start rem_addr")?)
                .into_owned();
        let data = cur.take(data_len, "authen start data")?.to_vec();
        cur.finish("authen start trailing bytes")?;

        Ok(Self {
            action,
            priv_lvl,
            authen_type,
            authen_service,
            user,
            port,
            rem_addr,
            data,
        })
    }
}

/// Flag bit on a Continue body: the client gave up on the exchange.
const CONTINUE_FLAG_ABORT: u8 = 0x01;

/// Decoded authentication Continue body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenContinue {
    pub abort: bool,
    /// The answer to the previous server prompt (username, then password).
    pub user_msg: Vec<u8>,
    pub data: Vec<u8>,
}

impl AuthenContinue {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut cur = BodyCursor::new(body);

        let user_msg_len = cur.u16("authen continue user_msg_len")? as usize;
        let data_len = cur.u16("authen continue data_len")? as usize;
        let flags = cur.u8("authen continue flags")?;

        let user_msg = cur.take(user_msg_len, "authen continue user_msg")?.to_vec();
        let data = cur.take(data_len, "authen continue data")?.to_vec();
        cur.finish("authen continue trailing bytes")?;

        Ok(Self {
            abort: flags & CONTINUE_FLAG_ABORT != 0,
            user_msg,
            data,
        })
    }
}

/// Flag bit on a Reply body: the answer to this prompt must not be echoed.
const REPLY_FLAG_NOECHO: u8 = 0x01;

/// Authentication Reply body, server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenReply {
    pub status: AuthenStatus,
    pub no_echo: bool,
    pub server_msg: String,
    pub data: Vec<u8>,
}

impl AuthenReply {
    pub fn status(status: AuthenStatus) -> Self {
        Self {
            status,
            no_echo: false,
            server_msg: String::new(),
            data: Vec::new(),
        }
    }

    pub fn with_message(status: AuthenStatus, server_msg: impl Into<String>) -> Self {
        Self {
            status,
            no_echo: false,
            server_msg: server_msg.into(),
            data: Vec::new(),
        }
    }

    pub fn no_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let msg = self.server_msg.as_bytes();
        let mut out = Vec::with_capacity(6 + msg.len() + self.data.len());
        out.push(self.status.into());
        out.push(if self.no_echo { REPLY_FLAG_NOECHO } else { 0 });
        out.extend_from_slice(&(msg.len() as u16).to_be_bytes());
        out.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        out.extend_from_slice(msg);
        out.extend_from_slice(&self.data);
        out
    }
}
