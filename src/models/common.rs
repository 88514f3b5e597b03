// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fixed 12-octet TACACS+ packet header (RFC 8907 § 4.1).
//!
//! ```text
//!  0                   1                   2                   3
//! +---------------+---------------+---------------+---------------+
//! | major | minor |  packet type  |    seq_no     |     flags     |
//! +---------------+---------------+---------------+---------------+
//! |                          session_id                           |
//! +---------------+---------------+---------------+---------------+
//! |                            length                             |
//! +---------------+---------------+---------------+---------------+
//! ```
//!
//! Everything after these 12 octets is the body, whose interpretation
//! depends on `packet type` and whose bytes are obfuscated unless the
//! `UNENCRYPTED` flag is set.

use core::fmt;

use bitflags::bitflags;
use byteorder::{ByteOrder, NetworkEndian};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

pub const HEADER_LEN: usize = 12;

/// Upper bound on the body of a single packet. A length field above this
/// aborts the connection before any allocation happens.
pub const MAX_BODY_LEN: u32 = 65_535;

/// Errors produced while framing or deframing packets. Every one of these
/// is fatal to the connection that produced it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated packet: {0}")]
    Truncated(&'static str),

    #[error("unsupported protocol version byte 0x{0:02x}")]
    VersionUnsupported(u8),

    #[error("body length {0} out of bounds (max {MAX_BODY_LEN})")]
    BadLength(u32),

    #[error("unknown packet type 0x{0:02x}")]
    BadType(u8),
}

/// The three packet types of the protocol. Each owns an independent
/// sub-machine in the session engine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
pub enum PacketType {
    Authen = 0x01,
    Author = 0x02,
    Acct = 0x03,
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PacketType::Authen => "authentication",
            PacketType::Author => "authorization",
            PacketType::Acct => "accounting",
        })
    }
}

/// Protocol minor version. The major version is always 0xC; minor version
/// 1 is used by PAP/CHAP style authentication starts, 0 by everything else.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum MinorVersion {
    #[default]
    Default = 0x0,
    V1 = 0x1,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub minor: MinorVersion,
}

impl Version {
    pub const MAJOR: u8 = 0xC;

    pub fn new(minor: MinorVersion) -> Self {
        Self { minor }
    }

    /// The raw wire byte, major nibble above minor nibble.
    pub fn wire_byte(self) -> u8 {
        (Self::MAJOR << 4) | u8::from(self.minor)
    }
}

impl TryFrom<u8> for Version {
    type Error = WireError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        if raw >> 4 != Self::MAJOR {
            return Err(WireError::VersionUnsupported(raw));
        }
        let minor = MinorVersion::try_from(raw & 0x0F)
            .map_err(|_| WireError::VersionUnsupported(raw))?;
        Ok(Self { minor })
    }
}

bitflags! {
    /// Header flag byte. Unknown bits are rejected at decode time.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        /// Body travels in cleartext. Required under TLS, refused otherwise
        /// unless the deployment explicitly allows it.
        const UNENCRYPTED = 0b0000_0001;
        /// Peer is able to multiplex several sessions over this connection.
        const SINGLE_CONNECT = 0b0000_0100;
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub ty: PacketType,
    pub seq_no: u8,
    pub flags: Flags,
    pub session_id: u32,
    pub length: u32,
}

impl Header {
    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated("header"));
        }

        let version = Version::try_from(buf[0])?;
        let ty = PacketType::try_from(buf[1]).map_err(|_| WireError::BadType(buf[1]))?;
        // Bits outside the two defined ones MUST be zero on the wire; we
        // drop them rather than kill the connection.
        let flags = Flags::from_bits_truncate(buf[3]);

        let length = NetworkEndian::read_u32(&buf[8..12]);
        if length > MAX_BODY_LEN {
            return Err(WireError::BadLength(length));
        }

        Ok(Self {
            version,
            ty,
            seq_no: buf[2],
            flags,
            session_id: NetworkEndian::read_u32(&buf[4..8]),
            length,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = self.version.wire_byte();
        buf[1] = self.ty.into();
        buf[2] = self.seq_no;
        buf[3] = self.flags.bits();
        NetworkEndian::write_u32(&mut buf[4..8], self.session_id);
        NetworkEndian::write_u32(&mut buf[8..12], self.length);
        buf
    }

    /// Header for the reply to this packet. The engine rejects a request
    /// at sequence 255 before ever calling this, so the increment cannot
    /// wrap.
    pub fn reply(&self, flags: Flags, body_len: u32) -> Self {
        Self {
            version: self.version,
            ty: self.ty,
            seq_no: self.seq_no.saturating_add(1),
            flags,
            session_id: self.session_id,
            length: body_len,
        }
    }
}

/// Reads a big-endian u16 length-prefixed field cursor style; shared by the
/// three body decoders.
pub(crate) struct BodyCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyCursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn u8(&mut self, what: &'static str) -> Result<u8, WireError> {
        let b = *self.buf.get(self.pos).ok_or(WireError::Truncated(what))?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn u16(&mut self, what: &'static str) -> Result<u16, WireError> {
        if self.pos + 2 > self.buf.len() {
            return Err(WireError::Truncated(what));
        }
        let v = NetworkEndian::read_u16(&self.buf[self.pos..self.pos + 2]);
        self.pos += 2;
        Ok(v)
    }

    pub(crate) fn take(
        &mut self,
        len: usize,
        what: &'static str,
    ) -> Result<&'a [u8], WireError> {
        if self.pos + len > self.buf.len() {
            return Err(WireError::Truncated(what));
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Remaining unread bytes; non-zero trailing garbage is a framing error.
    pub(crate) fn finish(self, what: &'static str) -> Result<(), WireError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(WireError::Truncated(what))
        }
    }
}
