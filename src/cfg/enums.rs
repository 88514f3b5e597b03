// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Credential verifier kinds.
///
/// Selected by integer in the policy document; unknown codes are rejected
/// when the document is parsed, not when a user first authenticates.
#[repr(u8)]
#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum AuthenticatorKind {
    Bcrypt = 1,
    Sha512 = 2,
}

impl fmt::Display for AuthenticatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthenticatorKind::Bcrypt => "BCRYPT",
            AuthenticatorKind::Sha512 => "SHA512",
        })
    }
}

/// Accounting sink kinds.
#[repr(u8)]
#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum AccounterKind {
    Stderr = 1,
    Syslog = 2,
    File = 3,
}

impl fmt::Display for AccounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccounterKind::Stderr => "STDERR",
            AccounterKind::Syslog => "SYSLOG",
            AccounterKind::File => "FILE",
        })
    }
}

/// Command rule outcomes.
#[repr(u8)]
#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum ActionKind {
    Deny = 1,
    Permit = 2,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Deny => "DENY",
            ActionKind::Permit => "PERMIT",
        })
    }
}

/// Secret-provider kinds: match clients by address prefix or by the names a
/// reverse lookup returns.
#[repr(u8)]
#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProviderKind {
    Prefix = 1,
    Dns = 2,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Prefix => "PREFIX",
            ProviderKind::Dns => "DNS",
        })
    }
}

/// Connection handler kinds. `Span` advertises the single-connection
/// capability and serves multiplexed sessions; `Start` serves one session
/// per connection.
#[repr(u8)]
#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum HandlerKind {
    Start = 1,
    Span = 2,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandlerKind::Start => "START",
            HandlerKind::Span => "SPAN",
        })
    }
}

/// Command-authorizer generations. V2 splits piped command lines and
/// authorizes every segment independently.
#[repr(u8)]
#[derive(
    Deserialize,
    Serialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum AuthorizerVersion {
    V1 = 1,
    #[default]
    V2 = 2,
}
