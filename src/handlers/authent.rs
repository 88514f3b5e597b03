// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Credential verifiers.
//!
//! A verifier compares a presented password against stored hash material;
//! where the material lives is the policy document's concern and reaches a
//! verifier through its `options` map. Unknown kinds are rejected when the
//! document is parsed, so the set here is closed.

use anyhow::{Context, Result};
use enum_dispatch::enum_dispatch;
use sha2::{Digest, Sha512};

use crate::{cfg::enums::AuthenticatorKind, policy::AuthenticatorRef};

#[enum_dispatch]
pub trait Authenticator {
    /// Whether `password` matches the stored credential for `username`.
    /// An `Err` means the verifier could not produce a usable answer and is
    /// surfaced to the client as an error status, not a denial.
    fn verify(&self, username: &str, password: &[u8]) -> Result<bool>;
}

/// Verifies against a bcrypt hash.
#[derive(Debug, Clone)]
pub struct BcryptAuthenticator {
    hash: String,
}

impl Authenticator for BcryptAuthenticator {
    fn verify(&self, _username: &str, password: &[u8]) -> Result<bool> {
        bcrypt::verify(password, &self.hash).context("bcrypt verification failed")
    }
}

/// Verifies against a lowercase-hex SHA-512 digest.
#[derive(Debug, Clone)]
pub struct Sha512Authenticator {
    hash: String,
}

impl Authenticator for Sha512Authenticator {
    fn verify(&self, _username: &str, password: &[u8]) -> Result<bool> {
        let digest = hex::encode(Sha512::digest(password));
        Ok(digest == self.hash.to_lowercase())
    }
}

/// Stand-in for a user whose verifier could not be resolved at build time.
/// Keeps the session engine free of empty slots while staying observable
/// through the unassigned counter.
#[derive(Debug, Clone, Default)]
pub struct DenyAuthenticator;

impl Authenticator for DenyAuthenticator {
    fn verify(&self, _username: &str, _password: &[u8]) -> Result<bool> {
        Ok(false)
    }
}

#[enum_dispatch(Authenticator)]
#[derive(Debug, Clone)]
pub enum AnyAuthenticator {
    Bcrypt(BcryptAuthenticator),
    Sha512(Sha512Authenticator),
    Deny(DenyAuthenticator),
}

impl AnyAuthenticator {
    /// Instantiates the verifier a policy reference describes. Missing hash
    /// material is an error the build turns into [`DenyAuthenticator`].
    pub fn from_ref(reference: &AuthenticatorRef) -> Result<Self> {
        let hash = reference
            .options
            .get("hash")
            .context("authenticator options are missing the hash key")?
            .clone();

        Ok(match reference.kind {
            AuthenticatorKind::Bcrypt => {
                Self::Bcrypt(BcryptAuthenticator { hash })
            },
            AuthenticatorKind::Sha512 => {
                Self::Sha512(Sha512Authenticator { hash })
            },
        })
    }

    pub fn deny() -> Self {
        Self::Deny(DenyAuthenticator)
    }
}
