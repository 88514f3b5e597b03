// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Body obfuscation (RFC 8907 § 4.5).
//!
//! The body is XOR-ed with a pseudo-pad built from iterated MD5: the first
//! 16-byte block hashes `session_id ‖ secret ‖ version ‖ seq_no`, every
//! following block folds the previous block into the same prefix. XOR makes
//! the transform its own inverse, so one routine covers both directions.

use md5::{Digest, Md5};

use crate::models::common::Header;

const MD5_BLOCK: usize = 16;

/// XOR `body` with the session-keyed pseudo-pad in place. Callers skip this
/// entirely when the header carries the `UNENCRYPTED` flag.
pub fn toggle(header: &Header, secret: &[u8], body: &mut [u8]) {
    if body.is_empty() {
        return;
    }

    // Common hash prefix for every block of the pad.
    let mut prefix = Md5::new();
    prefix.update(header.session_id.to_be_bytes());
    prefix.update(secret);
    prefix.update([header.version.wire_byte()]);
    prefix.update([header.seq_no]);

    let mut pad = [0u8; MD5_BLOCK];
    let mut first = true;

    for chunk in body.chunks_mut(MD5_BLOCK) {
        let mut hasher = prefix.clone();
        if !first {
            hasher.update(pad);
        }
        first = false;
        pad = hasher.finalize().into();

        for (out, key) in chunk.iter_mut().zip(pad.iter()) {
            *out ^= key;
        }
    }
}
