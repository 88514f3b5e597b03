//! This module contains the per-user handler implementations: credential
//! verifiers, authorizers, and accounting sinks.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Accounting sinks.
pub mod acct;
/// Credential verifiers.
pub mod authent;
/// Command and session authorizers.
pub mod author;
