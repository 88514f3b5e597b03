// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Authorization sub-machine: a single request, a single reply.

use tracing::{debug, warn};

use crate::{
    metrics,
    models::{
        author::{
            AuthorDecodeError, AuthorReply, AuthorRequest, AuthorStatus,
        },
        common::WireError,
    },
    policy::build::ScopeUsers,
};

pub const UNDECODABLE_MSG: &str = "unable to decode AuthorRequest packet";
pub const DENIED_MSG: &str = "not authorized";

/// Evaluates one authorization request body.
///
/// Malformed argument lists come back as an error status; only structural
/// truncation is fatal to the connection.
pub fn evaluate(
    body: &[u8],
    bound_user: Option<&str>,
    users: &ScopeUsers,
) -> Result<AuthorReply, WireError> {
    let req = match AuthorRequest::decode(body) {
        Ok(req) => req,
        Err(AuthorDecodeError::Wire(e)) => return Err(e),
        Err(AuthorDecodeError::Avp(e)) => {
            warn!(error = %e, "rejecting undecodable authorization request");
            metrics::AUTHOR_FAIL.with_label_values(&["request"]).inc();
            return Ok(AuthorReply::with_message(
                AuthorStatus::Error,
                UNDECODABLE_MSG,
            ));
        },
    };

    // A user authenticated earlier on this connection pins the identity
    // every later request must present.
    if let Some(bound) = bound_user
        && bound != req.user
    {
        warn!(bound = %bound, requested = %req.user, "authorization user mismatch");
        metrics::AUTHOR_FAIL.with_label_values(&["request"]).inc();
        return Ok(AuthorReply::with_message(AuthorStatus::Fail, DENIED_MSG));
    }

    let Some(bundle) = users.get(&req.user) else {
        debug!(user = %req.user, "authorization for unknown user");
        metrics::AUTHOR_FAIL.with_label_values(&["request"]).inc();
        return Ok(AuthorReply::with_message(AuthorStatus::Fail, DENIED_MSG));
    };

    let outcome = bundle.authorizer.evaluate(&req);
    match outcome.reply.status {
        AuthorStatus::PassAdd | AuthorStatus::PassRepl => {
            metrics::AUTHOR_PASS.with_label_values(&[outcome.variant]).inc();
        },
        _ => {
            metrics::AUTHOR_FAIL.with_label_values(&[outcome.variant]).inc();
        },
    }
    Ok(outcome.reply)
}
