// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Accounting sub-machine: forward the record, acknowledge or report the
//! sink failure.

use tracing::warn;

use crate::{
    metrics,
    models::{
        acct::{AcctReply, AcctRequest, AcctStatus},
        author::AuthorDecodeError,
        common::WireError,
    },
    policy::build::ScopeUsers,
    handlers::acct::{Accounter, AcctRecord},
};

/// Handles one accounting request body.
pub fn record(body: &[u8], users: &ScopeUsers) -> Result<AcctReply, WireError> {
    let req = match AcctRequest::decode(body) {
        Ok(req) => req,
        Err(AuthorDecodeError::Wire(e)) => return Err(e),
        Err(AuthorDecodeError::Avp(e)) => {
            warn!(error = %e, "rejecting undecodable accounting request");
            return Ok(AcctReply::status(AcctStatus::Error));
        },
    };

    let Some(bundle) = users.get(&req.user) else {
        warn!(user = %req.user, "accounting for unknown user");
        return Ok(AcctReply::status(AcctStatus::Error));
    };

    let rec = AcctRecord::from_request(&req);
    match bundle.accounter.record(&rec) {
        Ok(()) => {
            metrics::ACCT_RECORDS.with_label_values(&[req.kind()]).inc();
            Ok(AcctReply::status(AcctStatus::Success))
        },
        Err(e) => {
            warn!(user = %req.user, error = %e, "accounting sink failed");
            metrics::ACCT_SINK_ERRORS.inc();
            Ok(AcctReply::status(AcctStatus::Error))
        },
    }
}
