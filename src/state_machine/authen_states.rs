// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! ASCII login sub-machine, one per authentication session.
//!
//! `AwaitStart → AwaitUser → AwaitPass → Done`, with two shortcuts: a PAP
//! start that already carries user and password verifies immediately, and
//! an abort flag on any continue fails the exchange on the spot.

use tracing::warn;

use crate::{
    handlers::authent::Authenticator,
    metrics,
    models::authen::{
        AuthenAction, AuthenContinue, AuthenReply, AuthenStart, AuthenStatus,
        AuthenType,
    },
    policy::build::ScopeUsers,
    state_machine::common::Transition,
};

pub const DENIED_MSG: &str = "authentication denied";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitUser,
    AwaitPass,
}

#[derive(Debug)]
pub struct AuthenSession {
    state: State,
    username: Option<String>,
}

impl AuthenSession {
    /// Consumes the Start packet that opened this session.
    pub fn on_start(
        start: &AuthenStart,
        users: &ScopeUsers,
    ) -> Transition<AuthenReply> {
        if start.action != AuthenAction::Login {
            return Transition::Done(AuthenReply::with_message(
                AuthenStatus::Fail,
                DENIED_MSG,
            ));
        }

        match start.authen_type {
            AuthenType::Ascii => Transition::Next(AuthenReply::with_message(
                AuthenStatus::GetUser,
                "Username: ",
            )),
            AuthenType::Pap if !start.user.is_empty() && !start.data.is_empty() => {
                Transition::Done(verify(users, &start.user, &start.data))
            },
            _ => Transition::Done(AuthenReply::with_message(
                AuthenStatus::Fail,
                DENIED_MSG,
            )),
        }
    }

    pub fn awaiting_user() -> Self {
        Self {
            state: State::AwaitUser,
            username: None,
        }
    }

    /// The username the exchange authenticated, once it passed.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn on_continue(
        &mut self,
        cont: &AuthenContinue,
        users: &ScopeUsers,
    ) -> Transition<AuthenReply> {
        if cont.abort {
            return Transition::Done(AuthenReply::status(AuthenStatus::Fail));
        }

        match self.state {
            State::AwaitUser => {
                let username =
                    String::from_utf8_lossy(&cont.user_msg).into_owned();
                if username.is_empty() {
                    return Transition::Done(AuthenReply::with_message(
                        AuthenStatus::Fail,
                        DENIED_MSG,
                    ));
                }
                self.username = Some(username);
                self.state = State::AwaitPass;
                Transition::Next(
                    AuthenReply::with_message(AuthenStatus::GetPass, "Password: ")
                        .no_echo(),
                )
            },
            State::AwaitPass => {
                let username = self.username.as_deref().unwrap_or_default();
                let reply = verify(users, username, &cont.user_msg);
                if reply.status != AuthenStatus::Pass {
                    self.username = None;
                }
                Transition::Done(reply)
            },
        }
    }
}

/// Runs the user's credential verifier. An unusable verifier is an error
/// status, not a denial, so operators can tell the two apart.
fn verify(users: &ScopeUsers, username: &str, password: &[u8]) -> AuthenReply {
    let Some(bundle) = users.get(username) else {
        metrics::AUTHEN_FAIL.inc();
        return AuthenReply::with_message(AuthenStatus::Fail, DENIED_MSG);
    };

    match bundle.authenticator.verify(username, password) {
        Ok(true) => {
            metrics::AUTHEN_PASS.inc();
            AuthenReply::status(AuthenStatus::Pass)
        },
        Ok(false) => {
            metrics::AUTHEN_FAIL.inc();
            AuthenReply::with_message(AuthenStatus::Fail, DENIED_MSG)
        },
        Err(e) => {
            warn!(user = %username, error = %e, "credential verifier failed");
            metrics::AUTHEN_FAIL.inc();
            AuthenReply::status(AuthenStatus::Error)
        },
    }
}
