// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The authorization engine.
//!
//! Every reduced user gets one [`UserAuthorizer`] holding both evaluation
//! paths. Selection happens per request: `service=shell` together with a
//! non-empty `cmd` value routes to the command path, anything else to the
//! session path. Evaluation is pure; callers own metrics and replies.

pub mod command;
pub mod session;

use crate::{
    cfg::enums::AuthorizerVersion,
    models::author::{AuthorReply, AuthorRequest},
    policy::User,
};

use self::{command::CommandAuthorizer, session::SessionAuthorizer};

/// Evaluation result plus the variant label used by metrics.
#[derive(Debug, Clone)]
pub struct AuthorOutcome {
    pub reply: AuthorReply,
    pub variant: &'static str,
}

#[derive(Debug, Clone)]
pub struct UserAuthorizer {
    version: AuthorizerVersion,
    command: CommandAuthorizer,
    session: SessionAuthorizer,
    max_splits: usize,
}

impl UserAuthorizer {
    /// Captures the reduced user's rules. The user must already be
    /// localized to `scope`.
    pub fn from_user(user: &User, scope: &str, max_splits: usize) -> Self {
        Self {
            version: user.author_version,
            command: CommandAuthorizer::new(&user.commands),
            session: SessionAuthorizer::new(&user.services, scope),
            max_splits,
        }
    }

    pub fn evaluate(&self, req: &AuthorRequest) -> AuthorOutcome {
        let args = &req.args;
        let shell_command = args.service() == Some("shell")
            && args.command().is_some_and(|cmd| !cmd.is_empty());

        if shell_command {
            match self.version {
                AuthorizerVersion::V1 => AuthorOutcome {
                    reply: self.command.evaluate(args),
                    variant: "command",
                },
                AuthorizerVersion::V2 => AuthorOutcome {
                    reply: self.command.evaluate_piped(args, self.max_splits),
                    variant: "command_pipe",
                },
            }
        } else {
            AuthorOutcome {
                reply: self.session.evaluate(args),
                variant: "session",
            }
        }
    }
}
