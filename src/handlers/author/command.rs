// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use regex::Regex;
use tracing::warn;

use crate::{
    cfg::enums::ActionKind,
    models::{
        author::{AuthorReply, AuthorStatus},
        avp::Args,
    },
    policy::Command,
};

/// Pipe character that separates command segments. Authorizing a pipeline
/// requires a rule whose name is this very string.
pub const PIPE_DELIMITER: &str = "|";

pub const DENIED_MSG: &str = "not authorized";

/// One pattern as written in policy. Compilation happens once at build
/// time; a pattern that never compiled denies on first use.
#[derive(Debug, Clone)]
enum CompiledPattern {
    Ok(Regex),
    Malformed(String),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    action: ActionKind,
    patterns: Vec<CompiledPattern>,
}

/// Sequential first-match command authorizer.
#[derive(Debug, Clone)]
pub struct CommandAuthorizer {
    rules: Vec<CompiledRule>,
}

/// Patterns are implicitly anchored: a rule author writing `cat.*` means
/// the whole argument line, not a substring of it.
fn anchor(pattern: &str) -> String {
    let mut anchored = String::with_capacity(pattern.len() + 2);
    if !pattern.starts_with('^') {
        anchored.push('^');
    }
    anchored.push_str(pattern);
    if !pattern.ends_with('$') {
        anchored.push('$');
    }
    anchored
}

impl CommandAuthorizer {
    pub fn new(commands: &[Command]) -> Self {
        let rules = commands
            .iter()
            .map(|cmd| CompiledRule {
                name: cmd.name.clone(),
                action: cmd.action,
                patterns: cmd
                    .matches
                    .iter()
                    .map(|pattern| match Regex::new(&anchor(pattern)) {
                        Ok(re) => CompiledPattern::Ok(re),
                        Err(e) => {
                            warn!(command = %cmd.name, %pattern, error = %e,
                                  "malformed command pattern");
                            CompiledPattern::Malformed(pattern.clone())
                        },
                    })
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    fn decide(action: ActionKind) -> AuthorReply {
        match action {
            ActionKind::Permit => AuthorReply::status(AuthorStatus::PassAdd),
            ActionKind::Deny => {
                AuthorReply::with_message(AuthorStatus::Fail, DENIED_MSG)
            },
        }
    }

    /// Walks the rules in policy order; the first decisive rule wins and no
    /// rule matching at all is a denial.
    pub fn evaluate(&self, args: &Args) -> AuthorReply {
        let Some(requested) = args.command() else {
            return AuthorReply::with_message(AuthorStatus::Fail, DENIED_MSG);
        };

        for rule in &self.rules {
            if rule.name == "*" {
                return Self::decide(rule.action);
            }
            if rule.name != requested {
                continue;
            }
            if rule.patterns.is_empty() {
                return Self::decide(rule.action);
            }

            let line = args.command_args_no_le();
            for pattern in &rule.patterns {
                match pattern {
                    CompiledPattern::Ok(re) => {
                        if re.is_match(&line) {
                            return Self::decide(rule.action);
                        }
                    },
                    CompiledPattern::Malformed(src) => {
                        warn!(pattern = %src, "denying on malformed pattern");
                        return AuthorReply::with_message(
                            AuthorStatus::Fail,
                            DENIED_MSG,
                        );
                    },
                }
            }
        }

        AuthorReply::with_message(AuthorStatus::Fail, DENIED_MSG)
    }

    /// Splits the command line at unquoted, unescaped pipes and requires
    /// every segment to pass [`Self::evaluate`] on its own. The pipe itself
    /// is just a command name, so pipelines stay denied until policy grants
    /// a `|` rule.
    pub fn evaluate_piped(&self, args: &Args, max_splits: usize) -> AuthorReply {
        let segments = args.split(PIPE_DELIMITER, max_splits);
        if segments.is_empty() {
            return AuthorReply::with_message(AuthorStatus::Fail, DENIED_MSG);
        }

        for segment in &segments {
            if self.evaluate(segment).status != AuthorStatus::PassAdd {
                return AuthorReply::with_message(AuthorStatus::Fail, DENIED_MSG);
            }
        }

        AuthorReply::status(AuthorStatus::PassAdd)
    }
}
