// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Declarative policy objects and the reductions that turn them into
//! per-user capabilities.
//!
//! Users carry scopes, group references, and optional overrides; groups are
//! flat bundles of the same attributes without scopes or nested groups.
//! After [`User::reduce_all`] a user is self-contained: group lists are
//! folded in behind the user's own entries so user rules win when matching
//! walks sequentially by name.

pub mod build;
pub mod secrets;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cfg::enums::{
    AccounterKind, ActionKind, AuthenticatorKind, AuthorizerVersion, HandlerKind,
    ProviderKind,
};

/// One attribute a service rule requires from the client before it
/// contributes its `set_values` to the reply.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub name: String,
    pub values: Vec<String>,
}

/// One attribute a service rule injects into the reply.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SetValue {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub optional: bool,
}

/// Session-authorization rule: activated when the client mentions the
/// service by attribute or value, guarded by `match`, contributing
/// `set_values`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    #[serde(default, rename = "match")]
    pub matches: Vec<Matcher>,
    #[serde(default)]
    pub set_values: Vec<SetValue>,
}

/// Command-authorization rule. `name` of `*` matches any command; `match`
/// holds regexes evaluated against the argument line.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub action: ActionKind,
    #[serde(default, rename = "match")]
    pub matches: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorRef {
    #[serde(rename = "type")]
    pub kind: AuthenticatorKind,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AccounterRef {
    #[serde(rename = "type")]
    pub kind: AccounterKind,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub authenticator: Option<AuthenticatorRef>,
    #[serde(default)]
    pub accounter: Option<AccounterRef>,
    #[serde(default)]
    pub author_version: AuthorizerVersion,
}

/// Same attribute set as [`User`] minus scopes and nested groups; group
/// inheritance is one level deep by construction.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub authenticator: Option<AuthenticatorRef>,
    #[serde(default)]
    pub accounter: Option<AccounterRef>,
}

/// One secret-provider entry. `name` doubles as the scope served to
/// clients this entry matches.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SecretConfig {
    pub name: String,
    pub secret: String,
    pub provider: ProviderKind,
    pub handler: HandlerKind,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl User {
    /// Reduces the user to exactly one scope.
    pub fn localize_to_scope(&mut self, scope: &str) {
        self.scopes = vec![scope.to_string()];
    }

    /// Folds every referenced group into the user: group services and
    /// commands are appended after the user's own, the first group
    /// supplying an authenticator or accounter fills a missing slot, and
    /// the group list is consumed, which makes the fold idempotent.
    pub fn reduce_all(&mut self, groups: &HashMap<String, Group>) {
        for group_name in std::mem::take(&mut self.groups) {
            let Some(group) = groups.get(&group_name) else {
                warn!(user = %self.name, group = %group_name, "unknown group reference");
                continue;
            };

            self.services.extend(group.services.iter().cloned());
            self.commands.extend(group.commands.iter().cloned());
            if self.authenticator.is_none() {
                self.authenticator = group.authenticator.clone();
            }
            if self.accounter.is_none() {
                self.accounter = group.accounter.clone();
            }
        }
    }
}
