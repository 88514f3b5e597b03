// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Snapshot builder: policy document in, per-scope handler bundles out.
//!
//! A snapshot is immutable once built and shared by reference; a reload
//! builds a fresh one and swaps the published pointer, so exchanges that
//! started on the old snapshot finish on it undisturbed. A build that
//! fails publishes nothing.

use std::{
    collections::HashMap,
    net::IpAddr,
    path::Path,
    sync::{Arc, RwLock},
};

use anyhow::{Context, Result};
use ipnet::IpNet;
use tracing::{info, warn};

use crate::{
    cfg::config::Config,
    handlers::{
        acct::AnyAccounter, authent::AnyAuthenticator, author::UserAuthorizer,
    },
    metrics,
    policy::{Group, secrets::SecretRegistry},
};

/// The three capabilities a session engine needs for one user, already
/// specialized to that user. Unresolved slots hold deny handlers, so the
/// engine never sees an empty one.
pub struct HandlerBundle {
    pub authenticator: AnyAuthenticator,
    pub authorizer: UserAuthorizer,
    pub accounter: AnyAccounter,
}

/// Users of one scope, keyed by name.
pub type ScopeUsers = HashMap<String, Arc<HandlerBundle>>;

pub struct Snapshot {
    scopes: HashMap<String, Arc<ScopeUsers>>,
    pub registry: SecretRegistry,
    prefix_allow: Vec<IpNet>,
    prefix_deny: Vec<IpNet>,
}

impl Snapshot {
    pub fn build(cfg: &Config, acct_path_override: Option<&Path>) -> Result<Self> {
        let _timer = metrics::CONFIG_BUILD_SECONDS.start_timer();

        let groups_by_name: HashMap<String, Group> = cfg
            .groups
            .iter()
            .map(|group| (group.name.clone(), group.clone()))
            .collect();

        let mut scopes: HashMap<String, ScopeUsers> = HashMap::new();

        for user in &cfg.users {
            for scope in &user.scopes {
                let mut local = user.clone();
                local.localize_to_scope(scope);
                local.reduce_all(&groups_by_name);

                let users = scopes.entry(scope.clone()).or_default();
                if users.contains_key(&local.name) {
                    metrics::USER_SCOPE_DUPLICATE.inc();
                    warn!(scope = %scope, user = %local.name,
                          "duplicate user in scope, keeping the first entry");
                    continue;
                }

                let authenticator = match &local.authenticator {
                    Some(reference) => AnyAuthenticator::from_ref(reference)
                        .unwrap_or_else(|e| {
                            metrics::USER_AUTHENTICATOR_UNASSIGNED.inc();
                            warn!(scope = %scope, user = %local.name, error = %e,
                                  "authenticator unusable, denying logins");
                            AnyAuthenticator::deny()
                        }),
                    None => {
                        metrics::USER_AUTHENTICATOR_UNASSIGNED.inc();
                        AnyAuthenticator::deny()
                    },
                };

                let accounter = match &local.accounter {
                    Some(reference) => {
                        AnyAccounter::from_ref(reference, acct_path_override)
                            .unwrap_or_else(|e| {
                                metrics::USER_ACCOUNTER_UNASSIGNED.inc();
                                warn!(scope = %scope, user = %local.name, error = %e,
                                      "accounter unusable, rejecting records");
                                AnyAccounter::deny()
                            })
                    },
                    None => {
                        metrics::USER_ACCOUNTER_UNASSIGNED.inc();
                        AnyAccounter::deny()
                    },
                };

                let authorizer =
                    UserAuthorizer::from_user(&local, scope, cfg.max_pipe_splits());

                users.insert(
                    local.name.clone(),
                    Arc::new(HandlerBundle {
                        authenticator,
                        authorizer,
                        accounter,
                    }),
                );
            }
        }

        let registry = SecretRegistry::from_config(&cfg.secrets)?;

        let parse_prefixes = |list: &[String]| -> Result<Vec<IpNet>> {
            list.iter()
                .map(|s| {
                    s.parse::<IpNet>()
                        .with_context(|| format!("bad prefix {s:?}"))
                })
                .collect()
        };

        let snapshot = Self {
            scopes: scopes
                .into_iter()
                .map(|(scope, users)| (scope, Arc::new(users)))
                .collect(),
            registry,
            prefix_allow: parse_prefixes(&cfg.prefix_allow)?,
            prefix_deny: parse_prefixes(&cfg.prefix_deny)?,
        };

        info!(
            scopes = snapshot.scopes.len(),
            "policy snapshot built"
        );
        Ok(snapshot)
    }

    pub fn scope_users(&self, scope: &str) -> Option<Arc<ScopeUsers>> {
        self.scopes.get(scope).cloned()
    }

    /// Acceptor-level gate, evaluated before any provider lookup: a deny
    /// match closes, a non-empty allow list without a match closes, empty
    /// lists fail open.
    pub fn admits(&self, ip: IpAddr) -> bool {
        if self.prefix_deny.iter().any(|net| net.contains(&ip)) {
            metrics::PREFIX_DENY.inc();
            return false;
        }
        if self.prefix_allow.is_empty() {
            return true;
        }
        if self.prefix_allow.iter().any(|net| net.contains(&ip)) {
            metrics::PREFIX_ALLOW.inc();
            true
        } else {
            metrics::PREFIX_DENY.inc();
            false
        }
    }
}

/// Published snapshot pointer. Readers clone the `Arc` once per
/// connection; a reload swaps the pointer atomically under the lock.
pub struct SharedSnapshot {
    inner: RwLock<Arc<Snapshot>>,
}

impl SharedSnapshot {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn store(&self, snapshot: Snapshot) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(snapshot);
    }
}
