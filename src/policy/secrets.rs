// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Secret-provider registry.
//!
//! Every new connection resolves its peer address to a shared secret, a
//! connection handler kind, and the scope whose users it may speak for.
//! Providers are walked in document order; within a prefix provider the
//! CIDRs are sorted longest-prefix-first so overlapping prefixes resolve
//! deterministically.

use std::net::IpAddr;

use anyhow::{Context, Result};
use hickory_resolver::TokioResolver;
use ipnet::IpNet;
use tracing::debug;

use crate::{
    cfg::enums::{HandlerKind, ProviderKind},
    policy::SecretConfig,
};

/// Resolution result for one connection.
#[derive(Debug, Clone)]
pub struct RegistryMatch {
    pub scope: String,
    pub secret: Vec<u8>,
    pub handler: HandlerKind,
}

enum Provider {
    Prefix(Vec<IpNet>),
    Dns {
        hostnames: Vec<String>,
        resolver: TokioResolver,
    },
}

struct Entry {
    scope: String,
    secret: Vec<u8>,
    handler: HandlerKind,
    provider: Provider,
}

impl Entry {
    async fn matches(&self, ip: IpAddr) -> bool {
        match &self.provider {
            Provider::Prefix(prefixes) => {
                prefixes.iter().any(|prefix| prefix.contains(&ip))
            },
            Provider::Dns {
                hostnames,
                resolver,
            } => match resolver.reverse_lookup(ip).await {
                Ok(names) => names.iter().any(|ptr| {
                    let name = ptr.to_string();
                    let name = name.trim_end_matches('.');
                    hostnames.iter().any(|h| h.eq_ignore_ascii_case(name))
                }),
                Err(e) => {
                    debug!(peer = %ip, error = %e, "reverse lookup failed");
                    false
                },
            },
        }
    }
}

pub struct SecretRegistry {
    entries: Vec<Entry>,
}

impl SecretRegistry {
    pub fn from_config(secrets: &[SecretConfig]) -> Result<Self> {
        let mut entries = Vec::with_capacity(secrets.len());

        for secret in secrets {
            let provider = match secret.provider {
                ProviderKind::Prefix => {
                    let raw = secret.options.get("prefixes").with_context(|| {
                        format!("secrets entry {:?} is missing options.prefixes", secret.name)
                    })?;
                    let strings: Vec<String> = serde_json::from_str(raw)
                        .with_context(|| {
                            format!("secrets entry {:?}: options.prefixes is not a JSON array", secret.name)
                        })?;
                    let mut prefixes = strings
                        .iter()
                        .map(|s| {
                            s.parse::<IpNet>().with_context(|| {
                                format!("secrets entry {:?}: bad prefix {s:?}", secret.name)
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    prefixes.sort_by_key(|net| std::cmp::Reverse(net.prefix_len()));
                    Provider::Prefix(prefixes)
                },
                ProviderKind::Dns => {
                    let raw = secret.options.get("hostnames").with_context(|| {
                        format!("secrets entry {:?} is missing options.hostnames", secret.name)
                    })?;
                    let hostnames: Vec<String> = serde_json::from_str(raw)
                        .with_context(|| {
                            format!("secrets entry {:?}: options.hostnames is not a JSON array", secret.name)
                        })?;
                    let resolver = TokioResolver::builder_tokio()
                        .context("failed to read system resolver configuration")?
                        .build();
                    Provider::Dns {
                        hostnames,
                        resolver,
                    }
                },
            };

            entries.push(Entry {
                scope: secret.name.clone(),
                secret: secret.secret.clone().into_bytes(),
                handler: secret.handler,
                provider,
            });
        }

        Ok(Self { entries })
    }

    /// First entry matching the peer wins. `None` is a hard close for the
    /// acceptor.
    pub async fn lookup(&self, ip: IpAddr) -> Option<RegistryMatch> {
        for entry in &self.entries {
            if entry.matches(ip).await {
                return Some(RegistryMatch {
                    scope: entry.scope.clone(),
                    secret: entry.secret.clone(),
                    handler: entry.handler,
                });
            }
        }
        None
    }
}
