// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result, ensure};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::{
    models::avp::DEFAULT_MAX_SPLITS,
    policy::{Group, SecretConfig, User},
};

/// Top-level policy document. YAML on disk; JSON parses through the same
/// path.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// Secret-provider entries, matched against the peer address of every
    /// new connection. Entry names double as user scopes.
    #[serde(default)]
    pub secrets: Vec<SecretConfig>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub groups: Vec<Group>,
    /// CIDRs admitted before any provider lookup. Empty fails open.
    #[serde(default)]
    pub prefix_allow: Vec<String>,
    /// CIDRs rejected before any provider lookup. Checked first.
    #[serde(default)]
    pub prefix_deny: Vec<String>,
    /// Ceiling on pipe separators in one authorized command line.
    #[serde(default)]
    pub max_pipe_splits: Option<usize>,
}

impl Config {
    /// Loads the policy document, validates it, and returns the
    /// ready-to-build value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path).with_context(|| {
            format!("failed to read policy document {:?}", path.as_ref())
        })?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse policy document")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates referential invariants before any snapshot is built, so a
    /// broken document never replaces a serving one.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.secrets.is_empty(), "at least one secrets entry is required");

        let mut secret_names = HashSet::new();
        for secret in &self.secrets {
            ensure!(!secret.name.is_empty(), "secrets entries must be named");
            ensure!(
                !secret.secret.is_empty(),
                "secrets entry {:?} has an empty shared secret",
                secret.name
            );
            ensure!(
                secret_names.insert(secret.name.as_str()),
                "duplicate secrets entry {:?}",
                secret.name
            );
        }

        let group_names: HashSet<&str> =
            self.groups.iter().map(|g| g.name.as_str()).collect();
        ensure!(
            group_names.len() == self.groups.len(),
            "group names must be unique"
        );

        for user in &self.users {
            ensure!(!user.name.is_empty(), "users must be named");
            ensure!(
                !user.scopes.is_empty(),
                "user {:?} must have at least one scope",
                user.name
            );
            for group in &user.groups {
                ensure!(
                    group_names.contains(group.as_str()),
                    "user {:?} references unknown group {:?}",
                    user.name,
                    group
                );
            }
        }

        for prefix in self.prefix_allow.iter().chain(&self.prefix_deny) {
            prefix
                .parse::<IpNet>()
                .with_context(|| format!("bad prefix list entry {prefix:?}"))?;
        }

        if let Some(max) = self.max_pipe_splits {
            ensure!(max >= 1, "max_pipe_splits must be >= 1");
        }

        Ok(())
    }

    pub fn max_pipe_splits(&self) -> usize {
        self.max_pipe_splits.unwrap_or(DEFAULT_MAX_SPLITS)
    }
}
