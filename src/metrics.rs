// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-wide Prometheus collectors. Counters survive policy reloads;
//! everything registers into the default registry so an external exporter
//! can scrape via [`gather`].

use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, register_histogram,
    register_int_counter, register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref AUTHEN_PASS: IntCounter = register_int_counter!(
        "tacplus_authentication_pass_total",
        "Authentication exchanges that ended in a Pass reply"
    )
    .expect("metric registration");
    pub static ref AUTHEN_FAIL: IntCounter = register_int_counter!(
        "tacplus_authentication_fail_total",
        "Authentication exchanges that ended in a Fail reply"
    )
    .expect("metric registration");
    pub static ref AUTHOR_PASS: IntCounterVec = register_int_counter_vec!(
        "tacplus_authorization_pass_total",
        "Authorization requests accepted, by authorizer variant",
        &["variant"]
    )
    .expect("metric registration");
    pub static ref AUTHOR_FAIL: IntCounterVec = register_int_counter_vec!(
        "tacplus_authorization_fail_total",
        "Authorization requests denied or errored, by authorizer variant",
        &["variant"]
    )
    .expect("metric registration");
    pub static ref ACCT_RECORDS: IntCounterVec = register_int_counter_vec!(
        "tacplus_accounting_records_total",
        "Accounting records accepted, by record kind",
        &["kind"]
    )
    .expect("metric registration");
    pub static ref ACCT_SINK_ERRORS: IntCounter = register_int_counter!(
        "tacplus_accounting_sink_errors_total",
        "Accounting records the configured sink failed to persist"
    )
    .expect("metric registration");
    pub static ref CONFIG_BUILD_SECONDS: Histogram = register_histogram!(
        "tacplus_config_build_seconds",
        "Wall time spent building a policy snapshot"
    )
    .expect("metric registration");
    pub static ref USER_SCOPE_DUPLICATE: IntCounter = register_int_counter!(
        "tacplus_user_scope_duplicate_total",
        "Users discarded because their (scope, name) pair was already taken"
    )
    .expect("metric registration");
    pub static ref USER_AUTHENTICATOR_UNASSIGNED: IntCounter = register_int_counter!(
        "tacplus_user_authenticator_unassigned_total",
        "Users whose authenticator could not be resolved at build time"
    )
    .expect("metric registration");
    pub static ref USER_ACCOUNTER_UNASSIGNED: IntCounter = register_int_counter!(
        "tacplus_user_accounter_unassigned_total",
        "Users whose accounter could not be resolved at build time"
    )
    .expect("metric registration");
    pub static ref PREFIX_ALLOW: IntCounter = register_int_counter!(
        "tacplus_prefix_allow_total",
        "Connections admitted by the prefix allow list"
    )
    .expect("metric registration");
    pub static ref PREFIX_DENY: IntCounter = register_int_counter!(
        "tacplus_prefix_deny_total",
        "Connections closed by the prefix deny or allow list"
    )
    .expect("metric registration");
    pub static ref SECRET_PROVIDER_MISS: IntCounter = register_int_counter!(
        "tacplus_secret_provider_miss_total",
        "Connections whose remote address matched no secret provider"
    )
    .expect("metric registration");
    pub static ref CONNECTIONS: IntCounter = register_int_counter!(
        "tacplus_connections_total",
        "Connections accepted by the listener"
    )
    .expect("metric registration");
    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "tacplus_sessions_active",
        "Live sessions across all connections"
    )
    .expect("metric registration");
}

/// Snapshot of every registered metric family, for an external exporter.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    prometheus::gather()
}
