// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt,
};

/// Maps the numeric `--level` flag onto a default filter directive.
fn directive_for(level: u8) -> &'static str {
    match level {
        ..=10 => "debug",
        11..=20 => "info",
        _ => "warn",
    }
}

/// Installs the global JSON subscriber writing to stderr through a
/// non-blocking worker. The returned guard must stay alive for the whole
/// process or buffered lines are lost on exit.
pub fn init_logger(level: u8) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for(level)));

    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let json_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .json();

    let subscriber = Registry::default().with(env_filter).with(json_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set global default subscriber")?;

    Ok(guard)
}
