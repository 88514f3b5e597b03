//! This module handles configuration, command-line parsing, and logging.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Command-line interface parsing.
pub mod cli;
/// Policy document parsing and validation.
pub mod config;
/// Integer-coded enumerations used in the policy document.
pub mod enums;
/// Logger initialization.
pub mod logger;
