// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # camparams-observability
//!
//! Logging setup shared by the camparams binaries and tests.
//!
//! Provides per-crate debug flags (`--debug-<crate>`, `CAMPARAMS_DEBUG`) and
//! `tracing-subscriber` initialization for console output, plus rotating
//! file output behind the `file-logging` feature.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Workspace crate names accepted by `--debug-<crate>`
pub const KNOWN_CRATES: &[&str] = &[
    "camparams",
    "camparams-assembler",
    "camparams-config",
    "camparams-observability",
];
