// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `camparams.toml`.

use serde::{Deserialize, Serialize};

/// Default bound on pending bundles per assembler
pub const DEFAULT_MAX_PENDING: usize = 10;

pub const DEFAULT_ISP_NAME: &str = "ISP_PARAMS_ASSEMBLER";
pub const DEFAULT_PP_NAME: &str = "PP_PARAMS_ASSEMBLER";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "ConfigFile")]
pub struct CamParamsConfig {
    /// ISP configuration assembler
    pub isp: AssemblerSection,
    /// Post-processing configuration assembler
    pub pp: AssemblerSection,
    pub logging: LoggingSection,
}

impl Default for CamParamsConfig {
    fn default() -> Self {
        Self {
            isp: AssemblerSection::named(DEFAULT_ISP_NAME),
            pp: AssemblerSection::named(DEFAULT_PP_NAME),
            logging: LoggingSection::default(),
        }
    }
}

/// On-disk shape; sections without a `name` get their per-section default
#[derive(Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    isp: AssemblerSection,
    pp: AssemblerSection,
    logging: LoggingSection,
}

impl From<ConfigFile> for CamParamsConfig {
    fn from(file: ConfigFile) -> Self {
        let named = |mut section: AssemblerSection, default_name: &str| {
            if section.name.is_empty() {
                section.name = default_name.to_string();
            }
            section
        };
        Self {
            isp: named(file.isp, DEFAULT_ISP_NAME),
            pp: named(file.pp, DEFAULT_PP_NAME),
            logging: file.logging,
        }
    }
}

/// One params assembler instance
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssemblerSection {
    pub name: String,
    pub max_pending: usize,
    /// Conditions registered at setup, in bit order
    pub conditions: Vec<String>,
}

impl AssemblerSection {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Default for AssemblerSection {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_pending: DEFAULT_MAX_PENDING,
            conditions: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}
