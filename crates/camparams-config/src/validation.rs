// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks value ranges and consistency, collecting every problem before
//! failing so a broken file can be fixed in one pass.

use std::collections::HashSet;
use std::fmt;

use crate::{AssemblerSection, CamParamsConfig, ConfigError, ConfigResult};

/// Conditions are tracked as bits of a `u64`
pub const MAX_CONDITIONS: usize = 64;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    DuplicateCondition { section: String, condition: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::DuplicateCondition { section, condition } => {
                write!(f, "Condition '{}' listed twice in [{}]", condition, section)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every failed check
pub fn validate_config(config: &CamParamsConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// All validation problems, in section order
pub fn collect_errors(config: &CamParamsConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_section("isp", &config.isp, &mut errors);
    validate_section("pp", &config.pp, &mut errors);

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!(
                "'{}' is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }
    errors
}

fn validate_section(
    section: &str,
    assembler: &AssemblerSection,
    errors: &mut Vec<ConfigValidationError>,
) {
    if assembler.name.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: format!("{}.name", section),
        });
    }

    if assembler.max_pending == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: format!("{}.max_pending", section),
            reason: "must be at least 1".to_string(),
        });
    }

    if assembler.conditions.len() > MAX_CONDITIONS {
        errors.push(ConfigValidationError::InvalidValue {
            field: format!("{}.conditions", section),
            reason: format!(
                "{} conditions listed, at most {} supported",
                assembler.conditions.len(),
                MAX_CONDITIONS
            ),
        });
    }

    let mut seen = HashSet::new();
    for condition in &assembler.conditions {
        if !seen.insert(condition.as_str()) {
            errors.push(ConfigValidationError::DuplicateCondition {
                section: section.to_string(),
                condition: condition.clone(),
            });
        }
    }
}
