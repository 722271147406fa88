// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later ones win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{CamParamsConfig, ConfigError, ConfigResult};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "camparams.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `CAMPARAMS_CONFIG_PATH` environment variable
/// 2. Current working directory: `./camparams.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("CAMPARAMS_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by CAMPARAMS_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet CAMPARAMS_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the file is not found or contains invalid TOML.
/// Validation is separate, see [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<CamParamsConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: CamParamsConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `CAMPARAMS_ISP_MAX_PENDING` -> `isp.max_pending`
/// - `CAMPARAMS_PP_MAX_PENDING` -> `pp.max_pending`
/// - `CAMPARAMS_LOG_LEVEL` -> `logging.level`
/// - `CAMPARAMS_LOG_FORMAT` -> `logging.format`
pub fn apply_environment_overrides(config: &mut CamParamsConfig) {
    let vars: HashMap<String, String> = env::vars()
        .filter(|(key, _)| key.starts_with("CAMPARAMS_"))
        .collect();
    apply_overrides(config, &vars, |key| match key {
        "CAMPARAMS_ISP_MAX_PENDING" => Some(Field::IspMaxPending),
        "CAMPARAMS_PP_MAX_PENDING" => Some(Field::PpMaxPending),
        "CAMPARAMS_LOG_LEVEL" => Some(Field::LogLevel),
        "CAMPARAMS_LOG_FORMAT" => Some(Field::LogFormat),
        _ => None,
    });
}

/// Apply CLI argument overrides to configuration
///
/// Keys use dotted section paths: `isp.max_pending`, `pp.max_pending`,
/// `logging.level`, `logging.format`.
pub fn apply_cli_overrides(config: &mut CamParamsConfig, cli_args: &HashMap<String, String>) {
    apply_overrides(config, cli_args, |key| match key {
        "isp.max_pending" => Some(Field::IspMaxPending),
        "pp.max_pending" => Some(Field::PpMaxPending),
        "logging.level" => Some(Field::LogLevel),
        "logging.format" => Some(Field::LogFormat),
        _ => None,
    });
}

#[derive(Clone, Copy)]
enum Field {
    IspMaxPending,
    PpMaxPending,
    LogLevel,
    LogFormat,
}

/// Unparseable values are ignored; validation catches the rest
fn apply_overrides<F>(config: &mut CamParamsConfig, values: &HashMap<String, String>, field_of: F)
where
    F: Fn(&str) -> Option<Field>,
{
    for (key, value) in values {
        match field_of(key) {
            Some(Field::IspMaxPending) => {
                if let Ok(max) = value.parse::<usize>() {
                    config.isp.max_pending = max;
                }
            }
            Some(Field::PpMaxPending) => {
                if let Ok(max) = value.parse::<usize>() {
                    config.pp.max_pending = max;
                }
            }
            Some(Field::LogLevel) => config.logging.level = value.to_lowercase(),
            Some(Field::LogFormat) => {
                if let Ok(format) = value.parse() {
                    config.logging.format = format;
                }
            }
            None => {}
        }
    }
}
