// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-crate debug flags
//!
//! Supports flags like `--debug-camparams-assembler` and `--debug-all`, and
//! the `CAMPARAMS_DEBUG` environment variable.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Crates with debug logging enabled
///
/// # Example
/// ```rust
/// use camparams_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-camparams-assembler".to_string()]);
/// assert!(flags.is_enabled("camparams-assembler"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrateDebugFlags {
    enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse `--debug-{crate-name}` and `--debug-all` from command-line arguments.
    /// Other arguments are ignored.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            }
        }
        flags
    }

    pub fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(crate_name.to_string());
    }

    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    pub fn enabled_crates(&self) -> impl Iterator<Item = &str> + '_ {
        self.enabled_crates.iter().map(String::as_str)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `EnvFilter` directive string: `"<crate>=debug,...,<base_level>"`,
    /// or just `base_level` when no crate is enabled.
    pub fn to_filter_string(&self, base_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .iter()
            .map(|crate_name| format!("{}=debug", crate_name))
            .collect();
        filters.push(base_level.to_string());
        filters.join(",")
    }
}

/// Debug flags from the process arguments and `CAMPARAMS_DEBUG`
///
/// Environment variable format: comma-separated crate names, or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(value) = env::var("CAMPARAMS_DEBUG") {
        apply_debug_env(&mut flags, &value);
    }
    flags
}

fn apply_debug_env(flags: &mut CrateDebugFlags, value: &str) {
    if value.trim() == "all" {
        flags.enable_all();
        return;
    }
    for crate_name in value.split(',') {
        let crate_name = crate_name.trim();
        if !crate_name.is_empty() {
            flags.enable(crate_name);
        }
    }
}

/// Help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for a specific crate

Available crates:
  {}

Environment Variable:
  CAMPARAMS_DEBUG={{crate-name}}[,{{crate-name}}]
  CAMPARAMS_DEBUG=all
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_args() {
        let flags = CrateDebugFlags::from_args(args(&[
            "params_replay",
            "--frames",
            "10",
            "--debug-camparams-assembler",
        ]));
        assert!(flags.is_enabled("camparams-assembler"));
        assert!(!flags.is_enabled("camparams-config"));
        assert_eq!(flags.enabled_crates().count(), 1);
        assert!(flags.any_enabled());
        assert!(!CrateDebugFlags::from_args(args(&["params_replay"])).any_enabled());
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(args(&["--debug-all"]));
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name));
        }
    }

    #[test]
    fn test_filter_string() {
        assert_eq!(CrateDebugFlags::default().to_filter_string("info"), "info");

        let flags = CrateDebugFlags::from_args(args(&[
            "--debug-camparams-config",
            "--debug-camparams-assembler",
        ]));
        assert_eq!(
            flags.to_filter_string("warn"),
            "camparams-assembler=debug,camparams-config=debug,warn"
        );
    }

    #[test]
    fn test_env_value() {
        let mut flags = CrateDebugFlags::default();
        apply_debug_env(&mut flags, " camparams-assembler , ,camparams ");
        assert_eq!(
            flags.enabled_crates().collect::<Vec<_>>(),
            vec!["camparams", "camparams-assembler"]
        );

        let mut flags = CrateDebugFlags::default();
        apply_debug_env(&mut flags, "all");
        assert_eq!(flags.enabled_crates().count(), KNOWN_CRATES.len());
    }

    #[test]
    fn test_help_lists_crates() {
        assert!(debug_flags_help().contains("camparams-assembler"));
    }
}
