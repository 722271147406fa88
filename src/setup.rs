// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wiring from configuration sections to assembler instances

use camparams_assembler::{AssemblerError, AssemblerResult, Condition, ParamsAssembler};
use camparams_config::AssemblerSection;
use tracing::info;

/// Build an assembler named and bounded by `section`
pub fn assembler_from_section<C, P>(section: &AssemblerSection) -> AssemblerResult<ParamsAssembler<C, P>>
where
    C: Condition,
    P: ?Sized,
{
    let assembler = ParamsAssembler::with_max_pending(section.name.as_str(), section.max_pending)?;
    info!(
        target: "camparams",
        "Created params assembler {} (max pending {})",
        section.name, section.max_pending
    );
    Ok(assembler)
}

/// Register the section's condition names, in listed order.
///
/// `resolve` maps a configured name to the application's condition type.
/// Unknown names fail with `BadArgument` and stop registration there.
pub fn register_conditions<C, P, F>(
    assembler: &ParamsAssembler<C, P>,
    section: &AssemblerSection,
    resolve: F,
) -> AssemblerResult<usize>
where
    C: Condition,
    P: ?Sized,
    F: Fn(&str) -> Option<C>,
{
    for name in &section.conditions {
        let condition = resolve(name).ok_or_else(|| {
            AssemblerError::BadArgument(format!(
                "unknown condition '{}' in [{}] config",
                name, section.name
            ))
        })?;
        assembler.add_condition(condition)?;
    }
    Ok(section.conditions.len())
}

/// Console logging options from the `[logging]` section
#[cfg(feature = "observability")]
pub fn log_options(
    logging: &camparams_config::LoggingSection,
) -> camparams_observability::LogOptions {
    camparams_observability::LogOptions {
        level: logging.level.to_lowercase(),
        json: logging.format == camparams_config::LogFormat::Json,
    }
}
