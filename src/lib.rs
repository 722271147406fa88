// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # camparams
//!
//! Per-frame camera parameter assembly. Independent producers (auto exposure,
//! white balance, focus, ...) each deliver a partial result for a frame; the
//! assembler hands the ISP-facing consumer exactly one complete bundle per
//! frame, in frame order.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! camparams = "0.1"  # Default: assembler + config + observability
//! ```
//!
//! ## Feature Flags
//! - **`config`** (default): TOML configuration (`camparams.toml`)
//! - **`observability`** (default): logging setup and debug flags
//! - **`file-logging`**: rotating file logs (implies `observability`)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use camparams::{ParamsAssembler, PartialResult};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Cond { Ae, Awb }
//!
//! let isp: ParamsAssembler<Cond, [u8]> = ParamsAssembler::new("ISP_PARAMS_ASSEMBLER");
//! isp.add_condition(Cond::Ae)?;
//! isp.add_condition(Cond::Awb)?;
//! isp.start();
//!
//! isp.queue(PartialResult::new(0, Cond::Ae, Arc::from(&[0x10u8][..])));
//! isp.queue(PartialResult::new(0, Cond::Awb, Arc::from(&[0x20u8][..])));
//! assert!(isp.ready());
//! assert_eq!(isp.dequeue_one()?.frame_id, 0);
//! # Ok::<(), camparams::AssemblerError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use camparams_assembler as assembler;
pub use camparams_assembler::{
    AssemblerError, AssemblerResult, AssemblerStats, Condition, FrameId, ParamsAssembler,
    ParamsSink, PartialResult, ReadyParams, DEFAULT_MAX_PENDING, FRAME_ID_ANY, MAX_CONDITIONS,
};

#[cfg(feature = "config")]
pub use camparams_config as config;

#[cfg(feature = "observability")]
pub use camparams_observability as observability;

#[cfg(feature = "config")]
pub mod setup;

#[cfg(feature = "config")]
pub use setup::{assembler_from_section, register_conditions};

#[cfg(all(feature = "config", feature = "observability"))]
pub use setup::log_options;
