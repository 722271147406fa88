// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # camparams-assembler
//!
//! Per-frame parameter assembly for imaging pipelines.
//!
//! Independent producers (3A algorithms, hardware-facing stages) each emit a
//! partial result for a frame, tagged with a *condition*. The assembler
//! collects them and releases exactly one complete bundle per frame id to a
//! single consumer, which pushes it to the ISP.
//!
//! ## Guarantees
//! - At most one completed bundle per frame id
//! - Dequeued frame ids never decrease
//! - Late or out-of-order results are re-targeted, not lost
//! - Pending bundles stay bounded: stale bundles are merged when producers stall
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use camparams_assembler::{ParamsAssembler, PartialResult};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Cond { Ae, Awb }
//!
//! let assembler: ParamsAssembler<Cond, Vec<u8>> = ParamsAssembler::new("ISP_PARAMS_ASSEMBLER");
//! assembler.add_condition(Cond::Ae)?;
//! assembler.add_condition(Cond::Awb)?;
//! assembler.start();
//!
//! assembler.queue(PartialResult::new(0, Cond::Ae, Arc::new(vec![1, 2])));
//! assembler.queue(PartialResult::new(0, Cond::Awb, Arc::new(vec![3])));
//!
//! while assembler.ready() {
//!     let params = assembler.dequeue_one()?;
//!     assert_eq!(params.frame_id, 0);
//! }
//! # Ok::<(), camparams_assembler::AssemblerError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod assembler;
mod bundle;
pub mod condition;
pub mod error;
pub mod result;
pub mod sink;
pub mod stats;

pub use assembler::{ParamsAssembler, DEFAULT_MAX_PENDING};
pub use condition::{Condition, ConditionRegistry, Registration, MAX_CONDITIONS};
pub use error::{AssemblerError, AssemblerResult};
pub use result::{FrameId, PartialResult, ReadyParams, FRAME_ID_ANY};
pub use sink::ParamsSink;
pub use stats::AssemblerStats;
