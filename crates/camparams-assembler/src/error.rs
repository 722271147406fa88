// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the params assembler.
//!
//! Only conditions a caller can act on are surfaced here. Ignored inputs,
//! consistency violations and overflow/disorder merges are handled inside the
//! assembler, logged, and counted in [`crate::AssemblerStats`].

use thiserror::Error;

/// Errors returned by [`crate::ParamsAssembler`] operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    /// Registering another distinct condition would exceed the bit capacity
    #[error("condition capacity exceeded: at most {max} conditions per assembler")]
    CapacityExceeded { max: usize },

    /// Nothing is ready to be dequeued (expected, poll again later)
    #[error("no ready params available")]
    NoDataAvailable,

    /// Invalid argument supplied by the caller
    #[error("bad argument: {0}")]
    BadArgument(String),
}

/// Result type for assembler operations
pub type AssemblerResult<T> = Result<T, AssemblerError>;
