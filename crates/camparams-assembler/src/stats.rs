// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Point-in-time snapshot of an assembler, for health checks and tooling

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::result::FrameId;

/// Assembler state snapshot taken under the lock
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AssemblerStats {
    pub name: String,
    pub cam_phy_id: Option<i32>,
    pub started: bool,
    /// Bundles in the pending map (ready or not)
    pub pending: usize,
    /// Results held back until `start()`
    pub buffered: usize,
    pub ready_count: usize,
    pub latest_ready_frame_id: Option<FrameId>,
    pub registered_conditions: usize,
    pub ready_mask: u64,
    /// Overflow/disorder merge passes that produced a synthetic bundle
    pub merges: u64,
    /// Bundles completed through `force_ready`
    pub forced: u64,
    /// Bundles dropped for becoming ready behind the latest ready frame
    pub consistency_drops: u64,
    /// Results discarded along with those bundles
    pub dropped_results: u64,
}
