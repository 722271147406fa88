// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-frame accumulation of partial results

use crate::result::PartialResult;

/// Results collected so far for one frame id
pub(crate) struct Bundle<C, P: ?Sized> {
    pub(crate) results: Vec<PartialResult<C, P>>,
    /// Condition bits received. Only grows while the bundle is pending.
    pub(crate) have: u64,
    pub(crate) ready: bool,
}

impl<C, P: ?Sized> Bundle<C, P> {
    pub(crate) fn new() -> Self {
        Self {
            results: Vec::new(),
            have: 0,
            ready: false,
        }
    }

    /// Force-completed bundle built from results evicted by a merge pass
    pub(crate) fn merged(results: Vec<PartialResult<C, P>>, ready_mask: u64) -> Self {
        Self {
            results,
            have: ready_mask,
            ready: true,
        }
    }

    pub(crate) fn push(&mut self, result: PartialResult<C, P>, bit: u64) {
        self.results.push(result);
        self.have |= bit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_push_accumulates_bits() {
        let mut bundle: Bundle<&str, u8> = Bundle::new();
        bundle.push(PartialResult::new(0, "ae", Arc::new(1)), 0b01);
        bundle.push(PartialResult::new(0, "ae", Arc::new(2)), 0b01);
        bundle.push(PartialResult::new(0, "awb", Arc::new(3)), 0b10);

        assert_eq!(bundle.have, 0b11);
        assert_eq!(bundle.results.len(), 3);
        assert!(!bundle.ready);
    }

    #[test]
    fn test_merged_is_ready() {
        let bundle: Bundle<&str, u8> = Bundle::merged(Vec::new(), 0b111);
        assert!(bundle.ready);
        assert_eq!(bundle.have, 0b111);
    }
}
