// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Condition registry
//!
//! Maps application-defined condition ids to bit positions (in registration
//! order) and keeps the ready mask: the union of the bits a frame must carry
//! to be complete.

use std::fmt::Debug;
use std::hash::Hash;

use ahash::AHashMap;

use crate::error::{AssemblerError, AssemblerResult};

/// Maximum number of distinct conditions per assembler (one bit each in a `u64`)
pub const MAX_CONDITIONS: usize = 64;

/// Anything usable as a condition tag.
pub trait Condition: Copy + Eq + Hash + Debug + Send + 'static {}

impl<T> Condition for T where T: Copy + Eq + Hash + Debug + Send + 'static {}

/// Outcome of [`ConditionRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// New condition, assigned the given bit
    Added(u64),
    /// Already registered and active, nothing changed
    AlreadyRegistered(u64),
    /// Was removed earlier; its original bit is mandatory again
    Reactivated(u64),
}

impl Registration {
    pub fn bit(&self) -> u64 {
        match *self {
            Registration::Added(bit)
            | Registration::AlreadyRegistered(bit)
            | Registration::Reactivated(bit) => bit,
        }
    }
}

/// Condition id -> bit mapping plus the active ready mask
#[derive(Debug, Clone)]
pub struct ConditionRegistry<C: Condition> {
    bits: AHashMap<C, u64>,
    ready_mask: u64,
}

impl<C: Condition> ConditionRegistry<C> {
    pub fn new() -> Self {
        Self {
            bits: AHashMap::new(),
            ready_mask: 0,
        }
    }

    /// Register a condition, assigning the next free bit.
    ///
    /// Fails with `CapacityExceeded` once [`MAX_CONDITIONS`] distinct ids are
    /// known; the registry is left untouched in that case.
    pub fn register(&mut self, condition: C) -> AssemblerResult<Registration> {
        if let Some(&bit) = self.bits.get(&condition) {
            if self.ready_mask & bit != 0 {
                return Ok(Registration::AlreadyRegistered(bit));
            }
            self.ready_mask |= bit;
            return Ok(Registration::Reactivated(bit));
        }

        if self.bits.len() >= MAX_CONDITIONS {
            return Err(AssemblerError::CapacityExceeded {
                max: MAX_CONDITIONS,
            });
        }

        let bit = 1u64 << self.bits.len();
        self.bits.insert(condition, bit);
        self.ready_mask |= bit;
        Ok(Registration::Added(bit))
    }

    /// Make a condition non-mandatory. The id keeps its bit so bundles already
    /// in flight stay consistent. Returns false for unknown ids.
    pub fn remove(&mut self, condition: &C) -> bool {
        match self.bits.get(condition) {
            Some(&bit) => {
                self.ready_mask &= !bit;
                true
            }
            None => false,
        }
    }

    /// Bit for a condition, or 0 when it was never registered
    pub fn mask_of(&self, condition: &C) -> u64 {
        self.bits.get(condition).copied().unwrap_or(0)
    }

    pub fn bit(&self, condition: &C) -> Option<u64> {
        self.bits.get(condition).copied()
    }

    pub fn ready_mask(&self) -> u64 {
        self.ready_mask
    }

    /// Number of distinct ids ever registered (removed ones included)
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// True when `have` covers every mandatory bit
    pub fn is_complete(&self, have: u64) -> bool {
        have & self.ready_mask == self.ready_mask
    }

    /// Mandatory conditions absent from `have`, ordered by bit position
    pub fn missing(&self, have: u64) -> Vec<C> {
        let mut missing: Vec<(u64, C)> = self
            .bits
            .iter()
            .filter(|(_, &bit)| self.ready_mask & bit != 0 && have & bit == 0)
            .map(|(&condition, &bit)| (bit, condition))
            .collect();
        missing.sort_by_key(|(bit, _)| *bit);
        missing.into_iter().map(|(_, condition)| condition).collect()
    }

    pub fn clear(&mut self) {
        self.bits.clear();
        self.ready_mask = 0;
    }
}

impl<C: Condition> Default for ConditionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_follow_registration_order() {
        let mut registry = ConditionRegistry::new();
        assert_eq!(registry.register("ae").unwrap(), Registration::Added(0b01));
        assert_eq!(registry.register("awb").unwrap(), Registration::Added(0b10));
        assert_eq!(registry.ready_mask(), 0b11);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = ConditionRegistry::new();
        registry.register("ae").unwrap();
        registry.register("awb").unwrap();

        let again = registry.register("ae").unwrap();
        assert_eq!(again, Registration::AlreadyRegistered(0b01));
        assert_eq!(again.bit(), registry.bit(&"ae").unwrap());
        assert_eq!(registry.ready_mask(), 0b11);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_capacity_exceeded_leaves_registry_unchanged() {
        let mut registry = ConditionRegistry::new();
        for id in 0..MAX_CONDITIONS as u32 {
            registry.register(id).unwrap();
        }
        assert_eq!(registry.ready_mask(), u64::MAX);
        assert_eq!(registry.bit(&63), Some(1u64 << 63));

        let err = registry.register(64).unwrap_err();
        assert_eq!(err, AssemblerError::CapacityExceeded { max: 64 });
        assert_eq!(registry.len(), MAX_CONDITIONS);
        assert_eq!(registry.ready_mask(), u64::MAX);
        assert_eq!(registry.bit(&64), None);

        // Known ids are still accepted at capacity
        assert!(registry.register(5).is_ok());
    }

    #[test]
    fn test_remove_keeps_bit_mapping() {
        let mut registry = ConditionRegistry::new();
        registry.register("ae").unwrap();
        registry.register("awb").unwrap();

        assert!(registry.remove(&"ae"));
        assert_eq!(registry.ready_mask(), 0b10);
        assert_eq!(registry.bit(&"ae"), Some(0b01));
        assert!(registry.is_complete(0b10));
        assert!(!registry.remove(&"af"));

        let reactivated = registry.register("ae").unwrap();
        assert_eq!(reactivated, Registration::Reactivated(0b01));
        assert_eq!(reactivated.bit(), 0b01);
        assert_eq!(registry.ready_mask(), 0b11);
    }

    #[test]
    fn test_missing_ordered_by_bit() {
        let mut registry = ConditionRegistry::new();
        for name in ["ae", "awb", "af", "lsc"] {
            registry.register(name).unwrap();
        }
        assert_eq!(registry.missing(0b0101), vec!["awb", "lsc"]);
        assert!(registry.missing(0b1111).is_empty());
        assert_eq!(registry.mask_of(&"unknown"), 0);
    }
}
