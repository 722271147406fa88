// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-frame params assembler
//!
//! Producers queue partial results tagged with a condition; the consumer
//! dequeues one complete bundle per frame id, oldest first.
//!
//! ## Accept path
//!
//! ```text
//! queue(result)
//!   ├─ not started ──> init buffer (replayed by start())
//!   └─ started
//!        ├─ frame <= latest ready (or FRAME_ID_ANY) ──> re-target to oldest
//!        │                                             bundle missing the bit
//!        ├─ nothing ready yet and frame != 0 ──> frame 0
//!        ├─ append to bundle[frame], recompute readiness
//!        └─ overflow / disorder pass ──> merge stale head bundles into one
//!                                        synthetic ready bundle
//! ```
//!
//! Every operation takes the same exclusive lock for its whole duration.
//! Critical sections are map and bitmask work only.

use std::collections::BTreeMap;
use std::fmt;
use std::mem;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::bundle::Bundle;
use crate::condition::{Condition, ConditionRegistry, Registration};
use crate::error::{AssemblerError, AssemblerResult};
use crate::result::{FrameId, PartialResult, ReadyParams, FRAME_ID_ANY};
use crate::sink::ParamsSink;
use crate::stats::AssemblerStats;

/// Default bound on the number of pending bundles
pub const DEFAULT_MAX_PENDING: usize = 10;

const TARGET: &str = "camparams-assembler";

/// Instance name plus camera id, prefixed to every log line
#[derive(Clone, Copy)]
struct LogTag<'a> {
    name: &'a str,
    cam_phy_id: Option<i32>,
}

impl fmt::Display for LogTag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cam_phy_id {
            Some(id) => write!(f, "{}[cam {}]", self.name, id),
            None => f.write_str(self.name),
        }
    }
}

struct AssemblerState<C: Condition, P: ?Sized> {
    registry: ConditionRegistry<C>,
    pending: BTreeMap<FrameId, Bundle<C, P>>,
    init_buffer: Vec<PartialResult<C, P>>,
    started: bool,
    ready_count: usize,
    latest_ready: Option<FrameId>,
    cam_phy_id: Option<i32>,
    merges: u64,
    forced: u64,
    consistency_drops: u64,
    dropped_results: u64,
}

impl<C: Condition, P: ?Sized> AssemblerState<C, P> {
    fn new() -> Self {
        Self {
            registry: ConditionRegistry::new(),
            pending: BTreeMap::new(),
            init_buffer: Vec::new(),
            started: false,
            ready_count: 0,
            latest_ready: None,
            cam_phy_id: None,
            merges: 0,
            forced: 0,
            consistency_drops: 0,
            dropped_results: 0,
        }
    }

    /// Target for a result that arrived for an already closed frame: the
    /// oldest pending bundle still missing `bit`, else a fresh frame after
    /// everything pending.
    fn retarget(&self, bit: u64, latest: FrameId, tag: LogTag<'_>) -> FrameId {
        if let Some((&frame_id, _)) = self.pending.iter().find(|(_, b)| b.have & bit == 0) {
            return frame_id;
        }
        match self.pending.keys().next_back() {
            Some(&last) => last.saturating_add(1),
            None => {
                warn!(
                    target: TARGET,
                    "{}: latest ready frame {}, no unready params to merge into, should not happen",
                    tag, latest
                );
                latest.saturating_add(1)
            }
        }
    }

    fn head_unready(&self) -> bool {
        self.pending.values().next().map_or(false, |b| !b.ready)
    }

    fn mark_ready(&mut self, frame_id: FrameId) {
        self.ready_count += 1;
        self.latest_ready = Some(self.latest_ready.map_or(frame_id, |l| l.max(frame_id)));
    }

    fn reset(&mut self) {
        self.registry.clear();
        self.pending.clear();
        self.init_buffer.clear();
        self.started = false;
        self.ready_count = 0;
        self.latest_ready = None;
        self.merges = 0;
        self.forced = 0;
        self.consistency_drops = 0;
        self.dropped_results = 0;
    }
}

/// Collects tagged partial results into one complete bundle per frame.
///
/// One instance per parameter domain (ISP, post-processing, ...). Instances
/// are independent; share one across threads with `Arc`.
pub struct ParamsAssembler<C: Condition, P: ?Sized> {
    name: String,
    max_pending: usize,
    state: Mutex<AssemblerState<C, P>>,
}

impl<C: Condition, P: ?Sized> ParamsAssembler<C, P> {
    /// Create an assembler bounded by [`DEFAULT_MAX_PENDING`]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_pending: DEFAULT_MAX_PENDING,
            state: Mutex::new(AssemblerState::new()),
        }
    }

    /// Create an assembler with a custom pending bound (must be >= 1)
    pub fn with_max_pending(name: impl Into<String>, max_pending: usize) -> AssemblerResult<Self> {
        if max_pending == 0 {
            return Err(AssemblerError::BadArgument(
                "max_pending must be at least 1".to_string(),
            ));
        }
        let mut assembler = Self::new(name);
        assembler.max_pending = max_pending;
        Ok(assembler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    /// Record the physical camera id shown in log lines
    pub fn set_cam_phy_id(&self, cam_phy_id: i32) {
        self.state.lock().cam_phy_id = Some(cam_phy_id);
    }

    fn tag(&self, state: &AssemblerState<C, P>) -> LogTag<'_> {
        LogTag {
            name: &self.name,
            cam_phy_id: state.cam_phy_id,
        }
    }

    // ===== Condition registry =====

    /// Make `condition` mandatory for completeness.
    ///
    /// Idempotent; fails with `CapacityExceeded` for a 65th distinct id.
    pub fn add_condition(&self, condition: C) -> AssemblerResult<()> {
        let mut guard = self.state.lock();
        self.add_condition_locked(&mut guard, condition)
    }

    fn add_condition_locked(
        &self,
        state: &mut AssemblerState<C, P>,
        condition: C,
    ) -> AssemblerResult<()> {
        let tag = self.tag(state);
        match state.registry.register(condition) {
            Ok(Registration::Added(bit)) => {
                info!(
                    target: TARGET,
                    "{}: map cond {:?} -> {:#x}, mask: {:#x}",
                    tag, condition, bit, state.registry.ready_mask()
                );
                Ok(())
            }
            Ok(Registration::AlreadyRegistered(bit)) => {
                info!(target: TARGET, "{}: cond {:?} -> {:#x} already added", tag, condition, bit);
                Ok(())
            }
            Ok(Registration::Reactivated(bit)) => {
                info!(
                    target: TARGET,
                    "{}: cond {:?} -> {:#x} mandatory again, mask: {:#x}",
                    tag, condition, bit, state.registry.ready_mask()
                );
                Ok(())
            }
            Err(err) => {
                error!(target: TARGET, "{}: cannot add cond {:?}: {}", tag, condition, err);
                Err(err)
            }
        }
    }

    /// Make `condition` non-mandatory for future completeness checks
    pub fn remove_condition(&self, condition: C) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let tag = self.tag(state);
        if state.registry.remove(&condition) {
            info!(
                target: TARGET,
                "{}: cond {:?} no longer required, mask: {:#x}",
                tag, condition, state.registry.ready_mask()
            );
        } else {
            debug!(target: TARGET, "{}: cond {:?} was never added", tag, condition);
        }
    }

    pub fn condition_bit(&self, condition: C) -> Option<u64> {
        self.state.lock().registry.bit(&condition)
    }

    pub fn ready_mask(&self) -> u64 {
        self.state.lock().registry.ready_mask()
    }

    // ===== Accept path =====

    /// Accept one partial result
    pub fn queue(&self, result: PartialResult<C, P>) {
        let mut guard = self.state.lock();
        self.queue_locked(&mut guard, result);
    }

    /// Accept several results under one lock acquisition
    pub fn queue_batch<I>(&self, results: I)
    where
        I: IntoIterator<Item = PartialResult<C, P>>,
    {
        let mut guard = self.state.lock();
        let mut queued = 0usize;
        for result in results {
            self.queue_locked(&mut guard, result);
            queued += 1;
        }
        if queued == 0 {
            debug!(target: TARGET, "{}: empty result batch ignored", self.tag(&guard));
        }
    }

    /// Setup-time path for the very first params.
    ///
    /// Registers every result's condition, pins each result to frame 0, then
    /// queues them. Nothing from the batch is queued if a registration fails.
    pub fn queue_initial<I>(&self, results: I) -> AssemblerResult<()>
    where
        I: IntoIterator<Item = PartialResult<C, P>>,
    {
        let results: Vec<_> = results.into_iter().collect();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        for result in &results {
            self.add_condition_locked(state, *result.condition())?;
        }
        for mut result in results {
            result.set_frame_id(0);
            self.queue_locked(state, result);
        }
        Ok(())
    }

    fn queue_locked(&self, state: &mut AssemblerState<C, P>, mut result: PartialResult<C, P>) {
        let tag = self.tag(state);
        let condition = *result.condition();
        let mut frame_id = result.frame_id();

        if !state.started {
            debug!(
                target: TARGET,
                "{}: initial params {:?}, frame {}",
                tag, condition, frame_id
            );
            if state.init_buffer.is_empty() && frame_id != 0 {
                warn!(
                    target: TARGET,
                    "{}: initial params {:?} carry frame {}, expected 0",
                    tag, condition, frame_id
                );
            }
            state.init_buffer.push(result);
            return;
        }

        let bit = state.registry.mask_of(&condition);
        if bit == 0 {
            debug!(
                target: TARGET,
                "{}: {:?} is not a registered condition, kept without completeness credit",
                tag, condition
            );
        }

        match state.latest_ready {
            Some(latest) if frame_id == FRAME_ID_ANY || frame_id <= latest => {
                let target = state.retarget(bit, latest, tag);
                info!(
                    target: TARGET,
                    "{}: {:?} delayed result for frame {}, merged to {}",
                    tag, condition, frame_id, target
                );
                frame_id = target;
                result.set_frame_id(frame_id);
            }
            None if frame_id != 0 => {
                warn!(
                    target: TARGET,
                    "{}: wrong initial frame {} for {:?}, set to 0",
                    tag, frame_id, condition
                );
                frame_id = 0;
                result.set_frame_id(0);
            }
            _ => {}
        }

        let bundle = state.pending.entry(frame_id).or_insert_with(Bundle::new);
        let was_ready = bundle.ready;
        bundle.push(result, bit);
        bundle.ready = was_ready || state.registry.is_complete(bundle.have);
        let newly_ready = bundle.ready && !was_ready;

        trace!(
            target: TARGET,
            "{}: frame {} {:?} -> have {:#x}, mask {:#x}, ready {}",
            tag, frame_id, condition, bundle.have, state.registry.ready_mask(), bundle.ready
        );

        if newly_ready {
            match state.latest_ready {
                Some(latest) if frame_id <= latest => {
                    error!(
                        target: TARGET,
                        "{}: frame {} became ready behind latest ready {}, dropping it",
                        tag, frame_id, latest
                    );
                    if let Some(dropped) = state.pending.remove(&frame_id) {
                        state.dropped_results += dropped.results.len() as u64;
                    }
                    state.consistency_drops += 1;
                }
                _ => {
                    state.mark_ready(frame_id);
                    debug!(
                        target: TARGET,
                        "{}: frame {} params ready, ready count {}",
                        tag, frame_id, state.ready_count
                    );
                }
            }
        }

        self.recover_locked(state);
    }

    /// Overflow / disorder pass.
    ///
    /// When the pending map is over its bound, or a ready bundle sits behind
    /// an unready head, every consecutive unready bundle from the head is
    /// folded into one ready bundle at the highest evicted id.
    fn recover_locked(&self, state: &mut AssemblerState<C, P>) {
        let tag = self.tag(state);
        let overflow = state.pending.len() > self.max_pending;
        let disorder = state.ready_count > 0 && state.head_unready();
        if !overflow && !disorder {
            return;
        }
        if overflow {
            warn!(
                target: TARGET,
                "{}: pending params overflow, {} > max {}",
                tag, state.pending.len(), self.max_pending
            );
        }
        if disorder {
            warn!(target: TARGET, "{}: ready params disordered", tag);
        }

        let mut merged = Vec::new();
        let mut merge_id = None;
        while let Some(entry) = state.pending.first_entry() {
            if entry.get().ready {
                break;
            }
            let (frame_id, bundle) = entry.remove_entry();
            warn!(
                target: TARGET,
                "{}: frame {} not ready (have {:#x}), missing conditions: {:?}",
                tag, frame_id, bundle.have, state.registry.missing(bundle.have)
            );
            merged.extend(bundle.results);
            merge_id = Some(frame_id);
        }

        if let Some(frame_id) = merge_id {
            warn!(
                target: TARGET,
                "{}: merged {} pending params into frame {}",
                tag, merged.len(), frame_id
            );
            let bundle = Bundle::merged(merged, state.registry.ready_mask());
            state.pending.insert(frame_id, bundle);
            state.mark_ready(frame_id);
            state.merges += 1;
        }
    }

    // ===== Dequeue path =====

    /// True when at least one complete bundle can be dequeued
    pub fn ready(&self) -> bool {
        let guard = self.state.lock();
        trace!(target: TARGET, "{}: ready params num {}", self.tag(&guard), guard.ready_count);
        guard.ready_count > 0
    }

    /// Remove and return the oldest complete bundle.
    ///
    /// Returns `NoDataAvailable` when nothing is ready; callers poll around it.
    pub fn dequeue_one(&self) -> AssemblerResult<ReadyParams<C, P>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let tag = self.tag(state);

        if state.ready_count == 0 {
            trace!(target: TARGET, "{}: no ready params", tag);
            return Err(AssemblerError::NoDataAvailable);
        }

        // Readiness reached out of band (force_ready on a later frame, or a
        // dequeue exposing an unready bundle) leaves the head stale.
        if state.head_unready() {
            self.recover_locked(state);
        }

        match state.pending.pop_first() {
            Some((frame_id, bundle)) => {
                debug_assert!(bundle.ready);
                state.ready_count -= 1;
                debug!(
                    target: TARGET,
                    "{}: dequeue frame {} params, {} results",
                    tag, frame_id, bundle.results.len()
                );
                Ok(ReadyParams {
                    frame_id,
                    results: bundle.results,
                })
            }
            None => {
                error!(
                    target: TARGET,
                    "{}: ready count {} with no pending params",
                    tag, state.ready_count
                );
                state.ready_count = 0;
                Err(AssemblerError::NoDataAvailable)
            }
        }
    }

    /// Dequeue every ready bundle into `sink`, oldest first.
    ///
    /// The lock is released between bundles. Stops at the first sink error.
    pub fn drain_into<S>(&self, sink: &mut S) -> Result<usize, S::Error>
    where
        S: ParamsSink<C, P>,
    {
        let mut applied = 0;
        while let Ok(params) = self.dequeue_one() {
            sink.apply(params)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Complete a pending bundle now with whatever it has.
    ///
    /// Returns false (and only logs) when the frame is not pending or is
    /// already ready.
    pub fn force_ready(&self, frame_id: FrameId) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let tag = self.tag(state);
        let ready_mask = state.registry.ready_mask();

        let next = state.pending.keys().next().copied();
        let Some(bundle) = state.pending.get_mut(&frame_id) else {
            debug!(
                target: TARGET,
                "{}: force ready: frame {} params do not exist, next is {:?}",
                tag, frame_id, next
            );
            return false;
        };
        if bundle.ready {
            warn!(target: TARGET, "{}: force ready: frame {} params already ready", tag, frame_id);
            return false;
        }

        let have = bundle.have;
        bundle.have |= ready_mask;
        bundle.ready = true;

        let missing = state.registry.missing(have);
        if !missing.is_empty() {
            warn!(
                target: TARGET,
                "{}: force ready: frame {} missing conditions: {:?}",
                tag, frame_id, missing
            );
        }
        warn!(target: TARGET, "{}: frame {} params forced to ready", tag, frame_id);

        state.mark_ready(frame_id);
        state.forced += 1;
        self.recover_locked(state);
        true
    }

    // ===== Lifecycle =====

    /// Begin readiness processing and replay buffered initial params
    pub fn start(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.started {
            return;
        }
        state.started = true;

        let buffered = mem::take(&mut state.init_buffer);
        info!(
            target: TARGET,
            "{}: started, replaying {} initial params",
            self.tag(state), buffered.len()
        );
        for result in buffered {
            self.queue_locked(state, result);
        }
    }

    /// Stop and reset. No-op unless started.
    pub fn stop(&self) {
        let mut guard = self.state.lock();
        if !guard.started {
            return;
        }
        info!(target: TARGET, "{}: stopped", self.tag(&guard));
        guard.reset();
    }

    /// Drop all pending params, buffered params and conditions
    pub fn reset(&self) {
        let mut guard = self.state.lock();
        debug!(target: TARGET, "{}: reset", self.tag(&guard));
        guard.reset();
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    // ===== Introspection =====

    pub fn latest_ready_frame_id(&self) -> Option<FrameId> {
        self.state.lock().latest_ready
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Conditions a pending frame still lacks; `None` if the frame is not pending
    pub fn missing_conditions(&self, frame_id: FrameId) -> Option<Vec<C>> {
        let guard = self.state.lock();
        guard
            .pending
            .get(&frame_id)
            .map(|bundle| guard.registry.missing(bundle.have))
    }

    pub fn stats(&self) -> AssemblerStats {
        let guard = self.state.lock();
        AssemblerStats {
            name: self.name.clone(),
            cam_phy_id: guard.cam_phy_id,
            started: guard.started,
            pending: guard.pending.len(),
            buffered: guard.init_buffer.len(),
            ready_count: guard.ready_count,
            latest_ready_frame_id: guard.latest_ready,
            registered_conditions: guard.registry.len(),
            ready_mask: guard.registry.ready_mask(),
            merges: guard.merges,
            forced: guard.forced,
            consistency_drops: guard.consistency_drops,
            dropped_results: guard.dropped_results,
        }
    }
}

impl<C: Condition, P: ?Sized> fmt::Debug for ParamsAssembler<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamsAssembler")
            .field("name", &self.name)
            .field("max_pending", &self.max_pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Cond {
        Ae,
        Awb,
        Af,
    }

    fn result(frame_id: FrameId, condition: Cond) -> PartialResult<Cond, u32> {
        PartialResult::new(frame_id, condition, Arc::new(frame_id.unsigned_abs()))
    }

    fn ae_awb(max_pending: usize) -> ParamsAssembler<Cond, u32> {
        let assembler = ParamsAssembler::with_max_pending("test", max_pending).unwrap();
        assembler.add_condition(Cond::Ae).unwrap();
        assembler.add_condition(Cond::Awb).unwrap();
        assembler.start();
        assembler
    }

    /// Complete and dequeue frame 0 so the latest ready id is set
    fn close_frame_zero(assembler: &ParamsAssembler<Cond, u32>) {
        assembler.queue(result(0, Cond::Ae));
        assembler.queue(result(0, Cond::Awb));
        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 0);
    }

    #[test]
    fn test_complete_frame_is_dequeued_in_order() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assembler.queue(result(0, Cond::Ae));
        assert!(!assembler.ready());
        assembler.queue(result(0, Cond::Awb));
        assert!(assembler.ready());

        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.frame_id, 0);
        assert_eq!(params.conditions().copied().collect::<Vec<_>>(), vec![Cond::Ae, Cond::Awb]);
        assert!(!assembler.ready());

        assembler.queue(result(1, Cond::Ae));
        assert!(!assembler.ready());
        assert!(assembler.force_ready(1));
        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.frame_id, 1);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_dequeue_without_ready_params() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assert_eq!(assembler.dequeue_one().unwrap_err(), AssemblerError::NoDataAvailable);
        assembler.queue(result(0, Cond::Ae));
        assert_eq!(assembler.dequeue_one().unwrap_err(), AssemblerError::NoDataAvailable);
    }

    #[test]
    fn test_unstarted_results_replayed_on_start() {
        let assembler: ParamsAssembler<Cond, u32> = ParamsAssembler::new("init");
        assembler.add_condition(Cond::Ae).unwrap();
        assembler.add_condition(Cond::Awb).unwrap();

        assembler.queue(result(0, Cond::Ae));
        assembler.queue(result(0, Cond::Awb));
        assert!(!assembler.ready());
        let stats = assembler.stats();
        assert_eq!(stats.buffered, 2);
        assert_eq!(stats.pending, 0);

        assembler.start();
        assembler.start();
        assert!(assembler.ready());
        assert_eq!(assembler.stats().buffered, 0);
        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 0);
    }

    #[test]
    fn test_first_frame_forced_to_zero() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assembler.queue(result(5, Cond::Ae));
        assembler.queue(result(7, Cond::Awb));

        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.frame_id, 0);
        assert!(params.results.iter().all(|r| r.frame_id() == 0));
        assert_eq!(assembler.latest_ready_frame_id(), Some(0));
    }

    #[test]
    fn test_late_result_merged_into_oldest_missing_bundle() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        close_frame_zero(&assembler);

        assembler.queue(result(1, Cond::Ae));
        assembler.queue(result(0, Cond::Awb));

        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.frame_id, 1);
        assert_eq!(params.results[1].frame_id(), 1);
        assert_eq!(*params.results[1].condition(), Cond::Awb);
    }

    #[test]
    fn test_late_result_without_pending_opens_next_frame() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        close_frame_zero(&assembler);

        assembler.queue(result(0, Cond::Ae));
        assert_eq!(assembler.pending_len(), 1);
        assert_eq!(assembler.missing_conditions(1), Some(vec![Cond::Awb]));
    }

    #[test]
    fn test_late_result_after_highest_pending() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        close_frame_zero(&assembler);

        assembler.queue(result(1, Cond::Ae));
        assembler.queue(result(2, Cond::Ae));
        assembler.queue(result(0, Cond::Ae));

        assert_eq!(assembler.pending_len(), 3);
        assert_eq!(assembler.missing_conditions(3), Some(vec![Cond::Awb]));
        assert!(!assembler.ready());
    }

    #[test]
    fn test_dont_care_frame_id() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assembler.queue(result(FRAME_ID_ANY, Cond::Ae));
        assembler.queue(result(FRAME_ID_ANY, Cond::Awb));
        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 0);

        assembler.queue(result(FRAME_ID_ANY, Cond::Ae));
        assembler.queue(result(FRAME_ID_ANY, Cond::Awb));
        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.frame_id, 1);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_overflow_merges_unready_bundles() {
        let assembler = ae_awb(2);
        close_frame_zero(&assembler);

        assembler.queue(result(1, Cond::Ae));
        assembler.queue(result(2, Cond::Ae));
        assert!(!assembler.ready());
        assembler.queue(result(3, Cond::Ae));

        assert!(assembler.pending_len() <= 2);
        assert!(assembler.ready());
        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.frame_id, 3);
        assert_eq!(
            params.results.iter().map(|r| r.frame_id()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let stats = assembler.stats();
        assert_eq!(stats.merges, 1);
        assert_eq!(stats.latest_ready_frame_id, Some(3));
    }

    #[test]
    fn test_never_ready_before_first_frame_stays_single_bundle() {
        let assembler = ae_awb(2);
        for frame_id in 0..4 {
            assembler.queue(result(frame_id, Cond::Ae));
        }
        // Nothing ready yet, so every id folds into frame 0
        assert_eq!(assembler.pending_len(), 1);
        assert!(!assembler.ready());

        assert!(assembler.force_ready(0));
        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.frame_id, 0);
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_disorder_merges_stale_head() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        close_frame_zero(&assembler);

        assembler.queue(result(1, Cond::Ae));
        assembler.queue(result(2, Cond::Ae));
        assembler.queue(result(2, Cond::Awb));

        let first = assembler.dequeue_one().unwrap();
        assert_eq!(first.frame_id, 1);
        assert_eq!(first.len(), 1);
        let second = assembler.dequeue_one().unwrap();
        assert_eq!(second.frame_id, 2);
        assert_eq!(second.len(), 2);
        assert_eq!(assembler.stats().merges, 1);
    }

    #[test]
    fn test_ready_behind_latest_is_dropped() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assembler.queue(result(0, Cond::Ae));
        assembler.queue(result(0, Cond::Awb));
        assembler.queue(result(1, Cond::Ae));
        assembler.queue(result(2, Cond::Ae));
        assembler.queue(result(2, Cond::Awb));
        // Late AWB for frame 1 completes it behind ready frame 2
        assembler.queue(result(1, Cond::Awb));

        let stats = assembler.stats();
        assert_eq!(stats.consistency_drops, 1);
        assert_eq!(stats.dropped_results, 2);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.ready_count, 2);
        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 0);
        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 2);
        assert!(!assembler.ready());
    }

    #[test]
    fn test_dequeue_repairs_unready_head() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assembler.queue(result(0, Cond::Ae));
        assembler.queue(result(0, Cond::Awb));
        assembler.queue(result(1, Cond::Ae));
        assembler.queue(result(2, Cond::Ae));
        assembler.queue(result(2, Cond::Awb));

        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 0);
        // Frame 1 is now an unready head in front of ready frame 2
        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 1);
        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 2);
    }

    #[test]
    fn test_force_ready_noops() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assert!(!assembler.force_ready(4));

        assembler.queue(result(0, Cond::Ae));
        assembler.queue(result(0, Cond::Awb));
        assert!(!assembler.force_ready(0));
        assert_eq!(assembler.stats().ready_count, 1);
    }

    #[test]
    fn test_force_ready_merges_older_unready() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        close_frame_zero(&assembler);

        assembler.queue(result(1, Cond::Ae));
        assembler.queue(result(2, Cond::Ae));
        assert!(assembler.force_ready(2));

        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 1);
        let forced = assembler.dequeue_one().unwrap();
        assert_eq!(forced.frame_id, 2);
        assert_eq!(forced.conditions().copied().collect::<Vec<_>>(), vec![Cond::Ae]);
        assert_eq!(assembler.stats().forced, 1);
    }

    #[test]
    fn test_removed_condition_not_required() {
        let assembler: ParamsAssembler<Cond, u32> = ParamsAssembler::new("rm");
        assembler.add_condition(Cond::Ae).unwrap();
        assembler.add_condition(Cond::Awb).unwrap();
        assembler.remove_condition(Cond::Awb);
        assert_eq!(assembler.condition_bit(Cond::Awb), Some(0b10));
        assert_eq!(assembler.ready_mask(), 0b01);

        assembler.start();
        assembler.queue(result(0, Cond::Ae));
        assert!(assembler.ready());
    }

    #[test]
    fn test_unregistered_condition_kept_without_credit() {
        let assembler: ParamsAssembler<Cond, u32> = ParamsAssembler::new("extra");
        assembler.add_condition(Cond::Ae).unwrap();
        assembler.start();

        assembler.queue(result(0, Cond::Af));
        assert!(!assembler.ready());
        assembler.queue(result(0, Cond::Ae));

        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.conditions().copied().collect::<Vec<_>>(), vec![Cond::Af, Cond::Ae]);
    }

    #[test]
    fn test_capacity_error_from_assembler() {
        let assembler: ParamsAssembler<u8, ()> = ParamsAssembler::new("cap");
        for id in 0..64u8 {
            assembler.add_condition(id).unwrap();
        }
        assert_eq!(
            assembler.add_condition(64).unwrap_err(),
            AssemblerError::CapacityExceeded { max: 64 }
        );
        assert_eq!(assembler.ready_mask(), u64::MAX);
        assert_eq!(assembler.stats().registered_conditions, 64);
    }

    #[test]
    fn test_reset_forgets_everything() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assembler.set_cam_phy_id(2);
        assembler.queue(result(0, Cond::Ae));
        assembler.queue(result(0, Cond::Awb));
        assembler.reset();

        assert!(!assembler.ready());
        assert!(!assembler.is_started());
        let stats = assembler.stats();
        assert_eq!(stats.registered_conditions, 0);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.latest_ready_frame_id, None);
        assert_eq!(stats.cam_phy_id, Some(2));

        assembler.add_condition(Cond::Af).unwrap();
        assert_eq!(assembler.condition_bit(Cond::Af), Some(0b01));
        assembler.start();
        assembler.queue(result(9, Cond::Af));
        assert_eq!(assembler.dequeue_one().unwrap().frame_id, 0);
    }

    #[test]
    fn test_stop_only_resets_started_assembler() {
        let assembler: ParamsAssembler<Cond, u32> = ParamsAssembler::new("stop");
        assembler.add_condition(Cond::Ae).unwrap();
        assembler.queue(result(0, Cond::Ae));
        assembler.stop();
        assert_eq!(assembler.stats().buffered, 1);

        assembler.start();
        assert!(assembler.ready());
        assembler.stop();
        assert!(!assembler.is_started());
        assert!(!assembler.ready());
        assert_eq!(assembler.stats().registered_conditions, 0);
    }

    #[test]
    fn test_queue_initial_registers_and_pins_frame_zero() {
        let assembler: ParamsAssembler<Cond, u32> = ParamsAssembler::new("prime");
        assembler
            .queue_initial(vec![result(3, Cond::Ae), result(9, Cond::Awb)])
            .unwrap();
        assert_eq!(assembler.ready_mask(), 0b11);
        assert_eq!(assembler.stats().buffered, 2);

        assembler.start();
        let params = assembler.dequeue_one().unwrap();
        assert_eq!(params.frame_id, 0);
        assert!(params.results.iter().all(|r| r.frame_id() == 0));
    }

    #[test]
    fn test_queue_batch() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assembler.queue_batch(Vec::new());
        assert_eq!(assembler.pending_len(), 0);

        assembler.queue_batch(vec![result(0, Cond::Ae), result(0, Cond::Awb)]);
        assert!(assembler.ready());
    }

    struct FailingSink {
        applied: Vec<FrameId>,
        fail_on: FrameId,
    }

    impl ParamsSink<Cond, u32> for FailingSink {
        type Error = String;

        fn apply(&mut self, params: ReadyParams<Cond, u32>) -> Result<(), String> {
            if params.frame_id == self.fail_on {
                return Err(format!("device rejected frame {}", params.frame_id));
            }
            self.applied.push(params.frame_id);
            Ok(())
        }
    }

    #[test]
    fn test_drain_into_sinks() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        for frame_id in 0..3 {
            assembler.queue(result(frame_id, Cond::Ae));
            assembler.queue(result(frame_id, Cond::Awb));
        }
        let mut collected: Vec<ReadyParams<Cond, u32>> = Vec::new();
        assert_eq!(assembler.drain_into(&mut collected), Ok(3));
        assert_eq!(
            collected.iter().map(|p| p.frame_id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        for frame_id in 3..6 {
            assembler.queue(result(frame_id, Cond::Ae));
            assembler.queue(result(frame_id, Cond::Awb));
        }
        let mut sink = FailingSink {
            applied: Vec::new(),
            fail_on: 4,
        };
        assert!(assembler.drain_into(&mut sink).is_err());
        assert_eq!(sink.applied, vec![3]);
        assert!(assembler.ready());
    }

    #[test]
    fn test_max_pending_must_be_positive() {
        let err = ParamsAssembler::<Cond, u32>::with_max_pending("zero", 0).unwrap_err();
        assert!(matches!(err, AssemblerError::BadArgument(_)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_stats_serialize() {
        let assembler = ae_awb(DEFAULT_MAX_PENDING);
        assembler.queue(result(0, Cond::Ae));
        let json = serde_json::to_value(assembler.stats()).unwrap();
        assert_eq!(json["name"], "test");
        assert_eq!(json["pending"], 1);
        assert_eq!(json["ready_mask"], 3);
        assert_eq!(json["dropped_results"], 0);
    }
}
