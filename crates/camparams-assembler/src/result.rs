// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tagged partial results handed in by producers, and the completed
//! per-frame bundles handed out to the consumer.

use std::fmt;
use std::sync::Arc;

/// Frame sequence number. Signed so that [`FRAME_ID_ANY`] fits.
pub type FrameId = i32;

/// "Don't care" frame id: the assembler picks the best matching bundle.
pub const FRAME_ID_ANY: FrameId = -1;

/// One partial result for a frame, tagged with the condition it satisfies.
///
/// The payload is shared (`Arc`) so the producer can keep its own handle
/// without copying large configuration blocks. The assembler never looks
/// inside it.
pub struct PartialResult<C, P: ?Sized> {
    frame_id: FrameId,
    condition: C,
    payload: Arc<P>,
}

impl<C, P: ?Sized> PartialResult<C, P> {
    pub fn new(frame_id: FrameId, condition: C, payload: Arc<P>) -> Self {
        Self {
            frame_id,
            condition,
            payload,
        }
    }

    /// Frame id the result currently targets.
    ///
    /// For results that went through late-arrival re-targeting this is the
    /// resolved id, not the one the producer supplied.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn condition(&self) -> &C {
        &self.condition
    }

    pub fn payload(&self) -> &Arc<P> {
        &self.payload
    }

    pub fn into_payload(self) -> Arc<P> {
        self.payload
    }

    pub(crate) fn set_frame_id(&mut self, frame_id: FrameId) {
        self.frame_id = frame_id;
    }
}

impl<C: Clone, P: ?Sized> Clone for PartialResult<C, P> {
    fn clone(&self) -> Self {
        Self {
            frame_id: self.frame_id,
            condition: self.condition.clone(),
            payload: Arc::clone(&self.payload),
        }
    }
}

impl<C: fmt::Debug, P: ?Sized> fmt::Debug for PartialResult<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialResult")
            .field("frame_id", &self.frame_id)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

/// A completed bundle returned by `dequeue_one()`.
///
/// Results are in arrival order. Ownership moves entirely to the caller.
pub struct ReadyParams<C, P: ?Sized> {
    pub frame_id: FrameId,
    pub results: Vec<PartialResult<C, P>>,
}

impl<C, P: ?Sized> ReadyParams<C, P> {
    /// Payloads in arrival order
    pub fn payloads(&self) -> impl Iterator<Item = &Arc<P>> + '_ {
        self.results.iter().map(PartialResult::payload)
    }

    /// Condition tags in arrival order
    pub fn conditions(&self) -> impl Iterator<Item = &C> + '_ {
        self.results.iter().map(PartialResult::condition)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<C: fmt::Debug, P: ?Sized> fmt::Debug for ReadyParams<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyParams")
            .field("frame_id", &self.frame_id)
            .field("results", &self.results)
            .finish()
    }
}
