// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Consumer side: where completed bundles go

use crate::result::ReadyParams;

/// Receives completed bundles from [`crate::ParamsAssembler::drain_into`].
///
/// Called without the assembler lock held, so implementations may block on
/// hardware or I/O.
pub trait ParamsSink<C, P: ?Sized> {
    type Error;

    fn apply(&mut self, params: ReadyParams<C, P>) -> Result<(), Self::Error>;
}

/// Collects bundles in memory
impl<C, P: ?Sized> ParamsSink<C, P> for Vec<ReadyParams<C, P>> {
    type Error = std::convert::Infallible;

    fn apply(&mut self, params: ReadyParams<C, P>) -> Result<(), Self::Error> {
        self.push(params);
        Ok(())
    }
}
