// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Single-shot builder finalization.
//!
//! Every builder is finalized by [`Builder::finish`], which takes the builder
//! by value so a finished builder cannot be used again. Holders that must keep
//! a builder behind a long-lived handle, such as a command server replaying
//! calls from another process, wrap it in a [`BuilderSlot`] which enforces the
//! same rule at runtime.

use crate::device::Device;
use crate::error::DeviceError;

/// A mutable description of an object, consumed exactly once.
pub trait Builder: Sized {
    /// The object produced by the builder.
    type Output;
    /// The error type of the builder's operations.
    type Error: Clone + Into<DeviceError>;

    /// The device the builder reports errors to.
    fn device(&self) -> &Device;

    /// Validates the accumulated state and produces the object.
    fn finish(self) -> Result<Self::Output, Self::Error>;

    /// The error returned when a builder is finalized a second time.
    fn consumed_error() -> Self::Error;
}

/// The state shared by every builder: its device and whether an earlier error
/// made it unusable.
#[derive(Debug, Clone)]
pub(crate) struct BuilderBase {
    device: Device,
    poisoned: bool,
}

impl BuilderBase {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            device,
            poisoned: false,
        }
    }

    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn into_device(self) -> Device {
        self.device
    }

    /// Returns `poisoned` if an earlier operation failed. Nothing is reported:
    /// the original error already was.
    pub(crate) fn check<E>(&self, poisoned: E) -> Result<(), E> {
        if self.poisoned {
            Err(poisoned)
        } else {
            Ok(())
        }
    }

    /// Poisons the builder and reports `error` to the device.
    pub(crate) fn fail<E: Clone + Into<DeviceError>>(&mut self, error: E) -> E {
        self.poisoned = true;
        self.device.report(error)
    }
}

/// Holds a builder until its result is taken.
#[derive(Debug)]
pub struct BuilderSlot<B: Builder> {
    device: Device,
    builder: Option<B>,
}

impl<B: Builder> BuilderSlot<B> {
    /// Wraps a fresh builder.
    pub fn new(builder: B) -> Self {
        Self {
            device: builder.device().clone(),
            builder: Some(builder),
        }
    }

    /// Borrows the builder to record more state.
    pub fn get_mut(&mut self) -> Result<&mut B, B::Error> {
        match self.builder.as_mut() {
            Some(builder) => Ok(builder),
            None => Err(self.device.report(B::consumed_error())),
        }
    }

    /// Finalizes the builder. Every call after the first reports a usage error
    /// and produces nothing.
    pub fn get_result(&mut self) -> Result<B::Output, B::Error> {
        match self.builder.take() {
            Some(builder) => builder.finish(),
            None => Err(self.device.report(B::consumed_error())),
        }
    }

    /// Returns `true` once [`get_result`](Self::get_result) was called.
    pub fn was_consumed(&self) -> bool {
        self.builder.is_none()
    }
}
