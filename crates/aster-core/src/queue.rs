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

//! Submission of finished command buffers to the backend.

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{CommandBufferError, DeviceError};
use crate::object::{GpuObject, GpuRef};
use std::collections::HashSet;

/// Hands command buffers to the device's backend.
#[derive(Debug, Clone)]
pub struct Queue {
    device: Device,
}

impl Queue {
    pub(crate) fn new(device: Device) -> Self {
        Self { device }
    }

    /// The device the queue belongs to.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Executes `command_buffers` in order.
    ///
    /// Each command buffer can only be submitted once, so a command buffer
    /// that was already submitted or appears twice in `command_buffers` is
    /// rejected. When the device is configured with `validate_on_submit`,
    /// every command buffer is also re-validated. All of these checks run
    /// before any command buffer executes, so their failures leave every
    /// command buffer unexecuted.
    pub fn submit(&self, command_buffers: &[GpuRef<CommandBuffer>]) -> Result<(), DeviceError> {
        let mut seen = HashSet::with_capacity(command_buffers.len());
        for command_buffer in command_buffers {
            if command_buffer.is_acquired() || !seen.insert(command_buffer.id()) {
                return Err(self
                    .device
                    .report(CommandBufferError::CommandsAlreadyAcquired)
                    .into());
            }
        }

        if self.device.config().validate_on_submit {
            for command_buffer in command_buffers {
                command_buffer
                    .validate_resource_usages_immediate()
                    .map_err(|e| self.device.report(e))?;
            }
        }

        let backend = self.device.backend();
        for command_buffer in command_buffers {
            let stream = command_buffer.acquire_commands()?;
            log::trace!(
                "Executing command buffer {} ({} records)",
                command_buffer.id(),
                stream.record_count()
            );
            backend
                .execute(command_buffer, &stream)
                .map_err(|e| self.device.report(e))?;
        }

        log::info!("Submitted {} command buffers", command_buffers.len());
        Ok(())
    }
}
