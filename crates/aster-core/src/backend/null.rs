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

//! A backend that replays work in memory.

use super::Backend;
use crate::command::{Command, CommandBuffer, CommandStream};
use crate::enums::BackendType;
use crate::error::BackendError;
use crate::object::{GpuObject, ObjectId};
use crate::resource::Buffer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct NullState {
    buffers: HashMap<ObjectId, Vec<u32>>,
    submissions: Vec<Vec<Command>>,
}

/// Validates and replays work without a driver.
///
/// Usage transitions are applied to the resources, buffer writes are kept in
/// memory and every executed stream is decoded and kept for inspection.
/// Clones share their state, so a test can keep a clone of the backend it
/// handed to a device.
#[derive(Debug, Clone, Default)]
pub struct NullBackend {
    state: Arc<Mutex<NullState>>,
}

impl NullBackend {
    /// Creates a backend with no recorded state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The words written to buffer `id` so far.
    pub fn buffer_contents(&self, id: ObjectId) -> Option<Vec<u32>> {
        self.state().buffers.get(&id).cloned()
    }

    /// The number of streams executed so far.
    pub fn submission_count(&self) -> usize {
        self.state().submissions.len()
    }

    /// The decoded commands of every executed stream, in execution order.
    pub fn executed_commands(&self) -> Vec<Vec<Command>> {
        self.state().submissions.clone()
    }

    fn state(&self) -> MutexGuard<'_, NullState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn execution_error(message: impl ToString) -> BackendError {
        BackendError::Execution {
            backend: BackendType::Null,
            message: message.to_string(),
        }
    }
}

impl Backend for NullBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Null
    }

    fn write_buffer(&self, buffer: &Buffer, start: u32, data: &[u32]) -> Result<(), BackendError> {
        let mut state = self.state();
        let words = state
            .buffers
            .entry(buffer.id())
            .or_insert_with(|| vec![0; (buffer.size() as usize).div_ceil(4)]);

        let start = start as usize;
        let target = words
            .get_mut(start..start + data.len())
            .ok_or(BackendError::ResourceUnavailable(buffer.id()))?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn execute(
        &self,
        command_buffer: &CommandBuffer,
        stream: &CommandStream,
    ) -> Result<(), BackendError> {
        let executed = stream
            .commands()
            .collect::<Result<Vec<_>, _>>()
            .map_err(Self::execution_error)?;

        // Every transition is checked before any is applied, so a failing
        // stream leaves the resources as they were.
        for command in &executed {
            match command {
                Command::TransitionBufferUsage { buffer, usage } => {
                    let resolved = command_buffer
                        .buffer(*buffer)
                        .ok_or(BackendError::ResourceUnavailable(*buffer))?;
                    if !resolved.is_transition_possible(*usage) {
                        return Err(Self::execution_error(format!(
                            "buffer {buffer} cannot transition to {usage:?}"
                        )));
                    }
                }
                Command::TransitionTextureUsage { texture, usage } => {
                    let resolved = command_buffer
                        .texture(*texture)
                        .ok_or(BackendError::ResourceUnavailable(*texture))?;
                    if !resolved.is_transition_possible(*usage) {
                        return Err(Self::execution_error(format!(
                            "texture {texture} cannot transition to {usage:?}"
                        )));
                    }
                }
                _ => {}
            }
        }

        for command in &executed {
            match command {
                Command::TransitionBufferUsage { buffer, usage } => command_buffer
                    .buffer(*buffer)
                    .ok_or(BackendError::ResourceUnavailable(*buffer))?
                    .transition_usage(*usage)
                    .map_err(Self::execution_error)?,
                Command::TransitionTextureUsage { texture, usage } => command_buffer
                    .texture(*texture)
                    .ok_or(BackendError::ResourceUnavailable(*texture))?
                    .transition_usage(*usage)
                    .map_err(Self::execution_error)?,
                _ => {}
            }
        }

        log::debug!(
            "Null backend executed {} commands from command buffer {}",
            executed.len(),
            command_buffer.id()
        );
        self.state().submissions.push(executed);
        Ok(())
    }
}
