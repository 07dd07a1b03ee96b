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

//! Defines the builder that records GPU work.

use super::allocator::{CommandAllocator, CommandStream};
use super::buffer::{CommandBuffer, CommandBufferDescriptor};
use super::record::{Command, TextureCopyRegion, VertexBufferSlot};
use super::{validation, ResourceReferences};
use crate::binding::BindGroup;
use crate::builder::{Builder, BuilderBase};
use crate::device::Device;
use crate::enums::IndexFormat;
use crate::error::CommandBufferError;
use crate::flags::ShaderStageFlags;
use crate::object::{GpuObject, GpuRef, ObjectId};
use crate::pipeline::Pipeline;
use crate::resource::{Buffer, BufferUsage, Texture, TextureUsage};
use crate::{MAX_BIND_GROUPS, MAX_PUSH_CONSTANTS, MAX_VERTEX_INPUTS};
use std::collections::BTreeMap;

/// Records draws, dispatches, copies, bindings and usage transitions.
///
/// Every recording method validates its arguments first. A failure is
/// reported to the device and poisons the builder: later calls, including
/// [`finish`](Builder::finish), return
/// [`CommandBufferError::BuilderPoisoned`].
#[derive(Debug)]
pub struct CommandBufferBuilder {
    base: BuilderBase,
    allocator: CommandAllocator,
    references: ResourceReferences,
    buffer_transitions: BTreeMap<ObjectId, BufferUsage>,
    texture_transitions: BTreeMap<ObjectId, TextureUsage>,
}

impl CommandBufferBuilder {
    pub(crate) fn new(device: Device) -> Self {
        let limit = device.config().max_command_stream_bytes;
        Self {
            base: BuilderBase::new(device),
            allocator: CommandAllocator::new(limit),
            references: ResourceReferences::default(),
            buffer_transitions: BTreeMap::new(),
            texture_transitions: BTreeMap::new(),
        }
    }

    /// Copies `buffer` into `region` of `texture`.
    ///
    /// The region is checked against the texture when the builder finishes.
    pub fn copy_buffer_to_texture(
        &mut self,
        buffer: &GpuRef<Buffer>,
        texture: &GpuRef<Texture>,
        region: TextureCopyRegion,
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        let buffer = self.references.add_buffer(buffer);
        let texture = self.references.add_texture(texture);
        self.record(Command::CopyBufferToTexture {
            buffer,
            texture,
            region,
        })
    }

    /// Runs the bound compute pipeline over `x * y * z` workgroups.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), CommandBufferError> {
        self.check()?;
        self.record(Command::Dispatch { x, y, z })
    }

    /// Draws non-indexed primitives with the bound graphics pipeline.
    pub fn draw_arrays(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        self.record(Command::DrawArrays {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        })
    }

    /// Draws indexed primitives with the bound graphics pipeline and index buffer.
    pub fn draw_elements(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        first_instance: u32,
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        self.record(Command::DrawElements {
            index_count,
            instance_count,
            first_index,
            first_instance,
        })
    }

    /// Writes `data` into push-constant slots `[offset, offset + data.len())`
    /// of every stage in `stages`.
    pub fn set_push_constants(
        &mut self,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u32],
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        if stages.is_empty() {
            return Err(self.fail(CommandBufferError::EmptyPushConstantStages));
        }
        if u64::from(offset) + data.len() as u64 > u64::from(MAX_PUSH_CONSTANTS) {
            return Err(self.fail(CommandBufferError::PushConstantsOutOfRange {
                offset,
                count: data.len(),
            }));
        }
        self.record(Command::SetPushConstants {
            stages,
            offset,
            data: data.to_vec(),
        })
    }

    /// Binds `pipeline` for the following draws or dispatches.
    pub fn set_pipeline(&mut self, pipeline: &GpuRef<Pipeline>) -> Result<(), CommandBufferError> {
        self.check()?;
        let pipeline = self.references.add_pipeline(pipeline);
        self.record(Command::SetPipeline { pipeline })
    }

    /// Binds `group` at slot `index`.
    pub fn set_bind_group(
        &mut self,
        index: u32,
        group: &GpuRef<BindGroup>,
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        if index >= MAX_BIND_GROUPS {
            return Err(self.fail(CommandBufferError::BindGroupIndexOutOfRange(index)));
        }
        let group = self.references.add_bind_group(group);
        self.record(Command::SetBindGroup { index, group })
    }

    /// Binds `buffer` as the index buffer.
    pub fn set_index_buffer(
        &mut self,
        buffer: &GpuRef<Buffer>,
        offset: u32,
        format: IndexFormat,
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        let buffer = self.references.add_buffer(buffer);
        self.record(Command::SetIndexBuffer {
            buffer,
            offset,
            format,
        })
    }

    /// Binds `buffers[i]` at `offsets[i]` to vertex slot `start_slot + i`.
    pub fn set_vertex_buffers(
        &mut self,
        start_slot: u32,
        buffers: &[GpuRef<Buffer>],
        offsets: &[u32],
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        if buffers.len() != offsets.len() {
            return Err(self.fail(CommandBufferError::VertexBufferCountMismatch {
                buffers: buffers.len(),
                offsets: offsets.len(),
            }));
        }
        if u64::from(start_slot) + buffers.len() as u64 > u64::from(MAX_VERTEX_INPUTS) {
            return Err(self.fail(CommandBufferError::VertexSlotsOutOfRange {
                start_slot,
                count: buffers.len(),
            }));
        }

        let buffers = buffers
            .iter()
            .zip(offsets)
            .map(|(buffer, &offset)| VertexBufferSlot {
                buffer: self.references.add_buffer(buffer),
                offset,
            })
            .collect();
        self.record(Command::SetVertexBuffers {
            start_slot,
            buffers,
        })
    }

    /// Moves `buffer` to `usage` for the commands that follow.
    ///
    /// A buffer transitioned several times is tracked once, with the last
    /// usage.
    pub fn transition_buffer_usage(
        &mut self,
        buffer: &GpuRef<Buffer>,
        usage: BufferUsage,
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        if !buffer.is_transition_possible(usage) {
            return Err(self.fail(CommandBufferError::BufferTransitionNotPossible {
                buffer: buffer.id(),
                usage,
            }));
        }
        let buffer = self.references.add_buffer(buffer);
        self.buffer_transitions.insert(buffer, usage);
        self.record(Command::TransitionBufferUsage { buffer, usage })
    }

    /// Moves `texture` to `usage` for the commands that follow.
    ///
    /// A texture transitioned several times is tracked once, with the last
    /// usage.
    pub fn transition_texture_usage(
        &mut self,
        texture: &GpuRef<Texture>,
        usage: TextureUsage,
    ) -> Result<(), CommandBufferError> {
        self.check()?;
        if !texture.is_transition_possible(usage) {
            return Err(self.fail(CommandBufferError::TextureTransitionNotPossible {
                texture: texture.id(),
                usage,
            }));
        }
        let texture = self.references.add_texture(texture);
        self.texture_transitions.insert(texture, usage);
        self.record(Command::TransitionTextureUsage { texture, usage })
    }

    /// The number of records written so far.
    pub fn record_count(&self) -> usize {
        self.allocator.record_count()
    }

    /// Hands the recorded stream over without validating it or building a
    /// command buffer.
    pub fn acquire_commands(self) -> Result<CommandStream, CommandBufferError> {
        self.check()?;
        Ok(self.allocator.acquire())
    }

    fn check(&self) -> Result<(), CommandBufferError> {
        self.base.check(CommandBufferError::BuilderPoisoned)
    }

    fn fail(&mut self, error: CommandBufferError) -> CommandBufferError {
        self.base.fail(error)
    }

    fn record(&mut self, command: Command) -> Result<(), CommandBufferError> {
        log::trace!("Recording {command:?}");
        command
            .encode(&mut self.allocator)
            .map_err(|err| self.base.fail(CommandBufferError::from(err)))
    }
}

impl Builder for CommandBufferBuilder {
    type Output = GpuRef<CommandBuffer>;
    type Error = CommandBufferError;

    fn device(&self) -> &Device {
        self.base.device()
    }

    fn finish(self) -> Result<GpuRef<CommandBuffer>, CommandBufferError> {
        let Self {
            mut base,
            allocator,
            references,
            buffer_transitions,
            texture_transitions,
        } = self;
        base.check(CommandBufferError::BuilderPoisoned)?;

        let stream = allocator.acquire();
        if let Err(err) = validation::validate_commands(&stream, &references) {
            return Err(base.fail(err));
        }

        base.into_device()
            .create_command_buffer(CommandBufferDescriptor {
                stream,
                references,
                buffer_transitions,
                texture_transitions,
            })
    }

    fn consumed_error() -> CommandBufferError {
        CommandBufferError::BuilderConsumed
    }
}
