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

//! Defines the immutable result of a command recording session.

use super::allocator::CommandStream;
use super::ResourceReferences;
use crate::binding::BindGroup;
use crate::device::Device;
use crate::error::CommandBufferError;
use crate::object::{GpuObject, GpuRef, ObjectId, ObjectKind, TrackedObject};
use crate::pipeline::Pipeline;
use crate::resource::{Buffer, BufferUsage, Texture, TextureUsage};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Everything a [`CommandBuffer`] is constructed from.
#[derive(Debug)]
pub(crate) struct CommandBufferDescriptor {
    pub(crate) stream: CommandStream,
    pub(crate) references: ResourceReferences,
    pub(crate) buffer_transitions: BTreeMap<ObjectId, BufferUsage>,
    pub(crate) texture_transitions: BTreeMap<ObjectId, TextureUsage>,
}

/// An immutable, validated recording of GPU work.
///
/// The command buffer observes the buffers and textures it uses without
/// keeping them alive. Its stream can be acquired exactly once, usually by
/// [`Queue::submit`](crate::Queue::submit).
#[derive(Debug)]
pub struct CommandBuffer {
    tracked: TrackedObject,
    device: Device,
    stream: Mutex<Option<CommandStream>>,
    references: ResourceReferences,
    buffer_transitions: BTreeMap<ObjectId, BufferUsage>,
    texture_transitions: BTreeMap<ObjectId, TextureUsage>,
}

impl GpuObject for CommandBuffer {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl CommandBuffer {
    pub(crate) fn new(
        device: &Device,
        descriptor: CommandBufferDescriptor,
    ) -> Result<Self, CommandBufferError> {
        let CommandBufferDescriptor {
            stream,
            references,
            buffer_transitions,
            texture_transitions,
        } = descriptor;

        let command_buffer = Self {
            tracked: device.register(ObjectKind::CommandBuffer),
            device: device.clone(),
            stream: Mutex::new(Some(stream)),
            references,
            buffer_transitions,
            texture_transitions,
        };
        command_buffer.validate_resource_usages_immediate()?;
        Ok(command_buffer)
    }

    /// Checks that every transitioned buffer and texture is still alive and
    /// can still change usage.
    pub fn validate_resource_usages_immediate(&self) -> Result<(), CommandBufferError> {
        for &id in self.buffer_transitions.keys() {
            let buffer = self.references.buffer(id)?;
            if buffer.is_frozen() {
                return Err(CommandBufferError::FrozenResourceTransitioned(id));
            }
        }
        for &id in self.texture_transitions.keys() {
            let texture = self.references.texture(id)?;
            if texture.is_frozen() {
                return Err(CommandBufferError::FrozenResourceTransitioned(id));
            }
        }
        Ok(())
    }

    /// Takes the recorded stream. Only the first call succeeds.
    pub fn acquire_commands(&self) -> Result<CommandStream, CommandBufferError> {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                self.device
                    .report(CommandBufferError::CommandsAlreadyAcquired)
            })
    }

    /// Returns `true` once the stream was acquired.
    pub fn is_acquired(&self) -> bool {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// The final usage recorded for buffer `id`, if it was transitioned.
    pub fn transitioned_buffer_usage(&self, id: ObjectId) -> Option<BufferUsage> {
        self.buffer_transitions.get(&id).copied()
    }

    /// The final usage recorded for texture `id`, if it was transitioned.
    pub fn transitioned_texture_usage(&self, id: ObjectId) -> Option<TextureUsage> {
        self.texture_transitions.get(&id).copied()
    }

    /// Every transitioned buffer with its final usage, in id order.
    pub fn transitioned_buffers(&self) -> impl Iterator<Item = (ObjectId, BufferUsage)> + '_ {
        self.buffer_transitions.iter().map(|(id, usage)| (*id, *usage))
    }

    /// Every transitioned texture with its final usage, in id order.
    pub fn transitioned_textures(&self) -> impl Iterator<Item = (ObjectId, TextureUsage)> + '_ {
        self.texture_transitions.iter().map(|(id, usage)| (*id, *usage))
    }

    /// The number of distinct transitioned buffers.
    pub fn transitioned_buffer_count(&self) -> usize {
        self.buffer_transitions.len()
    }

    /// The number of distinct transitioned textures.
    pub fn transitioned_texture_count(&self) -> usize {
        self.texture_transitions.len()
    }

    /// Resolves a buffer used by the stream, if it is still alive.
    pub fn buffer(&self, id: ObjectId) -> Option<GpuRef<Buffer>> {
        self.references.buffer(id).ok()
    }

    /// Resolves a texture used by the stream, if it is still alive.
    pub fn texture(&self, id: ObjectId) -> Option<GpuRef<Texture>> {
        self.references.texture(id).ok()
    }

    /// Resolves a pipeline bound by the stream.
    pub fn pipeline(&self, id: ObjectId) -> Option<&GpuRef<Pipeline>> {
        self.references.pipeline(id)
    }

    /// Resolves a bind group bound by the stream.
    pub fn bind_group(&self, id: ObjectId) -> Option<&GpuRef<BindGroup>> {
        self.references.bind_group(id)
    }
}
