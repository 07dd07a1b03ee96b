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

//! Command recording, validation and replay.
//!
//! A [`CommandBufferBuilder`] writes commands into a [`CommandAllocator`].
//! Finishing the builder validates the recorded stream and produces an
//! immutable [`CommandBuffer`], whose stream a backend later acquires and
//! replays.

pub mod allocator;
pub mod buffer;
pub mod builder;
pub mod record;
mod validation;

pub use self::allocator::{CommandAllocator, CommandStream, Commands, RawRecord, RecordIter};
pub use self::buffer::CommandBuffer;
pub use self::builder::CommandBufferBuilder;
pub use self::record::{
    Command, CommandTag, CopyBufferToTextureCmd, DispatchCmd, DrawArraysCmd, DrawElementsCmd,
    SetBindGroupCmd, SetIndexBufferCmd, SetPipelineCmd, SetPushConstantsCmd, SetVertexBuffersCmd,
    TextureCopyRegion, TransitionBufferUsageCmd, TransitionTextureUsageCmd, VertexBufferBinding,
    VertexBufferSlot,
};

use crate::binding::BindGroup;
use crate::error::CommandBufferError;
use crate::object::{GpuObject, GpuRef, ObjectId, WeakGpuRef};
use crate::pipeline::Pipeline;
use crate::resource::{Buffer, Texture};
use std::collections::BTreeMap;

/// The objects a command stream refers to by id.
///
/// Buffers and textures are only observed: whoever created them keeps them
/// alive. Pipelines and bind groups are kept alive by the stream.
#[derive(Debug, Default)]
pub(crate) struct ResourceReferences {
    buffers: BTreeMap<ObjectId, WeakGpuRef<Buffer>>,
    textures: BTreeMap<ObjectId, WeakGpuRef<Texture>>,
    pipelines: BTreeMap<ObjectId, GpuRef<Pipeline>>,
    bind_groups: BTreeMap<ObjectId, GpuRef<BindGroup>>,
}

impl ResourceReferences {
    pub(crate) fn add_buffer(&mut self, buffer: &GpuRef<Buffer>) -> ObjectId {
        let id = buffer.id();
        self.buffers.entry(id).or_insert_with(|| buffer.downgrade());
        id
    }

    pub(crate) fn add_texture(&mut self, texture: &GpuRef<Texture>) -> ObjectId {
        let id = texture.id();
        self.textures.entry(id).or_insert_with(|| texture.downgrade());
        id
    }

    pub(crate) fn add_pipeline(&mut self, pipeline: &GpuRef<Pipeline>) -> ObjectId {
        let id = pipeline.id();
        self.pipelines.entry(id).or_insert_with(|| pipeline.clone());
        id
    }

    pub(crate) fn add_bind_group(&mut self, group: &GpuRef<BindGroup>) -> ObjectId {
        let id = group.id();
        self.bind_groups.entry(id).or_insert_with(|| group.clone());
        id
    }

    /// Resolves a buffer that must still be alive.
    pub(crate) fn buffer(&self, id: ObjectId) -> Result<GpuRef<Buffer>, CommandBufferError> {
        self.buffers
            .get(&id)
            .and_then(WeakGpuRef::upgrade)
            .ok_or(CommandBufferError::ResourceDestroyed(id))
    }

    /// Resolves a texture that must still be alive.
    pub(crate) fn texture(&self, id: ObjectId) -> Result<GpuRef<Texture>, CommandBufferError> {
        self.textures
            .get(&id)
            .and_then(WeakGpuRef::upgrade)
            .ok_or(CommandBufferError::ResourceDestroyed(id))
    }

    pub(crate) fn pipeline(&self, id: ObjectId) -> Option<&GpuRef<Pipeline>> {
        self.pipelines.get(&id)
    }

    pub(crate) fn bind_group(&self, id: ObjectId) -> Option<&GpuRef<BindGroup>> {
        self.bind_groups.get(&id)
    }
}
