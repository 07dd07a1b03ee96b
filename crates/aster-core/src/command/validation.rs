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

//! Walks a recorded stream and checks that every command fits the state the
//! commands before it leave behind.
//!
//! Bound resources are checked when they are bound and again by every draw
//! or dispatch that uses them, since a transition in between can take away
//! the usage the binding needs.

use super::allocator::CommandStream;
use super::record::{Command, TextureCopyRegion};
use super::ResourceReferences;
use crate::binding::{BindGroup, BindingResource, RequiredUsage};
use crate::error::CommandBufferError;
use crate::object::{GpuObject, ObjectId};
use crate::resource::{Buffer, BufferUsage, Texture, TextureUsage};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Draw {
    Arrays,
    Indexed,
}

#[derive(Debug, Default)]
struct ValidationState {
    buffer_usages: HashMap<ObjectId, BufferUsage>,
    texture_usages: HashMap<ObjectId, TextureUsage>,
    compute_pipeline_bound: Option<bool>,
    bind_groups: BTreeMap<u32, ObjectId>,
    index_buffer: Option<ObjectId>,
    vertex_buffers: BTreeMap<u32, ObjectId>,
}

impl ValidationState {
    fn buffer_has_usage(&self, buffer: &Buffer, usage: BufferUsage) -> bool {
        let transitioned = self
            .buffer_usages
            .get(&buffer.id())
            .is_some_and(|current| current.contains(usage));
        transitioned || buffer.has_frozen_usage(usage)
    }

    fn texture_has_usage(&self, texture: &Texture, usage: TextureUsage) -> bool {
        let transitioned = self
            .texture_usages
            .get(&texture.id())
            .is_some_and(|current| current.contains(usage));
        transitioned || texture.has_frozen_usage(usage)
    }

    fn require_buffer(
        &self,
        buffer: &Buffer,
        usage: BufferUsage,
    ) -> Result<(), CommandBufferError> {
        if self.buffer_has_usage(buffer, usage) {
            Ok(())
        } else {
            Err(CommandBufferError::MissingBufferUsage {
                buffer: buffer.id(),
                required: usage,
            })
        }
    }

    fn require_texture(
        &self,
        texture: &Texture,
        usage: TextureUsage,
    ) -> Result<(), CommandBufferError> {
        if self.texture_has_usage(texture, usage) {
            Ok(())
        } else {
            Err(CommandBufferError::MissingTextureUsage {
                texture: texture.id(),
                required: usage,
            })
        }
    }

    fn require_bind_group(&self, group: &BindGroup) -> Result<(), CommandBufferError> {
        for (ty, resource) in group.bindings() {
            match (ty.required_usage(), resource) {
                (RequiredUsage::Buffer(usage), BindingResource::Buffer(buffer)) => {
                    self.require_buffer(buffer, usage)?;
                }
                (RequiredUsage::Texture(usage), BindingResource::Texture(texture)) => {
                    self.require_texture(texture, usage)?;
                }
                // Bind group creation rejects mismatched resources.
                _ => {}
            }
        }
        Ok(())
    }

    /// Re-checks everything bound for a draw or dispatch.
    fn require_bound_resources(
        &self,
        references: &ResourceReferences,
        draw: Option<Draw>,
    ) -> Result<(), CommandBufferError> {
        for group in self.bind_groups.values() {
            let group = references
                .bind_group(*group)
                .ok_or(CommandBufferError::ResourceDestroyed(*group))?;
            self.require_bind_group(group)?;
        }

        let Some(draw) = draw else {
            return Ok(());
        };
        for buffer in self.vertex_buffers.values() {
            self.require_buffer(&*references.buffer(*buffer)?, BufferUsage::VERTEX)?;
        }
        if draw == Draw::Indexed {
            let buffer = self.index_buffer.ok_or(CommandBufferError::MissingIndexBuffer)?;
            self.require_buffer(&*references.buffer(buffer)?, BufferUsage::INDEX)?;
        }
        Ok(())
    }

    fn apply(
        &mut self,
        command: &Command,
        references: &ResourceReferences,
    ) -> Result<(), CommandBufferError> {
        match command {
            Command::CopyBufferToTexture {
                buffer,
                texture,
                region,
            } => {
                let buffer = references.buffer(*buffer)?;
                let texture = references.texture(*texture)?;
                self.require_buffer(&buffer, BufferUsage::TRANSFER_SRC)?;
                self.require_texture(&texture, TextureUsage::TRANSFER_DST)?;
                validate_copy_region(&buffer, &texture, region)?;
            }
            Command::Dispatch { .. } => {
                match self.compute_pipeline_bound {
                    None => return Err(CommandBufferError::NoPipelineBound),
                    Some(false) => return Err(CommandBufferError::ComputePipelineRequired),
                    Some(true) => {}
                }
                self.require_bound_resources(references, None)?;
            }
            Command::DrawArrays { .. } | Command::DrawElements { .. } => {
                match self.compute_pipeline_bound {
                    None => return Err(CommandBufferError::NoPipelineBound),
                    Some(true) => return Err(CommandBufferError::GraphicsPipelineRequired),
                    Some(false) => {}
                }
                let draw = if matches!(command, Command::DrawElements { .. }) {
                    Draw::Indexed
                } else {
                    Draw::Arrays
                };
                self.require_bound_resources(references, Some(draw))?;
            }
            Command::SetPushConstants { .. } => {}
            Command::SetPipeline { pipeline } => {
                let pipeline = references
                    .pipeline(*pipeline)
                    .ok_or(CommandBufferError::ResourceDestroyed(*pipeline))?;
                self.compute_pipeline_bound = Some(pipeline.is_compute());
            }
            Command::SetBindGroup { index, group } => {
                let bound = references
                    .bind_group(*group)
                    .ok_or(CommandBufferError::ResourceDestroyed(*group))?;
                self.require_bind_group(bound)?;
                self.bind_groups.insert(*index, *group);
            }
            Command::SetIndexBuffer { buffer, .. } => {
                self.require_buffer(&*references.buffer(*buffer)?, BufferUsage::INDEX)?;
                self.index_buffer = Some(*buffer);
            }
            Command::SetVertexBuffers {
                start_slot,
                buffers,
            } => {
                for (slot, binding) in (*start_slot..).zip(buffers) {
                    let buffer = references.buffer(binding.buffer)?;
                    self.require_buffer(&buffer, BufferUsage::VERTEX)?;
                    self.vertex_buffers.insert(slot, binding.buffer);
                }
            }
            Command::TransitionBufferUsage { buffer, usage } => {
                references.buffer(*buffer)?;
                self.buffer_usages.insert(*buffer, *usage);
            }
            Command::TransitionTextureUsage { texture, usage } => {
                references.texture(*texture)?;
                self.texture_usages.insert(*texture, *usage);
            }
        }
        Ok(())
    }
}

fn validate_copy_region(
    buffer: &Buffer,
    texture: &Texture,
    region: &TextureCopyRegion,
) -> Result<(), CommandBufferError> {
    if region.level >= texture.mip_levels() {
        return Err(CommandBufferError::CopyMipLevelOutOfRange {
            texture: texture.id(),
            level: region.level,
            mip_levels: texture.mip_levels(),
        });
    }

    let level = texture.extent().mip_level_size(region.level);
    let fits = |origin: u32, size: u32, limit: u32| {
        u64::from(origin) + u64::from(size) <= u64::from(limit)
    };
    if !fits(region.x, region.width, level.width)
        || !fits(region.y, region.height, level.height)
        || !fits(region.z, region.depth, level.depth)
    {
        return Err(CommandBufferError::CopyRegionOutOfBounds(texture.id()));
    }

    let required = u64::from(region.width)
        * u64::from(region.height)
        * u64::from(region.depth)
        * u64::from(texture.format().bytes_per_texel());
    if required > u64::from(buffer.size()) {
        return Err(CommandBufferError::CopyBufferTooSmall {
            buffer: buffer.id(),
            required,
            size: buffer.size(),
        });
    }
    Ok(())
}

/// Checks every command of `stream` in recording order.
pub(crate) fn validate_commands(
    stream: &CommandStream,
    references: &ResourceReferences,
) -> Result<(), CommandBufferError> {
    let mut state = ValidationState::default();
    for command in stream.commands() {
        state.apply(&command?, references)?;
    }
    Ok(())
}
