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

//! The records stored in a command stream and their owned, decoded form.
//!
//! Each command is written as one fixed-size record. Commands that carry an
//! array (push-constant data, vertex buffer bindings) write their fixed part
//! first and the array as a following [`CommandTag::Data`] record. Objects are
//! referenced by [`ObjectId`] and resolved through the command buffer.

use super::allocator::{CommandAllocator, RawRecord, RecordIter};
use crate::enums::IndexFormat;
use crate::error::{AllocError, CommandBufferError};
use crate::flags::ShaderStageFlags;
use crate::object::ObjectId;
use crate::resource::{BufferUsage, TextureUsage};
use bytemuck::{Pod, Zeroable};

/// Identifies the layout of a record.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    /// A [`CopyBufferToTextureCmd`].
    CopyBufferToTexture = 1,
    /// A [`DispatchCmd`].
    Dispatch,
    /// A [`DrawArraysCmd`].
    DrawArrays,
    /// A [`DrawElementsCmd`].
    DrawElements,
    /// A [`SetPushConstantsCmd`] followed by its `u32` data.
    SetPushConstants,
    /// A [`SetPipelineCmd`].
    SetPipeline,
    /// A [`SetBindGroupCmd`].
    SetBindGroup,
    /// A [`SetIndexBufferCmd`].
    SetIndexBuffer,
    /// A [`SetVertexBuffersCmd`] followed by its [`VertexBufferBinding`]s.
    SetVertexBuffers,
    /// A [`TransitionBufferUsageCmd`].
    TransitionBufferUsage,
    /// A [`TransitionTextureUsageCmd`].
    TransitionTextureUsage,
    /// The array payload of the preceding record.
    Data,
}

impl CommandTag {
    const ALL: [CommandTag; 12] = [
        CommandTag::CopyBufferToTexture,
        CommandTag::Dispatch,
        CommandTag::DrawArrays,
        CommandTag::DrawElements,
        CommandTag::SetPushConstants,
        CommandTag::SetPipeline,
        CommandTag::SetBindGroup,
        CommandTag::SetIndexBuffer,
        CommandTag::SetVertexBuffers,
        CommandTag::TransitionBufferUsage,
        CommandTag::TransitionTextureUsage,
        CommandTag::Data,
    ];

    pub(crate) fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| *tag as u16 == raw)
    }
}

/// The record of [`Command::CopyBufferToTexture`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CopyBufferToTextureCmd {
    /// The id of the buffer.
    pub buffer: u64,
    /// The id of the texture.
    pub texture: u64,
    /// X coordinate.
    pub x: u32,
    /// Y coordinate.
    pub y: u32,
    /// Z coordinate.
    pub z: u32,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels.
    pub depth: u32,
    /// Mip level.
    pub level: u32,
    /// Always zero.
    pub _padding: u32,
}

/// The record of [`Command::Dispatch`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DispatchCmd {
    /// Workgroups on the x axis.
    pub x: u32,
    /// Workgroups on the y axis.
    pub y: u32,
    /// Workgroups on the z axis.
    pub z: u32,
    /// Always zero.
    pub _padding: u32,
}

/// The record of [`Command::DrawArrays`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawArraysCmd {
    /// Vertex count.
    pub vertex_count: u32,
    /// Instance count.
    pub instance_count: u32,
    /// First vertex.
    pub first_vertex: u32,
    /// First instance.
    pub first_instance: u32,
}

/// The record of [`Command::DrawElements`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawElementsCmd {
    /// Index count.
    pub index_count: u32,
    /// Instance count.
    pub instance_count: u32,
    /// First index.
    pub first_index: u32,
    /// First instance.
    pub first_instance: u32,
}

/// The fixed part of [`Command::SetPushConstants`]. `count` words of data follow.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SetPushConstantsCmd {
    /// Raw [`ShaderStageFlags`] bits.
    pub stages: u32,
    /// The first push-constant slot written.
    pub offset: u32,
    /// Number of elements in the following data record.
    pub count: u32,
    /// Always zero.
    pub _padding: u32,
}

/// The record of [`Command::SetPipeline`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SetPipelineCmd {
    /// The id of the pipeline.
    pub pipeline: u64,
}

/// The record of [`Command::SetBindGroup`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SetBindGroupCmd {
    /// The id of the bind group.
    pub group: u64,
    /// The bind group slot.
    pub index: u32,
    /// Always zero.
    pub _padding: u32,
}

/// The record of [`Command::SetIndexBuffer`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SetIndexBufferCmd {
    /// The id of the buffer.
    pub buffer: u64,
    /// The offset of the first index in bytes.
    pub offset: u32,
    /// Raw [`IndexFormat`] value.
    pub format: u32,
}

/// The fixed part of [`Command::SetVertexBuffers`]. `count` bindings follow.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SetVertexBuffersCmd {
    /// First vertex buffer slot.
    pub start_slot: u32,
    /// Number of elements in the following data record.
    pub count: u32,
}

/// One element of the data record of [`Command::SetVertexBuffers`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VertexBufferBinding {
    /// The id of the buffer.
    pub buffer: u64,
    /// The offset of the first vertex in bytes.
    pub offset: u32,
    /// Always zero.
    pub _padding: u32,
}

/// The record of [`Command::TransitionBufferUsage`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TransitionBufferUsageCmd {
    /// The id of the buffer.
    pub buffer: u64,
    /// Raw usage bits.
    pub usage: u32,
    /// Always zero.
    pub _padding: u32,
}

/// The record of [`Command::TransitionTextureUsage`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TransitionTextureUsageCmd {
    /// The id of the texture.
    pub texture: u64,
    /// Raw usage bits.
    pub usage: u32,
    /// Always zero.
    pub _padding: u32,
}

/// The texture region written by a buffer-to-texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureCopyRegion {
    /// Origin of the region on the x axis.
    pub x: u32,
    /// Origin of the region on the y axis.
    pub y: u32,
    /// Origin of the region on the z axis.
    pub z: u32,
    /// Width of the region in texels.
    pub width: u32,
    /// Height of the region in texels.
    pub height: u32,
    /// Depth of the region in texels.
    pub depth: u32,
    /// The mip level written.
    pub level: u32,
}

/// A vertex buffer bound to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferSlot {
    /// The bound buffer.
    pub buffer: ObjectId,
    /// The offset of the first element in bytes.
    pub offset: u32,
}

/// A decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Copies buffer data into a texture region.
    CopyBufferToTexture {
        /// The source buffer.
        buffer: ObjectId,
        /// The destination texture.
        texture: ObjectId,
        /// The destination region.
        region: TextureCopyRegion,
    },
    /// Runs the bound compute pipeline.
    Dispatch {
        /// Workgroups on the x axis.
        x: u32,
        /// Workgroups on the y axis.
        y: u32,
        /// Workgroups on the z axis.
        z: u32,
    },
    /// Draws non-indexed primitives with the bound graphics pipeline.
    DrawArrays {
        /// The number of vertices to draw.
        vertex_count: u32,
        /// The number of instances to draw.
        instance_count: u32,
        /// The first vertex.
        first_vertex: u32,
        /// The first instance.
        first_instance: u32,
    },
    /// Draws indexed primitives with the bound graphics pipeline.
    DrawElements {
        /// The number of indices to draw.
        index_count: u32,
        /// The number of instances to draw.
        instance_count: u32,
        /// The first index.
        first_index: u32,
        /// The first instance.
        first_instance: u32,
    },
    /// Updates push-constant slots `[offset, offset + data.len())` of `stages`.
    SetPushConstants {
        /// The stages whose push constants are updated.
        stages: ShaderStageFlags,
        /// The first slot written.
        offset: u32,
        /// One word per slot.
        data: Vec<u32>,
    },
    /// Binds a pipeline.
    SetPipeline {
        /// The bound pipeline.
        pipeline: ObjectId,
    },
    /// Binds a bind group at `index`.
    SetBindGroup {
        /// The bind group slot.
        index: u32,
        /// The bound group.
        group: ObjectId,
    },
    /// Binds the index buffer.
    SetIndexBuffer {
        /// The bound buffer.
        buffer: ObjectId,
        /// The offset of the first index in bytes.
        offset: u32,
        /// The format of the indices.
        format: IndexFormat,
    },
    /// Binds vertex buffers to consecutive slots starting at `start_slot`.
    SetVertexBuffers {
        /// The first slot bound.
        start_slot: u32,
        /// One binding per slot.
        buffers: Vec<VertexBufferSlot>,
    },
    /// Changes the usage of a buffer.
    TransitionBufferUsage {
        /// The transitioned buffer.
        buffer: ObjectId,
        /// The new usage.
        usage: BufferUsage,
    },
    /// Changes the usage of a texture.
    TransitionTextureUsage {
        /// The transitioned texture.
        texture: ObjectId,
        /// The new usage.
        usage: TextureUsage,
    },
}

impl Command {
    /// Appends the command's records to `allocator`.
    pub fn encode(&self, allocator: &mut CommandAllocator) -> Result<(), AllocError> {
        match self {
            Command::CopyBufferToTexture {
                buffer,
                texture,
                region,
            } => allocator.write(
                CommandTag::CopyBufferToTexture,
                &[CopyBufferToTextureCmd {
                    buffer: buffer.0,
                    texture: texture.0,
                    x: region.x,
                    y: region.y,
                    z: region.z,
                    width: region.width,
                    height: region.height,
                    depth: region.depth,
                    level: region.level,
                    _padding: 0,
                }],
            ),
            Command::Dispatch { x, y, z } => allocator.write(
                CommandTag::Dispatch,
                &[DispatchCmd {
                    x: *x,
                    y: *y,
                    z: *z,
                    _padding: 0,
                }],
            ),
            Command::DrawArrays {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => allocator.write(
                CommandTag::DrawArrays,
                &[DrawArraysCmd {
                    vertex_count: *vertex_count,
                    instance_count: *instance_count,
                    first_vertex: *first_vertex,
                    first_instance: *first_instance,
                }],
            ),
            Command::DrawElements {
                index_count,
                instance_count,
                first_index,
                first_instance,
            } => allocator.write(
                CommandTag::DrawElements,
                &[DrawElementsCmd {
                    index_count: *index_count,
                    instance_count: *instance_count,
                    first_index: *first_index,
                    first_instance: *first_instance,
                }],
            ),
            Command::SetPushConstants {
                stages,
                offset,
                data,
            } => {
                let count = u32::try_from(data.len()).map_err(|_| AllocError::RecordTooLarge {
                    count: data.len(),
                    element_size: std::mem::size_of::<u32>(),
                })?;
                allocator.write(
                    CommandTag::SetPushConstants,
                    &[SetPushConstantsCmd {
                        stages: stages.bits(),
                        offset: *offset,
                        count,
                        _padding: 0,
                    }],
                )?;
                allocator.write(CommandTag::Data, data.as_slice())
            }
            Command::SetPipeline { pipeline } => allocator.write(
                CommandTag::SetPipeline,
                &[SetPipelineCmd {
                    pipeline: pipeline.0,
                }],
            ),
            Command::SetBindGroup { index, group } => allocator.write(
                CommandTag::SetBindGroup,
                &[SetBindGroupCmd {
                    group: group.0,
                    index: *index,
                    _padding: 0,
                }],
            ),
            Command::SetIndexBuffer {
                buffer,
                offset,
                format,
            } => allocator.write(
                CommandTag::SetIndexBuffer,
                &[SetIndexBufferCmd {
                    buffer: buffer.0,
                    offset: *offset,
                    format: format.to_raw(),
                }],
            ),
            Command::SetVertexBuffers {
                start_slot,
                buffers,
            } => {
                let count =
                    u32::try_from(buffers.len()).map_err(|_| AllocError::RecordTooLarge {
                        count: buffers.len(),
                        element_size: std::mem::size_of::<VertexBufferBinding>(),
                    })?;
                allocator.write(
                    CommandTag::SetVertexBuffers,
                    &[SetVertexBuffersCmd {
                        start_slot: *start_slot,
                        count,
                    }],
                )?;
                let bindings = allocator
                    .allocate::<VertexBufferBinding>(CommandTag::Data, buffers.len())?;
                for (binding, slot) in bindings.iter_mut().zip(buffers) {
                    *binding = VertexBufferBinding {
                        buffer: slot.buffer.0,
                        offset: slot.offset,
                        _padding: 0,
                    };
                }
                Ok(())
            }
            Command::TransitionBufferUsage { buffer, usage } => allocator.write(
                CommandTag::TransitionBufferUsage,
                &[TransitionBufferUsageCmd {
                    buffer: buffer.0,
                    usage: usage.bits(),
                    _padding: 0,
                }],
            ),
            Command::TransitionTextureUsage { texture, usage } => allocator.write(
                CommandTag::TransitionTextureUsage,
                &[TransitionTextureUsageCmd {
                    texture: texture.0,
                    usage: usage.bits(),
                    _padding: 0,
                }],
            ),
        }
    }

    /// Decodes the command starting at `record`, pulling its data record from
    /// `records` when it has one.
    pub(crate) fn decode(
        record: RawRecord<'_>,
        records: &mut RecordIter<'_>,
    ) -> Result<Command, CommandBufferError> {
        let command = match record.tag {
            CommandTag::CopyBufferToTexture => {
                let cmd: CopyBufferToTextureCmd = single(&record)?;
                Command::CopyBufferToTexture {
                    buffer: ObjectId(cmd.buffer),
                    texture: ObjectId(cmd.texture),
                    region: TextureCopyRegion {
                        x: cmd.x,
                        y: cmd.y,
                        z: cmd.z,
                        width: cmd.width,
                        height: cmd.height,
                        depth: cmd.depth,
                        level: cmd.level,
                    },
                }
            }
            CommandTag::Dispatch => {
                let cmd: DispatchCmd = single(&record)?;
                Command::Dispatch {
                    x: cmd.x,
                    y: cmd.y,
                    z: cmd.z,
                }
            }
            CommandTag::DrawArrays => {
                let cmd: DrawArraysCmd = single(&record)?;
                Command::DrawArrays {
                    vertex_count: cmd.vertex_count,
                    instance_count: cmd.instance_count,
                    first_vertex: cmd.first_vertex,
                    first_instance: cmd.first_instance,
                }
            }
            CommandTag::DrawElements => {
                let cmd: DrawElementsCmd = single(&record)?;
                Command::DrawElements {
                    index_count: cmd.index_count,
                    instance_count: cmd.instance_count,
                    first_index: cmd.first_index,
                    first_instance: cmd.first_instance,
                }
            }
            CommandTag::SetPushConstants => {
                let cmd: SetPushConstantsCmd = single(&record)?;
                let data: &[u32] = data(records, record.index, cmd.count)?;
                Command::SetPushConstants {
                    stages: ShaderStageFlags::from_bits_retain(cmd.stages),
                    offset: cmd.offset,
                    data: data.to_vec(),
                }
            }
            CommandTag::SetPipeline => {
                let cmd: SetPipelineCmd = single(&record)?;
                Command::SetPipeline {
                    pipeline: ObjectId(cmd.pipeline),
                }
            }
            CommandTag::SetBindGroup => {
                let cmd: SetBindGroupCmd = single(&record)?;
                Command::SetBindGroup {
                    index: cmd.index,
                    group: ObjectId(cmd.group),
                }
            }
            CommandTag::SetIndexBuffer => {
                let cmd: SetIndexBufferCmd = single(&record)?;
                let format = IndexFormat::from_raw(cmd.format).ok_or(
                    CommandBufferError::MalformedStream {
                        record: record.index,
                    },
                )?;
                Command::SetIndexBuffer {
                    buffer: ObjectId(cmd.buffer),
                    offset: cmd.offset,
                    format,
                }
            }
            CommandTag::SetVertexBuffers => {
                let cmd: SetVertexBuffersCmd = single(&record)?;
                let bindings: &[VertexBufferBinding] = data(records, record.index, cmd.count)?;
                Command::SetVertexBuffers {
                    start_slot: cmd.start_slot,
                    buffers: bindings
                        .iter()
                        .map(|binding| VertexBufferSlot {
                            buffer: ObjectId(binding.buffer),
                            offset: binding.offset,
                        })
                        .collect(),
                }
            }
            CommandTag::TransitionBufferUsage => {
                let cmd: TransitionBufferUsageCmd = single(&record)?;
                Command::TransitionBufferUsage {
                    buffer: ObjectId(cmd.buffer),
                    usage: BufferUsage::from_bits_retain(cmd.usage),
                }
            }
            CommandTag::TransitionTextureUsage => {
                let cmd: TransitionTextureUsageCmd = single(&record)?;
                Command::TransitionTextureUsage {
                    texture: ObjectId(cmd.texture),
                    usage: TextureUsage::from_bits_retain(cmd.usage),
                }
            }
            // A data record is always consumed by the command it follows.
            CommandTag::Data => {
                return Err(CommandBufferError::MalformedStream {
                    record: record.index,
                })
            }
        };
        Ok(command)
    }
}

fn single<T: Pod>(record: &RawRecord<'_>) -> Result<T, CommandBufferError> {
    match record.payload::<T>() {
        Some([value]) => Ok(*value),
        _ => Err(CommandBufferError::MalformedStream {
            record: record.index,
        }),
    }
}

fn data<'a, T: Pod>(
    records: &mut RecordIter<'a>,
    owner: usize,
    count: u32,
) -> Result<&'a [T], CommandBufferError> {
    let malformed = CommandBufferError::MalformedStream { record: owner + 1 };
    let record = records.next().ok_or_else(|| malformed.clone())??;
    if record.tag != CommandTag::Data {
        return Err(malformed);
    }
    match record.payload::<T>() {
        Some(values) if values.len() == count as usize => Ok(values),
        _ => Err(malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layouts_have_no_implicit_padding() {
        assert_eq!(std::mem::size_of::<CopyBufferToTextureCmd>(), 56);
        assert_eq!(std::mem::size_of::<SetBindGroupCmd>(), 16);
        assert_eq!(std::mem::size_of::<VertexBufferBinding>(), 16);
        assert_eq!(std::mem::size_of::<SetVertexBuffersCmd>(), 8);
    }

    #[test]
    fn tags_round_trip_through_raw_values() {
        for tag in CommandTag::ALL {
            assert_eq!(CommandTag::from_raw(tag as u16), Some(tag));
        }
        assert_eq!(CommandTag::from_raw(0), None);
        assert_eq!(CommandTag::from_raw(400), None);
    }

    #[test]
    fn commands_decode_in_recording_order() {
        let recorded = vec![
            Command::TransitionBufferUsage {
                buffer: ObjectId(4),
                usage: BufferUsage::VERTEX,
            },
            Command::SetVertexBuffers {
                start_slot: 1,
                buffers: vec![
                    VertexBufferSlot {
                        buffer: ObjectId(4),
                        offset: 0,
                    },
                    VertexBufferSlot {
                        buffer: ObjectId(4),
                        offset: 64,
                    },
                ],
            },
            Command::SetPushConstants {
                stages: ShaderStageFlags::GRAPHICS,
                offset: 2,
                data: vec![7, 8, 9],
            },
            Command::SetIndexBuffer {
                buffer: ObjectId(5),
                offset: 16,
                format: IndexFormat::Uint16,
            },
            Command::DrawElements {
                index_count: 6,
                instance_count: 1,
                first_index: 0,
                first_instance: 0,
            },
        ];

        let mut allocator = CommandAllocator::new(4096);
        for command in &recorded {
            command.encode(&mut allocator).unwrap();
        }
        let stream = allocator.acquire();

        let decoded: Vec<Command> = stream.commands().collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded, recorded);
        // Two commands carry a data record.
        assert_eq!(stream.record_count(), recorded.len() + 2);
    }

    #[test]
    fn stray_data_record_is_malformed() {
        let mut allocator = CommandAllocator::new(4096);
        allocator.write(CommandTag::Data, &[1u32, 2]).unwrap();
        let stream = allocator.acquire();
        let mut commands = stream.commands();
        assert_eq!(
            commands.next(),
            Some(Err(CommandBufferError::MalformedStream { record: 0 }))
        );
        assert_eq!(commands.next(), None);
    }

    #[test]
    fn missing_data_record_is_malformed() {
        let mut allocator = CommandAllocator::new(4096);
        allocator
            .write(
                CommandTag::SetPushConstants,
                &[SetPushConstantsCmd {
                    stages: ShaderStageFlags::COMPUTE.bits(),
                    offset: 0,
                    count: 2,
                    _padding: 0,
                }],
            )
            .unwrap();
        let stream = allocator.acquire();
        assert_eq!(
            stream.commands().next(),
            Some(Err(CommandBufferError::MalformedStream { record: 1 }))
        );
    }
}
