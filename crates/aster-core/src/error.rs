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

//! Defines the hierarchy of error types for the runtime.
//!
//! Every validation point returns one of the concern-specific errors below.
//! When an error is detected it is also reported to the owning device, which
//! logs it and forwards a [`DeviceError`] to the subscribers of its error
//! channel.

use crate::binding::BindingType;
use crate::enums::{BackendType, ShaderStage, TextureDimension};
use crate::flags::{ShaderStageFlags, VertexAttributeMask};
use crate::object::ObjectId;
use crate::resource::{BufferUsage, TextureUsage};
use thiserror::Error;

/// The broad category of a [`DeviceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An API contract was broken (object consumed twice, property set twice, ...).
    Usage,
    /// Two objects that must agree do not (stage vs. layout, attributes vs. input state, ...).
    Compatibility,
    /// The pieces of an object do not form a valid whole.
    Composition,
    /// The command allocator could not grow.
    Allocation,
    /// The backend failed to carry out validated work.
    Backend,
    /// The device configuration is invalid.
    Configuration,
}

/// An error raised by the command allocator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Growing the stream would exceed the configured ceiling.
    #[error("command stream would grow to {requested} bytes, over the {limit} byte limit")]
    LimitExceeded {
        /// The size the stream would have had.
        requested: usize,
        /// The configured ceiling.
        limit: usize,
    },
    /// The system allocator refused to grow the stream.
    #[error("out of memory while growing the command stream to {requested} bytes")]
    OutOfMemory {
        /// The size the stream would have had.
        requested: usize,
    },
    /// A single record cannot be described by a record header.
    #[error("a record of {count} elements of {element_size} bytes is too large")]
    RecordTooLarge {
        /// The number of elements requested.
        count: usize,
        /// The size of one element.
        element_size: usize,
    },
}

/// Why a shader stage does not fit a pipeline layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingMismatch {
    /// The binding is missing from the pipeline layout.
    #[error("binding {binding} of group {group} is missing from the layout")]
    Missing {
        /// The bind group index.
        group: u32,
        /// The binding number.
        binding: u32,
    },
    /// The visibility of the layout entry does not include the stage.
    #[error("binding {binding} of group {group} is not visible to the stage")]
    Invisible {
        /// The bind group index.
        group: u32,
        /// The binding number.
        binding: u32,
    },
    /// The shader and the layout disagree on the binding type.
    #[error("binding {binding} of group {group} is a {layout:?} in the layout but a {shader:?} in the shader")]
    WrongType {
        /// The bind group index.
        group: u32,
        /// The binding number.
        binding: u32,
        /// The type the shader declares.
        shader: BindingType,
        /// The type the layout declares.
        layout: BindingType,
    },
}

/// An error related to the construction of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The only accepted entry point is `main`.
    #[error("the entry point has to be `main`, got `{0}`")]
    InvalidEntryPoint(String),
    /// The module was compiled for another stage.
    #[error("setting a {module:?} module on the {stage:?} stage")]
    ExecutionModelMismatch {
        /// The stage being set.
        stage: ShaderStage,
        /// The execution model of the module.
        module: ShaderStage,
    },
    /// The stage was already set on this builder.
    #[error("the {0:?} stage is already set")]
    StageAlreadySet(ShaderStage),
    /// The stages do not form a graphics or a compute pipeline.
    #[error("wrong combination of stages for a pipeline: {0:?}")]
    InvalidStageCombination(ShaderStageFlags),
    /// A stage does not fit the pipeline layout.
    #[error("the {stage:?} stage is not compatible with the layout: {mismatch}")]
    IncompatibleLayout {
        /// The offending stage.
        stage: ShaderStage,
        /// What does not match.
        mismatch: BindingMismatch,
    },
    /// The vertex stage reads attributes that the input state does not provide.
    #[error("the vertex stage uses attributes not in the input state: {missing:?}")]
    MissingVertexAttributes {
        /// The used-but-absent attribute locations.
        missing: VertexAttributeMask,
    },
    /// The builder was already turned into a pipeline.
    #[error("the pipeline builder was already consumed")]
    BuilderConsumed,
    /// An earlier call failed and left the builder unusable.
    #[error("the pipeline builder is unusable after an earlier error")]
    BuilderPoisoned,
}

impl PipelineError {
    /// The category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidEntryPoint(_)
            | PipelineError::StageAlreadySet(_)
            | PipelineError::BuilderConsumed
            | PipelineError::BuilderPoisoned => ErrorKind::Usage,
            PipelineError::ExecutionModelMismatch { .. }
            | PipelineError::IncompatibleLayout { .. }
            | PipelineError::MissingVertexAttributes { .. } => ErrorKind::Compatibility,
            PipelineError::InvalidStageCombination(_) => ErrorKind::Composition,
        }
    }
}

/// An error related to the recording, validation or submission of a command buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandBufferError {
    /// The command stream could not grow.
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// The builder was already turned into a command buffer.
    #[error("the command buffer builder was already consumed")]
    BuilderConsumed,
    /// An earlier call failed and left the builder unusable.
    #[error("the command buffer builder is unusable after an earlier error")]
    BuilderPoisoned,
    /// The recorded commands were already handed to a translator.
    #[error("the commands of this command buffer were already acquired")]
    CommandsAlreadyAcquired,
    /// A bind group index is past the limit.
    #[error("bind group index {0} is out of range")]
    BindGroupIndexOutOfRange(u32),
    /// A push-constant update reaches past the push-constant storage.
    #[error("push constants [{offset}, {offset} + {count}) are out of range")]
    PushConstantsOutOfRange {
        /// The first slot written.
        offset: u32,
        /// The number of slots written.
        count: usize,
    },
    /// A push-constant update targets no stage.
    #[error("push constants must target at least one stage")]
    EmptyPushConstantStages,
    /// A vertex buffer update reaches past the last vertex input slot.
    #[error("vertex buffer slots [{start_slot}, {start_slot} + {count}) are out of range")]
    VertexSlotsOutOfRange {
        /// The first slot bound.
        start_slot: u32,
        /// The number of slots bound.
        count: usize,
    },
    /// The buffers and offsets of a vertex buffer update differ in length.
    #[error("{buffers} vertex buffers were given with {offsets} offsets")]
    VertexBufferCountMismatch {
        /// The number of buffers.
        buffers: usize,
        /// The number of offsets.
        offsets: usize,
    },
    /// The buffer cannot be transitioned to the usage.
    #[error("buffer {buffer} is frozen or does not allow {usage:?}")]
    BufferTransitionNotPossible {
        /// The buffer.
        buffer: ObjectId,
        /// The requested usage.
        usage: BufferUsage,
    },
    /// The texture cannot be transitioned to the usage.
    #[error("texture {texture} is frozen or does not allow {usage:?}")]
    TextureTransitionNotPossible {
        /// The texture.
        texture: ObjectId,
        /// The requested usage.
        usage: TextureUsage,
    },
    /// A command uses a buffer that was not transitioned to the required usage.
    #[error("buffer {buffer} is used as {required:?} without being transitioned to it")]
    MissingBufferUsage {
        /// The buffer.
        buffer: ObjectId,
        /// The usage the command needs.
        required: BufferUsage,
    },
    /// A command uses a texture that was not transitioned to the required usage.
    #[error("texture {texture} is used as {required:?} without being transitioned to it")]
    MissingTextureUsage {
        /// The texture.
        texture: ObjectId,
        /// The usage the command needs.
        required: TextureUsage,
    },
    /// The copy targets a mip level the texture does not have.
    #[error("copy to mip level {level} of texture {texture} which has {mip_levels} levels")]
    CopyMipLevelOutOfRange {
        /// The texture.
        texture: ObjectId,
        /// The requested level.
        level: u32,
        /// The number of levels of the texture.
        mip_levels: u32,
    },
    /// The copy region does not fit in the texture.
    #[error("copy region does not fit in texture {0}")]
    CopyRegionOutOfBounds(ObjectId),
    /// The source buffer is too small for the copy.
    #[error("copy needs {required} bytes but buffer {buffer} holds {size}")]
    CopyBufferTooSmall {
        /// The buffer.
        buffer: ObjectId,
        /// The number of bytes the copy reads.
        required: u64,
        /// The size of the buffer.
        size: u32,
    },
    /// A draw or dispatch was recorded without a pipeline.
    #[error("no pipeline is bound")]
    NoPipelineBound,
    /// A dispatch was recorded with a graphics pipeline.
    #[error("dispatch requires a compute pipeline")]
    ComputePipelineRequired,
    /// A draw was recorded with a compute pipeline.
    #[error("draw requires a graphics pipeline")]
    GraphicsPipelineRequired,
    /// An indexed draw was recorded without an index buffer.
    #[error("indexed draw without an index buffer")]
    MissingIndexBuffer,
    /// A referenced object was destroyed before the work could use it.
    #[error("object {0} was destroyed while still in use")]
    ResourceDestroyed(ObjectId),
    /// A transitioned resource was frozen since the recording.
    #[error("cannot transition object {0} which has a frozen usage")]
    FrozenResourceTransitioned(ObjectId),
    /// The command stream does not decode.
    #[error("malformed command stream at record {record}")]
    MalformedStream {
        /// The index of the record that failed to decode.
        record: usize,
    },
}

impl CommandBufferError {
    /// The category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandBufferError::Alloc(_) => ErrorKind::Allocation,
            CommandBufferError::MissingBufferUsage { .. }
            | CommandBufferError::MissingTextureUsage { .. }
            | CommandBufferError::ComputePipelineRequired
            | CommandBufferError::GraphicsPipelineRequired
            | CommandBufferError::FrozenResourceTransitioned(_) => ErrorKind::Compatibility,
            CommandBufferError::MalformedStream { .. } => ErrorKind::Composition,
            _ => ErrorKind::Usage,
        }
    }
}

/// An error related to the creation or use of a resource or a pipeline component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// A builder property was set more than once.
    #[error("{object} {property} property set multiple times")]
    PropertySetTwice {
        /// The kind of object being built.
        object: &'static str,
        /// The property.
        property: &'static str,
    },
    /// A required builder property was never set.
    #[error("{object} missing the {property} property")]
    MissingProperty {
        /// The kind of object being built.
        object: &'static str,
        /// The property.
        property: &'static str,
    },
    /// The initial usage is not possible under the allowed usage.
    #[error("initial {object} usage is not allowed")]
    InitialUsageNotAllowed {
        /// The kind of object being built.
        object: &'static str,
    },
    /// The resource is frozen or the usage is not allowed.
    #[error("object {0} is frozen or the usage is not allowed")]
    FrozenOrUsageNotAllowed(ObjectId),
    /// A sub-data write reaches past the end of the buffer.
    #[error("buffer subdata out of range: {count} words at {start} in a {size} byte buffer")]
    SubDataOutOfRange {
        /// The first word written.
        start: u32,
        /// The number of words written.
        count: usize,
        /// The size of the buffer in bytes.
        size: u32,
    },
    /// The buffer must be in the mapped usage to be written from the CPU.
    #[error("buffer {0} needs the mapped usage bit")]
    BufferNotMapped(ObjectId),
    /// The view reaches past the end of its buffer.
    #[error("buffer view [{offset}, {offset} + {size}) exceeds the {buffer_size} byte buffer")]
    ViewOutOfBounds {
        /// The view offset.
        offset: u32,
        /// The view size.
        size: u32,
        /// The size of the buffer.
        buffer_size: u32,
    },
    /// The texture extent does not match its dimension or is empty.
    #[error("invalid {dimension:?} texture extent {width}x{height}x{depth}")]
    InvalidExtent {
        /// The texture dimension.
        dimension: TextureDimension,
        /// The width.
        width: u32,
        /// The height.
        height: u32,
        /// The depth.
        depth: u32,
    },
    /// A texture needs at least one mip level.
    #[error("a texture needs at least one mip level")]
    ZeroMipLevels,
    /// A binding number is past the per-group limit.
    #[error("binding {0} is out of range")]
    BindingOutOfRange(u32),
    /// A binding number appears twice.
    #[error("binding {0} is declared more than once")]
    DuplicateBinding(u32),
    /// A bind group does not provide a binding of its layout.
    #[error("binding {0} of the layout is not provided")]
    BindingNotProvided(u32),
    /// A bind group provides a binding its layout does not declare.
    #[error("binding {0} is not part of the layout")]
    UnknownBinding(u32),
    /// A bind group provides a resource of the wrong kind.
    #[error("binding {binding} expects a resource for a {expected:?}")]
    BindingResourceMismatch {
        /// The binding number.
        binding: u32,
        /// The type declared by the layout.
        expected: BindingType,
    },
    /// A bind group index is past the limit.
    #[error("bind group index {0} is out of range")]
    BindGroupIndexOutOfRange(u32),
    /// A bind group layout was set twice on a pipeline layout builder.
    #[error("bind group layout {0} set multiple times")]
    BindGroupLayoutSetTwice(u32),
    /// A vertex attribute location is past the limit.
    #[error("vertex attribute {0} is out of range")]
    AttributeOutOfRange(u32),
    /// A vertex input slot is past the limit.
    #[error("vertex input slot {0} is out of range")]
    InputSlotOutOfRange(u32),
    /// A vertex attribute was set twice.
    #[error("vertex attribute {0} set multiple times")]
    AttributeSetTwice(u32),
    /// A vertex input was set twice.
    #[error("vertex input {0} set multiple times")]
    InputSetTwice(u32),
    /// A vertex attribute reads from an undeclared input slot.
    #[error("vertex attribute {location} reads undeclared input slot {slot}")]
    AttributeInputNotDeclared {
        /// The attribute location.
        location: u32,
        /// The input slot it reads from.
        slot: u32,
    },
    /// A push-constant declaration does not fit the push-constant storage.
    #[error("push constant `{name}` at [{offset}, {offset} + {size}) is out of range")]
    PushConstantOutOfRange {
        /// The declared name.
        name: String,
        /// The first slot.
        offset: u32,
        /// The number of slots.
        size: u32,
    },
    /// The backend refused the operation.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The builder was already consumed.
    #[error("the builder was already consumed")]
    BuilderConsumed,
    /// An earlier call failed and left the builder unusable.
    #[error("the builder is unusable after an earlier error")]
    BuilderPoisoned,
}

impl ResourceError {
    /// The category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::Backend(_) => ErrorKind::Backend,
            ResourceError::BindingResourceMismatch { .. }
            | ResourceError::AttributeInputNotDeclared { .. } => ErrorKind::Compatibility,
            ResourceError::BindingNotProvided(_)
            | ResourceError::UnknownBinding(_)
            | ResourceError::InvalidExtent { .. }
            | ResourceError::ZeroMipLevels => ErrorKind::Composition,
            _ => ErrorKind::Usage,
        }
    }
}

/// An error raised by a backend while carrying out validated work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not execute a command stream.
    #[error("{backend:?} backend failed to execute commands: {message}")]
    Execution {
        /// The backend that failed.
        backend: BackendType,
        /// What went wrong.
        message: String,
    },
    /// A resource referenced by the work is gone.
    #[error("object {0} is not available to the backend")]
    ResourceUnavailable(ObjectId),
}

/// The umbrella error reported through a device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// A command allocator error.
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// A pipeline error.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// A command buffer error.
    #[error(transparent)]
    CommandBuffer(#[from] CommandBufferError),
    /// A resource error.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// A backend error.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The backend handed to the device is not the configured one.
    #[error("configured for the {configured:?} backend but got a {provided:?} backend")]
    BackendMismatch {
        /// The backend in the configuration.
        configured: BackendType,
        /// The backend actually provided.
        provided: BackendType,
    },
    /// The configuration could not be used.
    #[error("invalid device configuration: {0}")]
    Config(String),
}

impl DeviceError {
    /// The category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::Alloc(_) => ErrorKind::Allocation,
            DeviceError::Pipeline(err) => err.kind(),
            DeviceError::CommandBuffer(err) => err.kind(),
            DeviceError::Resource(err) => err.kind(),
            DeviceError::Backend(_) => ErrorKind::Backend,
            DeviceError::BackendMismatch { .. } | DeviceError::Config(_) => {
                ErrorKind::Configuration
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn pipeline_error_display() {
        let err = PipelineError::InvalidEntryPoint("vs_main".to_string());
        assert_eq!(format!("{err}"), "the entry point has to be `main`, got `vs_main`");

        let err = PipelineError::StageAlreadySet(ShaderStage::Vertex);
        assert_eq!(format!("{err}"), "the Vertex stage is already set");
    }

    #[test]
    fn incompatible_layout_display_includes_mismatch() {
        let err = PipelineError::IncompatibleLayout {
            stage: ShaderStage::Fragment,
            mismatch: BindingMismatch::Missing {
                group: 1,
                binding: 2,
            },
        };
        assert_eq!(
            format!("{err}"),
            "the Fragment stage is not compatible with the layout: binding 2 of group 1 is missing from the layout"
        );
    }

    #[test]
    fn command_buffer_error_wraps_alloc_error() {
        let alloc = AllocError::LimitExceeded {
            requested: 128,
            limit: 64,
        };
        let err: CommandBufferError = alloc.clone().into();
        assert_eq!(err.kind(), ErrorKind::Allocation);
        assert_eq!(format!("{err}"), format!("{alloc}"));
    }

    #[test]
    fn device_error_kinds() {
        let composition: DeviceError =
            PipelineError::InvalidStageCombination(ShaderStageFlags::VERTEX).into();
        assert_eq!(composition.kind(), ErrorKind::Composition);

        let usage: DeviceError = PipelineError::BuilderConsumed.into();
        assert_eq!(usage.kind(), ErrorKind::Usage);

        let compat: DeviceError = PipelineError::MissingVertexAttributes {
            missing: VertexAttributeMask::from_bits(0b100),
        }
        .into();
        assert_eq!(compat.kind(), ErrorKind::Compatibility);

        let backend: DeviceError = ResourceError::Backend(BackendError::ResourceUnavailable(
            ObjectId(3),
        ))
        .into();
        assert_eq!(backend.kind(), ErrorKind::Backend);
    }

    #[test]
    fn resource_error_exposes_backend_source() {
        let err = ResourceError::Backend(BackendError::Execution {
            backend: BackendType::Null,
            message: "boom".to_string(),
        });
        assert_eq!(
            format!("{err}"),
            "Null backend failed to execute commands: boom"
        );
        // `transparent` forwards `source` to the wrapped error, which has none.
        assert!(err.source().is_none());
    }
}
