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

//! # Aster Core
//!
//! The object model, command recording and validation core of the Aster GPU
//! runtime.
//!
//! Clients create objects through a [`Device`]. Resources and pipelines are
//! described with single-shot builders and shared through [`GpuRef`]
//! handles. GPU work is recorded with a [`CommandBufferBuilder`], validated
//! when the builder finishes, and handed to the device's [`Backend`] by the
//! [`Queue`].

#![warn(missing_docs)]

pub mod backend;
pub mod binding;
mod bitflags;
pub mod builder;
pub mod command;
pub mod config;
pub mod device;
pub mod enums;
pub mod error;
pub mod error_bus;
pub mod flags;
pub mod input_state;
pub mod layout;
pub mod object;
pub mod pipeline;
pub mod queue;
pub mod resource;
pub mod shader;

// Re-export the most important types for easier use.
pub use self::backend::{Backend, NullBackend};
pub use self::binding::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType,
};
pub use self::builder::{Builder, BuilderSlot};
pub use self::command::{
    Command, CommandBuffer, CommandBufferBuilder, CommandStream, TextureCopyRegion,
    VertexBufferSlot,
};
pub use self::config::DeviceConfig;
pub use self::device::{Device, DeviceStats};
pub use self::enums::*;
pub use self::error::{
    AllocError, BackendError, BindingMismatch, CommandBufferError, DeviceError, ErrorKind,
    PipelineError, ResourceError,
};
pub use self::flags::{ShaderStageFlags, VertexAttributeMask};
pub use self::input_state::{InputState, InputStateBuilder};
pub use self::layout::{PipelineLayout, PipelineLayoutBuilder};
pub use self::object::{GpuObject, GpuRef, ObjectId, ObjectKind, ObjectStats, WeakGpuRef};
pub use self::pipeline::{Pipeline, PipelineBuilder, PushConstantInfo, ENTRY_POINT};
pub use self::queue::Queue;
pub use self::resource::{
    Buffer, BufferBuilder, BufferUsage, BufferView, BufferViewBuilder, Extent3d, Texture,
    TextureBuilder, TextureUsage,
};
pub use self::shader::{PushConstantDecl, ShaderBinding, ShaderModule, ShaderModuleDescriptor};

/// The number of bind groups a pipeline layout holds.
pub const MAX_BIND_GROUPS: u32 = 4;
/// The number of bindings a bind group layout can declare.
pub const MAX_BINDINGS_PER_GROUP: u32 = 16;
/// The number of vertex attribute locations.
pub const MAX_VERTEX_ATTRIBUTES: u32 = 16;
/// The number of vertex buffer slots.
pub const MAX_VERTEX_INPUTS: u32 = 16;
/// The number of 32-bit push-constant slots per stage.
pub const MAX_PUSH_CONSTANTS: u32 = 32;
