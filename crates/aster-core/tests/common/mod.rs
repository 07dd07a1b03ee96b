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

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use aster_core::{
    Buffer, BufferUsage, Builder, Device, DeviceConfig, GpuRef, NullBackend, PushConstantDecl,
    ShaderBinding, ShaderModule, ShaderModuleDescriptor, ShaderStage, Texture, TextureFormat,
    TextureUsage, VertexAttributeMask,
};

/// Installs a test logger once per test binary.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

/// Creates a device on a null backend and returns a handle to the backend.
pub fn null_device() -> Result<(Device, NullBackend)> {
    init_logging();
    let backend = NullBackend::new();
    let device = Device::new(DeviceConfig::default(), backend.clone())?;
    Ok((device, backend))
}

pub fn shader(
    device: &Device,
    stage: ShaderStage,
    push_constants: &[PushConstantDecl],
    bindings: &[ShaderBinding],
    used_vertex_attributes: VertexAttributeMask,
) -> Result<GpuRef<ShaderModule>> {
    Ok(device.create_shader_module(&ShaderModuleDescriptor {
        label: None,
        execution_model: stage,
        push_constants,
        bindings,
        used_vertex_attributes,
    })?)
}

pub fn plain_shader(device: &Device, stage: ShaderStage) -> Result<GpuRef<ShaderModule>> {
    shader(device, stage, &[], &[], VertexAttributeMask::EMPTY)
}

pub fn buffer(
    device: &Device,
    allowed: BufferUsage,
    initial: BufferUsage,
    size: u32,
) -> Result<GpuRef<Buffer>> {
    let mut builder = device.create_buffer_builder();
    builder.set_allowed_usage(allowed)?;
    builder.set_initial_usage(initial)?;
    builder.set_size(size)?;
    Ok(builder.finish()?)
}

pub fn texture_2d(
    device: &Device,
    width: u32,
    height: u32,
    mip_levels: u32,
    allowed: TextureUsage,
) -> Result<GpuRef<Texture>> {
    let mut builder = device.create_texture_builder();
    builder.set_extent(width, height, 1)?;
    builder.set_format(TextureFormat::Rgba8Unorm)?;
    builder.set_mip_levels(mip_levels)?;
    builder.set_allowed_usage(allowed)?;
    Ok(builder.finish()?)
}
