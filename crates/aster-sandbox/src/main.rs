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

// Aster Sandbox
// Records and submits a small frame of work against the null backend.

use anyhow::{Context, Result};
use aster_core::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferUsage, Builder, Device,
    DeviceConfig, GpuObject, GpuRef, IndexFormat, InputStepMode, NullBackend, ObjectKind,
    Pipeline, PushConstantDecl, PushConstantType, ShaderBinding, ShaderModuleDescriptor,
    ShaderStage, ShaderStageFlags, TextureCopyRegion, TextureFormat, TextureUsage,
    VertexAttributeMask, VertexFormat, ENTRY_POINT,
};

/// Environment variable naming a JSON device configuration file.
const CONFIG_ENV: &str = "ASTER_CONFIG";

const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.5, 0.0], [-0.5, -0.5, 0.0], [0.5, -0.5, 0.0]];

fn load_config() -> Result<DeviceConfig> {
    let Some(path) = std::env::var_os(CONFIG_ENV) else {
        return Ok(DeviceConfig::default());
    };
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.to_string_lossy()))?;
    Ok(DeviceConfig::from_json_str(&json)?)
}

fn create_buffer(
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

/// Uploads `words` through the mapped usage, then freezes the buffer as `usage`.
fn create_static_buffer(
    device: &Device,
    usage: BufferUsage,
    words: &[u32],
) -> Result<GpuRef<Buffer>> {
    let size = u32::try_from(words.len() * 4).context("Static buffer too large")?;
    let buffer = create_buffer(device, BufferUsage::MAPPED | usage, BufferUsage::MAPPED, size)?;
    buffer.set_sub_data(0, words)?;
    buffer.freeze_usage(usage)?;
    Ok(buffer)
}

/// A compute pipeline together with the storage it updates.
struct ParticlePass {
    pipeline: GpuRef<Pipeline>,
    particles: GpuRef<Buffer>,
    bind_group: GpuRef<BindGroup>,
}

fn create_particle_pass(device: &Device) -> Result<ParticlePass> {
    let push_constants = [PushConstantDecl {
        name: "element_count".to_owned(),
        offset: 0,
        size: 1,
        ty: PushConstantType::UInt,
    }];
    let bindings = [ShaderBinding {
        group: 0,
        binding: 0,
        ty: BindingType::StorageBuffer,
    }];
    let module = device.create_shader_module(&ShaderModuleDescriptor {
        label: Some("particles_cs"),
        execution_model: ShaderStage::Compute,
        push_constants: &push_constants,
        bindings: &bindings,
        used_vertex_attributes: VertexAttributeMask::EMPTY,
    })?;

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("particles_bgl"),
        entries: &[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::COMPUTE,
            ty: BindingType::StorageBuffer,
        }],
    })?;
    let mut layout = device.create_pipeline_layout_builder();
    layout.set_bind_group_layout(0, &bind_group_layout)?;
    let layout = layout.finish()?;

    let mut pipeline = device.create_pipeline_builder();
    pipeline.set_stage(ShaderStage::Compute, &module, ENTRY_POINT)?;
    pipeline.set_layout(&layout)?;
    let pipeline = pipeline.finish()?;

    let particles = create_buffer(device, BufferUsage::STORAGE, BufferUsage::EMPTY, 1024)?;
    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("particles"),
        layout: &bind_group_layout,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: BindingResource::Buffer(particles.clone()),
        }],
    })?;
    Ok(ParticlePass {
        pipeline,
        particles,
        bind_group,
    })
}

fn create_graphics_pipeline(device: &Device) -> Result<GpuRef<Pipeline>> {
    let vertex = device.create_shader_module(&ShaderModuleDescriptor {
        label: Some("triangle_vs"),
        execution_model: ShaderStage::Vertex,
        push_constants: &[],
        bindings: &[],
        used_vertex_attributes: VertexAttributeMask::from_locations(&[0]),
    })?;
    let fragment = device.create_shader_module(&ShaderModuleDescriptor {
        label: Some("triangle_fs"),
        execution_model: ShaderStage::Fragment,
        push_constants: &[],
        bindings: &[],
        used_vertex_attributes: VertexAttributeMask::EMPTY,
    })?;

    let mut input_state = device.create_input_state_builder();
    input_state.set_input(0, 12, InputStepMode::Vertex)?;
    input_state.set_attribute(0, 0, VertexFormat::Float32x3, 0)?;
    let input_state = input_state.finish()?;

    let mut pipeline = device.create_pipeline_builder();
    pipeline.set_stage(ShaderStage::Vertex, &vertex, ENTRY_POINT)?;
    pipeline.set_stage(ShaderStage::Fragment, &fragment, ENTRY_POINT)?;
    pipeline.set_input_state(&input_state)?;
    Ok(pipeline.finish()?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let backend = NullBackend::new();
    let device = Device::new(config, backend.clone())?;
    let errors = device.subscribe_errors();

    // Texture upload.
    let staging = create_buffer(
        &device,
        BufferUsage::MAPPED | BufferUsage::TRANSFER_SRC,
        BufferUsage::MAPPED,
        64,
    )?;
    let texels: Vec<u32> = (0..16).map(|i| 0xff00_0000 | i * 0x0010_1010).collect();
    staging.set_sub_data(0, &texels)?;

    let mut texture = device.create_texture_builder();
    texture.set_extent(4, 4, 1)?;
    texture.set_format(TextureFormat::Rgba8Unorm)?;
    texture.set_allowed_usage(TextureUsage::TRANSFER_DST | TextureUsage::SAMPLED)?;
    let texture = texture.finish()?;

    let particle_pass = create_particle_pass(&device)?;
    let graphics = create_graphics_pipeline(&device)?;

    let vertex_words: Vec<u32> = TRIANGLE.iter().flatten().map(|v| v.to_bits()).collect();
    let vertices = create_static_buffer(&device, BufferUsage::VERTEX, &vertex_words)?;
    let indices = create_static_buffer(&device, BufferUsage::INDEX, &[0, 1, 2])?;

    let mut frame = device.create_command_buffer_builder();
    frame.transition_buffer_usage(&staging, BufferUsage::TRANSFER_SRC)?;
    frame.transition_texture_usage(&texture, TextureUsage::TRANSFER_DST)?;
    frame.copy_buffer_to_texture(
        &staging,
        &texture,
        TextureCopyRegion {
            x: 0,
            y: 0,
            z: 0,
            width: 4,
            height: 4,
            depth: 1,
            level: 0,
        },
    )?;
    frame.transition_texture_usage(&texture, TextureUsage::SAMPLED)?;

    frame.set_pipeline(&particle_pass.pipeline)?;
    frame.transition_buffer_usage(&particle_pass.particles, BufferUsage::STORAGE)?;
    frame.set_bind_group(0, &particle_pass.bind_group)?;
    frame.set_push_constants(ShaderStageFlags::COMPUTE, 0, &[256])?;
    frame.dispatch(4, 1, 1)?;

    frame.set_pipeline(&graphics)?;
    frame.set_vertex_buffers(0, &[vertices.clone()], &[0])?;
    frame.set_index_buffer(&indices, 0, IndexFormat::Uint32)?;
    frame.draw_elements(3, 1, 0, 0)?;
    let frame = frame.finish()?;

    device.queue().submit(std::slice::from_ref(&frame))?;

    let stats = device.stats();
    log::info!(
        "Executed {} streams, {} commands in the last one",
        backend.submission_count(),
        backend
            .executed_commands()
            .last()
            .map_or(0, |commands| commands.len())
    );
    log::info!(
        "Texture {} is now {:?}, {} pipelines and {} buffers alive",
        texture.id(),
        texture.usage(),
        stats.objects.live(ObjectKind::Pipeline),
        stats.objects.live(ObjectKind::Buffer)
    );

    for error in errors.drain() {
        log::warn!("Device reported: {error}");
    }
    Ok(())
}
