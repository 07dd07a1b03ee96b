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

mod common;

use anyhow::Result;
use aster_core::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingResource, BindingType, BufferUsage, Builder, CommandBufferError, DeviceError,
    GpuObject, ObjectKind, ResourceError, ShaderStageFlags,
};
use common::{buffer, null_device};
use std::thread;

#[test]
fn test_last_release_on_another_thread_destroys_the_buffer() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let vertices = buffer(&device, BufferUsage::VERTEX, BufferUsage::EMPTY, 64)?;
    let observer = vertices.downgrade();
    let owners: Vec<_> = (0..4).map(|_| vertices.retain()).collect();
    drop(vertices);

    // --- 2. ACT ---
    let handles: Vec<_> = owners
        .into_iter()
        .map(|owner| thread::spawn(move || owner.release()))
        .collect();
    let last_releases = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread join failed"))
        .filter(|last| *last)
        .count();

    // --- 3. ASSERT ---
    assert_eq!(last_releases, 1, "Exactly one release destroys the buffer");
    assert!(observer.upgrade().is_none(), "A weak reference never resurrects");
    let stats = device.stats().objects;
    assert_eq!(stats.live(ObjectKind::Buffer), 0);
    assert_eq!(stats.created(ObjectKind::Buffer), 1);
    Ok(())
}

#[test]
fn test_bind_group_and_view_keep_their_buffer_alive() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let uniforms = buffer(&device, BufferUsage::UNIFORM, BufferUsage::EMPTY, 256)?;
    let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: None,
        entries: &[BindGroupLayoutEntry {
            binding: 3,
            visibility: ShaderStageFlags::ALL,
            ty: BindingType::UniformBuffer,
        }],
    })?;
    let group = device.create_bind_group(&BindGroupDescriptor {
        label: None,
        layout: &layout,
        entries: &[BindGroupEntry {
            binding: 3,
            resource: BindingResource::Buffer(uniforms.clone()),
        }],
    })?;
    let mut view = device.create_buffer_view_builder(&uniforms);
    view.set_extent(64, 128)?;
    let view = view.finish()?;
    let observer = uniforms.downgrade();

    // --- 2. ACT ---
    let released_last = uniforms.release();
    let alive_with_owners = observer.is_alive();
    drop(group);
    let alive_with_view = observer.is_alive();
    drop(view);

    // --- 3. ASSERT ---
    assert!(!released_last, "The bind group and the view still own the buffer");
    assert!(alive_with_owners);
    assert!(alive_with_view, "The view alone keeps the buffer alive");
    assert!(!observer.is_alive(), "The last owner is gone");
    assert_eq!(device.stats().objects.live(ObjectKind::Buffer), 0);
    assert_eq!(
        device.stats().objects.live(ObjectKind::BindGroupLayout),
        1,
        "The layout is still held by this test"
    );
    Ok(())
}

#[test]
fn test_command_buffer_does_not_keep_transitioned_buffers_alive() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, backend) = null_device()?;
    let staging = buffer(&device, BufferUsage::TRANSFER_SRC, BufferUsage::EMPTY, 64)?;
    let id = staging.id();
    let mut builder = device.create_command_buffer_builder();
    builder.transition_buffer_usage(&staging, BufferUsage::TRANSFER_SRC)?;
    let command_buffer = builder.finish()?;

    // --- 2. ACT ---
    drop(staging);
    let result = device.queue().submit(&[command_buffer.clone()]);

    // --- 3. ASSERT ---
    assert!(command_buffer.buffer(id).is_none());
    assert_eq!(
        command_buffer.transitioned_buffer_usage(id),
        Some(BufferUsage::TRANSFER_SRC),
        "The transition record outlives the buffer"
    );
    assert_eq!(
        result.unwrap_err(),
        DeviceError::CommandBuffer(CommandBufferError::ResourceDestroyed(id))
    );
    assert_eq!(backend.submission_count(), 0);
    Ok(())
}

#[test]
fn test_set_sub_data_writes_through_the_backend() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, backend) = null_device()?;
    let mapped = buffer(
        &device,
        BufferUsage::MAPPED | BufferUsage::VERTEX,
        BufferUsage::MAPPED,
        16,
    )?;

    // --- 2. ACT ---
    mapped.set_sub_data(1, &[10, 20])?;
    let out_of_range = mapped.set_sub_data(3, &[1, 2]);
    mapped.transition_usage(BufferUsage::VERTEX)?;
    let unmapped = mapped.set_sub_data(0, &[1]);

    // --- 3. ASSERT ---
    assert_eq!(backend.buffer_contents(mapped.id()), Some(vec![0, 10, 20, 0]));
    assert_eq!(
        out_of_range.unwrap_err(),
        ResourceError::SubDataOutOfRange {
            start: 3,
            count: 2,
            size: 16,
        }
    );
    assert_eq!(
        unmapped.unwrap_err(),
        ResourceError::BufferNotMapped(mapped.id())
    );
    assert_eq!(device.stats().errors_reported, 2);
    Ok(())
}

#[test]
fn test_buffer_properties_are_set_once() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let mut builder = device.create_buffer_builder();
    builder.set_size(64)?;

    // --- 2. ACT ---
    let again = builder.set_size(128);
    let finished = builder.finish();

    // --- 3. ASSERT ---
    assert_eq!(
        again.unwrap_err(),
        ResourceError::PropertySetTwice {
            object: "buffer",
            property: "size",
        }
    );
    assert_eq!(finished.unwrap_err(), ResourceError::BuilderPoisoned);
    assert_eq!(device.stats().objects.created(ObjectKind::Buffer), 0);
    Ok(())
}

#[test]
fn test_device_outlives_the_handle_used_to_create_objects() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let errors = device.subscribe_errors();
    let storage = buffer(&device, BufferUsage::STORAGE, BufferUsage::EMPTY, 32)?;

    // --- 2. ACT ---
    drop(device);
    let result = storage.freeze_usage(BufferUsage::UNIFORM);

    // --- 3. ASSERT ---
    assert_eq!(
        result.unwrap_err(),
        ResourceError::FrozenOrUsageNotAllowed(storage.id())
    );
    assert!(
        errors.try_recv().is_ok(),
        "Objects report through the device they were created by"
    );
    Ok(())
}
