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

//! Defines bind group layouts and bind groups.
//!
//! A bind group layout describes the shape of a set of bindings without
//! naming resources. A bind group fills a layout with actual buffers and
//! textures, and keeps them alive for as long as it lives.

use crate::device::Device;
use crate::error::ResourceError;
use crate::flags::ShaderStageFlags;
use crate::object::{GpuObject, GpuRef, ObjectKind, TrackedObject};
use crate::resource::{Buffer, BufferUsage, Texture, TextureUsage};
use crate::MAX_BINDINGS_PER_GROUP;
use std::collections::BTreeMap;

/// The type of resource bound at a binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// A uniform buffer.
    UniformBuffer,
    /// A storage buffer.
    StorageBuffer,
    /// A sampled texture.
    SampledTexture,
}

/// The resource usage a binding type requires when a bind group is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredUsage {
    /// The bound buffer must have this usage.
    Buffer(BufferUsage),
    /// The bound texture must have this usage.
    Texture(TextureUsage),
}

impl BindingType {
    /// The usage a resource bound with this type must be in.
    pub const fn required_usage(self) -> RequiredUsage {
        match self {
            BindingType::UniformBuffer => RequiredUsage::Buffer(BufferUsage::UNIFORM),
            BindingType::StorageBuffer => RequiredUsage::Buffer(BufferUsage::STORAGE),
            BindingType::SampledTexture => RequiredUsage::Texture(TextureUsage::SAMPLED),
        }
    }
}

/// Describes a single binding entry in a bind group layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupLayoutEntry {
    /// The binding index.
    pub binding: u32,
    /// Which shader stages can access this binding.
    pub visibility: ShaderStageFlags,
    /// The type of resource being bound.
    pub ty: BindingType,
}

/// Describes a bind group layout to be created.
#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The entries in this bind group layout.
    pub entries: &'a [BindGroupLayoutEntry],
}

/// The shape of a bind group.
#[derive(Debug)]
pub struct BindGroupLayout {
    tracked: TrackedObject,
    label: Option<String>,
    entries: BTreeMap<u32, BindGroupLayoutEntry>,
}

impl GpuObject for BindGroupLayout {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl BindGroupLayout {
    pub(crate) fn new(
        device: &Device,
        descriptor: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<Self, ResourceError> {
        let mut entries = BTreeMap::new();
        for entry in descriptor.entries {
            if entry.binding >= MAX_BINDINGS_PER_GROUP {
                return Err(ResourceError::BindingOutOfRange(entry.binding));
            }
            if entries.insert(entry.binding, *entry).is_some() {
                return Err(ResourceError::DuplicateBinding(entry.binding));
            }
        }

        Ok(Self {
            tracked: device.register(ObjectKind::BindGroupLayout),
            label: descriptor.label.map(str::to_owned),
            entries,
        })
    }

    /// The debug label of the layout.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns the entry at `binding`, if the layout declares one.
    pub fn entry(&self, binding: u32) -> Option<&BindGroupLayoutEntry> {
        self.entries.get(&binding)
    }

    /// Iterates over the entries in binding order.
    pub fn entries(&self) -> impl Iterator<Item = &BindGroupLayoutEntry> {
        self.entries.values()
    }

    /// Returns `true` if the layout declares no binding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A resource bound in a bind group.
#[derive(Debug, Clone)]
pub enum BindingResource {
    /// A whole buffer.
    Buffer(GpuRef<Buffer>),
    /// A whole texture.
    Texture(GpuRef<Texture>),
}

impl BindingResource {
    fn matches(&self, ty: BindingType) -> bool {
        matches!(
            (self, ty),
            (
                BindingResource::Buffer(_),
                BindingType::UniformBuffer | BindingType::StorageBuffer
            ) | (BindingResource::Texture(_), BindingType::SampledTexture)
        )
    }
}

/// A single entry in a bind group.
#[derive(Debug, Clone)]
pub struct BindGroupEntry {
    /// The binding index.
    pub binding: u32,
    /// The resource to bind.
    pub resource: BindingResource,
}

/// Describes a bind group to be created.
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The layout this bind group conforms to.
    pub layout: &'a GpuRef<BindGroupLayout>,
    /// The resources to bind at each binding point.
    pub entries: &'a [BindGroupEntry],
}

/// A set of resources matching a [`BindGroupLayout`].
#[derive(Debug)]
pub struct BindGroup {
    tracked: TrackedObject,
    label: Option<String>,
    layout: GpuRef<BindGroupLayout>,
    resources: BTreeMap<u32, BindingResource>,
}

impl GpuObject for BindGroup {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl BindGroup {
    pub(crate) fn new(
        device: &Device,
        descriptor: &BindGroupDescriptor<'_>,
    ) -> Result<Self, ResourceError> {
        let layout = descriptor.layout;
        let mut resources = BTreeMap::new();
        for entry in descriptor.entries {
            let Some(layout_entry) = layout.entry(entry.binding) else {
                return Err(ResourceError::UnknownBinding(entry.binding));
            };
            if !entry.resource.matches(layout_entry.ty) {
                return Err(ResourceError::BindingResourceMismatch {
                    binding: entry.binding,
                    expected: layout_entry.ty,
                });
            }
            if resources
                .insert(entry.binding, entry.resource.clone())
                .is_some()
            {
                return Err(ResourceError::DuplicateBinding(entry.binding));
            }
        }

        if let Some(missing) = layout
            .entries()
            .find(|entry| !resources.contains_key(&entry.binding))
        {
            return Err(ResourceError::BindingNotProvided(missing.binding));
        }

        Ok(Self {
            tracked: device.register(ObjectKind::BindGroup),
            label: descriptor.label.map(str::to_owned),
            layout: layout.clone(),
            resources,
        })
    }

    /// The debug label of the bind group.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The layout the bind group conforms to.
    pub fn layout(&self) -> &GpuRef<BindGroupLayout> {
        &self.layout
    }

    /// Returns the resource bound at `binding`.
    pub fn resource(&self, binding: u32) -> Option<&BindingResource> {
        self.resources.get(&binding)
    }

    /// Iterates over every binding with its layout type, in binding order.
    pub fn bindings(&self) -> impl Iterator<Item = (BindingType, &BindingResource)> {
        self.resources.iter().filter_map(|(binding, resource)| {
            self.layout
                .entry(*binding)
                .map(|entry| (entry.ty, resource))
        })
    }
}
