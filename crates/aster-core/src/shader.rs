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

//! Defines shader modules.
//!
//! Shaders are compiled outside of the runtime. A [`ShaderModule`] only
//! carries the reflection data pipeline validation needs: the stage it was
//! written for, its push constants, the bindings it reads and the vertex
//! attributes it consumes.

use crate::binding::BindingType;
use crate::device::Device;
use crate::enums::{PushConstantType, ShaderStage};
use crate::error::{BindingMismatch, ResourceError};
use crate::flags::VertexAttributeMask;
use crate::layout::PipelineLayout;
use crate::object::{GpuObject, ObjectKind, TrackedObject};
use crate::{MAX_BINDINGS_PER_GROUP, MAX_BIND_GROUPS, MAX_PUSH_CONSTANTS};

/// A named push constant declared by a shader, in 32-bit slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConstantDecl {
    /// The name of the constant in the shader source.
    pub name: String,
    /// The first slot of the constant.
    pub offset: u32,
    /// The number of slots the constant covers.
    pub size: u32,
    /// The type of every slot of the constant.
    pub ty: PushConstantType,
}

/// A resource binding read by a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderBinding {
    /// The bind group index.
    pub group: u32,
    /// The binding index within the group.
    pub binding: u32,
    /// The type of resource the shader expects.
    pub ty: BindingType,
}

/// Describes a shader module to be created.
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<&'a str>,
    /// The stage the shader was written for.
    pub execution_model: ShaderStage,
    /// The push constants the shader declares.
    pub push_constants: &'a [PushConstantDecl],
    /// The bindings the shader reads.
    pub bindings: &'a [ShaderBinding],
    /// The vertex attributes a vertex shader consumes.
    pub used_vertex_attributes: VertexAttributeMask,
}

/// The reflection data of a compiled shader.
#[derive(Debug)]
pub struct ShaderModule {
    tracked: TrackedObject,
    label: Option<String>,
    execution_model: ShaderStage,
    push_constants: Vec<PushConstantDecl>,
    bindings: Vec<ShaderBinding>,
    used_vertex_attributes: VertexAttributeMask,
}

impl GpuObject for ShaderModule {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl ShaderModule {
    pub(crate) fn new(
        device: &Device,
        descriptor: &ShaderModuleDescriptor<'_>,
    ) -> Result<Self, ResourceError> {
        for constant in descriptor.push_constants {
            let end = u64::from(constant.offset) + u64::from(constant.size);
            if end > u64::from(MAX_PUSH_CONSTANTS) {
                return Err(ResourceError::PushConstantOutOfRange {
                    name: constant.name.clone(),
                    offset: constant.offset,
                    size: constant.size,
                });
            }
        }

        for binding in descriptor.bindings {
            if binding.group >= MAX_BIND_GROUPS {
                return Err(ResourceError::BindGroupIndexOutOfRange(binding.group));
            }
            if binding.binding >= MAX_BINDINGS_PER_GROUP {
                return Err(ResourceError::BindingOutOfRange(binding.binding));
            }
        }

        let used = descriptor.used_vertex_attributes;
        if used.exceeds_limit() {
            let location = used
                .locations()
                .last()
                .unwrap_or(crate::MAX_VERTEX_ATTRIBUTES);
            return Err(ResourceError::AttributeOutOfRange(location));
        }

        Ok(Self {
            tracked: device.register(ObjectKind::ShaderModule),
            label: descriptor.label.map(str::to_owned),
            execution_model: descriptor.execution_model,
            push_constants: descriptor.push_constants.to_vec(),
            bindings: descriptor.bindings.to_vec(),
            used_vertex_attributes: used,
        })
    }

    /// The debug label of the module.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The stage the shader was written for.
    pub fn execution_model(&self) -> ShaderStage {
        self.execution_model
    }

    /// The push constants in declaration order.
    pub fn push_constants(&self) -> &[PushConstantDecl] {
        &self.push_constants
    }

    /// The bindings the shader reads.
    pub fn bindings(&self) -> &[ShaderBinding] {
        &self.bindings
    }

    /// The vertex attributes the shader consumes.
    pub fn used_vertex_attributes(&self) -> VertexAttributeMask {
        self.used_vertex_attributes
    }

    /// Checks every binding of the shader against `layout`.
    ///
    /// A binding matches if the layout declares it with the same type and
    /// makes it visible to the shader's stage.
    pub fn check_compatible_with_pipeline_layout(
        &self,
        layout: &PipelineLayout,
    ) -> Result<(), BindingMismatch> {
        for used in &self.bindings {
            let (group, binding) = (used.group, used.binding);
            let entry = layout
                .bind_group_layout(group)
                .and_then(|bgl| bgl.entry(binding))
                .ok_or(BindingMismatch::Missing { group, binding })?;

            if !entry.visibility.contains_stage(self.execution_model) {
                return Err(BindingMismatch::Invisible { group, binding });
            }
            if entry.ty != used.ty {
                return Err(BindingMismatch::WrongType {
                    group,
                    binding,
                    shader: used.ty,
                    layout: entry.ty,
                });
            }
        }
        Ok(())
    }

    /// Returns `true` if every binding of the shader matches `layout`.
    pub fn is_compatible_with_pipeline_layout(&self, layout: &PipelineLayout) -> bool {
        self.check_compatible_with_pipeline_layout(layout).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::binding::{BindGroupLayoutDescriptor, BindGroupLayoutEntry};
    use crate::builder::Builder;
    use crate::config::DeviceConfig;
    use crate::flags::ShaderStageFlags;
    use crate::object::GpuRef;

    fn device() -> Device {
        Device::new(DeviceConfig::default(), NullBackend::new()).unwrap()
    }

    fn module(device: &Device, bindings: &[ShaderBinding]) -> GpuRef<ShaderModule> {
        device
            .create_shader_module(&ShaderModuleDescriptor {
                label: Some("fs"),
                execution_model: ShaderStage::Fragment,
                push_constants: &[],
                bindings,
                used_vertex_attributes: VertexAttributeMask::EMPTY,
            })
            .unwrap()
    }

    fn layout(device: &Device, visibility: ShaderStageFlags) -> GpuRef<PipelineLayout> {
        let bgl = device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: None,
                entries: &[BindGroupLayoutEntry {
                    binding: 1,
                    visibility,
                    ty: BindingType::SampledTexture,
                }],
            })
            .unwrap();
        let mut builder = device.create_pipeline_layout_builder();
        builder.set_bind_group_layout(0, &bgl).unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn compatible_binding_passes() {
        let device = device();
        let module = module(
            &device,
            &[ShaderBinding {
                group: 0,
                binding: 1,
                ty: BindingType::SampledTexture,
            }],
        );
        let layout = layout(&device, ShaderStageFlags::FRAGMENT);
        assert!(module.is_compatible_with_pipeline_layout(&layout));
    }

    #[test]
    fn mismatches_are_classified() {
        let device = device();
        let visible = layout(&device, ShaderStageFlags::FRAGMENT);
        let invisible = layout(&device, ShaderStageFlags::VERTEX);

        let missing = module(
            &device,
            &[ShaderBinding {
                group: 1,
                binding: 1,
                ty: BindingType::SampledTexture,
            }],
        );
        assert_eq!(
            missing.check_compatible_with_pipeline_layout(&visible),
            Err(BindingMismatch::Missing {
                group: 1,
                binding: 1
            })
        );

        let wrong_type = module(
            &device,
            &[ShaderBinding {
                group: 0,
                binding: 1,
                ty: BindingType::UniformBuffer,
            }],
        );
        assert_eq!(
            wrong_type.check_compatible_with_pipeline_layout(&visible),
            Err(BindingMismatch::WrongType {
                group: 0,
                binding: 1,
                shader: BindingType::UniformBuffer,
                layout: BindingType::SampledTexture
            })
        );

        let sampled = module(
            &device,
            &[ShaderBinding {
                group: 0,
                binding: 1,
                ty: BindingType::SampledTexture,
            }],
        );
        assert_eq!(
            sampled.check_compatible_with_pipeline_layout(&invisible),
            Err(BindingMismatch::Invisible {
                group: 0,
                binding: 1
            })
        );
    }

    #[test]
    fn push_constants_must_fit() {
        let device = device();
        let result = device.create_shader_module(&ShaderModuleDescriptor {
            label: None,
            execution_model: ShaderStage::Compute,
            push_constants: &[PushConstantDecl {
                name: "tail".to_string(),
                offset: 30,
                size: 4,
                ty: PushConstantType::UInt,
            }],
            bindings: &[],
            used_vertex_attributes: VertexAttributeMask::EMPTY,
        });
        assert_eq!(
            result.unwrap_err(),
            ResourceError::PushConstantOutOfRange {
                name: "tail".to_string(),
                offset: 30,
                size: 4
            }
        );
    }

    #[test]
    fn used_attributes_must_fit() {
        let device = device();
        let result = device.create_shader_module(&ShaderModuleDescriptor {
            label: None,
            execution_model: ShaderStage::Vertex,
            push_constants: &[],
            bindings: &[],
            used_vertex_attributes: VertexAttributeMask::from_locations(&[0, 20]),
        });
        assert_eq!(result.unwrap_err(), ResourceError::AttributeOutOfRange(20));
    }
}
