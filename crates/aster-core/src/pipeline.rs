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

//! Defines pipelines and the builder that validates them.
//!
//! A pipeline is either a graphics pipeline (vertex and fragment stages) or a
//! compute pipeline (a single compute stage). Construction checks that every
//! stage fits the pipeline layout and, for graphics pipelines, that the input
//! state provides every vertex attribute the vertex stage consumes.

use crate::builder::{Builder, BuilderBase};
use crate::device::Device;
use crate::enums::{PushConstantType, ShaderStage};
use crate::error::PipelineError;
use crate::flags::ShaderStageFlags;
use crate::input_state::InputState;
use crate::layout::PipelineLayout;
use crate::object::{GpuObject, GpuRef, ObjectKind, TrackedObject};
use crate::shader::ShaderModule;
use crate::MAX_PUSH_CONSTANTS;

/// The only entry point name shader stages may use.
pub const ENTRY_POINT: &str = "main";

const SLOT_COUNT: usize = MAX_PUSH_CONSTANTS as usize;

/// The shader module and entry point of a pipeline stage.
#[derive(Debug, Clone)]
pub struct StageInfo {
    /// The module the stage runs.
    pub module: GpuRef<ShaderModule>,
    /// The entry point within the module.
    pub entry_point: String,
}

/// The declared type of every push-constant slot of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantInfo {
    mask: u32,
    types: [PushConstantType; SLOT_COUNT],
}

impl Default for PushConstantInfo {
    fn default() -> Self {
        Self {
            mask: 0,
            types: [PushConstantType::default(); SLOT_COUNT],
        }
    }
}

impl PushConstantInfo {
    /// Collects the push constants of `module`.
    ///
    /// Every slot covered by a constant takes the constant's type. Zero-size
    /// constants claim no slot, and when constants overlap the one declared
    /// last wins.
    pub fn from_module(module: &ShaderModule) -> Self {
        let mut info = Self::default();
        for constant in module.push_constants() {
            let end = constant.offset.saturating_add(constant.size);
            for slot in constant.offset..end.min(MAX_PUSH_CONSTANTS) {
                info.types[slot as usize] = constant.ty;
                info.mask |= 1 << slot;
            }
        }
        info
    }

    /// A bitmask of the slots declared by the stage.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Returns the declared type of `slot`, if the stage declares it.
    pub fn slot_type(&self, slot: u32) -> Option<PushConstantType> {
        if slot < MAX_PUSH_CONSTANTS && self.mask & (1 << slot) != 0 {
            Some(self.types[slot as usize])
        } else {
            None
        }
    }
}

/// Everything a [`Pipeline`] is constructed from.
#[derive(Debug)]
pub(crate) struct PipelineDescriptor {
    pub(crate) stage_mask: ShaderStageFlags,
    pub(crate) stages: [Option<StageInfo>; 3],
    pub(crate) layout: GpuRef<PipelineLayout>,
    pub(crate) input_state: GpuRef<InputState>,
}

/// An immutable, validated pipeline.
#[derive(Debug)]
pub struct Pipeline {
    tracked: TrackedObject,
    stage_mask: ShaderStageFlags,
    layout: GpuRef<PipelineLayout>,
    input_state: GpuRef<InputState>,
    stages: [Option<StageInfo>; 3],
    push_constants: [PushConstantInfo; 3],
}

impl GpuObject for Pipeline {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl Pipeline {
    pub(crate) fn new(
        device: &Device,
        descriptor: PipelineDescriptor,
    ) -> Result<Self, PipelineError> {
        let PipelineDescriptor {
            stage_mask,
            stages,
            layout,
            input_state,
        } = descriptor;

        if stage_mask != ShaderStageFlags::GRAPHICS && stage_mask != ShaderStageFlags::COMPUTE {
            return Err(PipelineError::InvalidStageCombination(stage_mask));
        }

        let mut push_constants = [PushConstantInfo::default(); 3];
        for stage in stage_mask.stages() {
            let Some(info) = &stages[stage.index()] else {
                continue;
            };
            info.module
                .check_compatible_with_pipeline_layout(&layout)
                .map_err(|mismatch| PipelineError::IncompatibleLayout { stage, mismatch })?;
            push_constants[stage.index()] = PushConstantInfo::from_module(&info.module);
        }

        if stage_mask == ShaderStageFlags::GRAPHICS {
            if let Some(vertex) = &stages[ShaderStage::Vertex.index()] {
                let missing = vertex
                    .module
                    .used_vertex_attributes()
                    .missing_from(input_state.attributes_set_mask());
                if !missing.is_empty() {
                    return Err(PipelineError::MissingVertexAttributes { missing });
                }
            }
        }

        Ok(Self {
            tracked: device.register(ObjectKind::Pipeline),
            stage_mask,
            layout,
            input_state,
            stages,
            push_constants,
        })
    }

    /// The stages of the pipeline.
    pub fn stage_mask(&self) -> ShaderStageFlags {
        self.stage_mask
    }

    /// Returns `true` for a compute pipeline.
    pub fn is_compute(&self) -> bool {
        self.stage_mask == ShaderStageFlags::COMPUTE
    }

    /// The layout the pipeline was built against.
    pub fn layout(&self) -> &GpuRef<PipelineLayout> {
        &self.layout
    }

    /// The vertex input description of the pipeline.
    pub fn input_state(&self) -> &GpuRef<InputState> {
        &self.input_state
    }

    /// Returns the module and entry point of `stage`.
    pub fn stage(&self, stage: ShaderStage) -> Option<&StageInfo> {
        self.stages[stage.index()].as_ref()
    }

    /// The push-constant slots of `stage`. Empty for stages the pipeline lacks.
    pub fn push_constants(&self, stage: ShaderStage) -> &PushConstantInfo {
        &self.push_constants[stage.index()]
    }
}

/// Accumulates the stages and dependent objects of a [`Pipeline`].
#[derive(Debug)]
pub struct PipelineBuilder {
    base: BuilderBase,
    stage_mask: ShaderStageFlags,
    stages: [Option<StageInfo>; 3],
    layout: Option<GpuRef<PipelineLayout>>,
    input_state: Option<GpuRef<InputState>>,
}

impl PipelineBuilder {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            base: BuilderBase::new(device),
            stage_mask: ShaderStageFlags::EMPTY,
            stages: Default::default(),
            layout: None,
            input_state: None,
        }
    }

    /// Assigns `module` to `stage`.
    ///
    /// Fails if `entry_point` is not [`ENTRY_POINT`], if the module was written
    /// for another stage, or if the stage is already set.
    pub fn set_stage(
        &mut self,
        stage: ShaderStage,
        module: &GpuRef<ShaderModule>,
        entry_point: &str,
    ) -> Result<(), PipelineError> {
        self.base.check(PipelineError::BuilderPoisoned)?;

        if entry_point != ENTRY_POINT {
            return Err(self
                .base
                .fail(PipelineError::InvalidEntryPoint(entry_point.to_owned())));
        }

        let execution_model = module.execution_model();
        if execution_model != stage {
            return Err(self.base.fail(PipelineError::ExecutionModelMismatch {
                stage,
                module: execution_model,
            }));
        }

        if self.stage_mask.contains_stage(stage) {
            return Err(self.base.fail(PipelineError::StageAlreadySet(stage)));
        }

        self.stage_mask.insert(ShaderStageFlags::from_stage(stage));
        self.stages[stage.index()] = Some(StageInfo {
            module: module.clone(),
            entry_point: entry_point.to_owned(),
        });
        Ok(())
    }

    /// Sets the pipeline layout. Defaults to an empty layout.
    pub fn set_layout(&mut self, layout: &GpuRef<PipelineLayout>) -> Result<(), PipelineError> {
        self.base.check(PipelineError::BuilderPoisoned)?;
        self.layout = Some(layout.clone());
        Ok(())
    }

    /// Sets the input state. Defaults to an input state without attributes.
    pub fn set_input_state(
        &mut self,
        input_state: &GpuRef<InputState>,
    ) -> Result<(), PipelineError> {
        self.base.check(PipelineError::BuilderPoisoned)?;
        self.input_state = Some(input_state.clone());
        Ok(())
    }

    /// The stages set so far.
    pub fn stage_mask(&self) -> ShaderStageFlags {
        self.stage_mask
    }

    /// Returns the module and entry point assigned to `stage`.
    pub fn stage_info(&self, stage: ShaderStage) -> Option<&StageInfo> {
        self.stages[stage.index()].as_ref()
    }
}

impl Builder for PipelineBuilder {
    type Output = GpuRef<Pipeline>;
    type Error = PipelineError;

    fn device(&self) -> &Device {
        self.base.device()
    }

    fn finish(self) -> Result<GpuRef<Pipeline>, PipelineError> {
        let Self {
            base,
            stage_mask,
            stages,
            layout,
            input_state,
        } = self;
        base.check(PipelineError::BuilderPoisoned)?;

        let device = base.into_device();
        let layout =
            layout.unwrap_or_else(|| device.create_pipeline_layout_builder().build());
        let input_state =
            input_state.unwrap_or_else(|| device.create_input_state_builder().build());

        device.create_pipeline(PipelineDescriptor {
            stage_mask,
            stages,
            layout,
            input_state,
        })
    }

    fn consumed_error() -> PipelineError {
        PipelineError::BuilderConsumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::config::DeviceConfig;
    use crate::flags::VertexAttributeMask;
    use crate::shader::{PushConstantDecl, ShaderModuleDescriptor};

    fn device() -> Device {
        Device::new(DeviceConfig::default(), NullBackend::new()).unwrap()
    }

    fn decl(name: &str, offset: u32, size: u32, ty: PushConstantType) -> PushConstantDecl {
        PushConstantDecl {
            name: name.to_string(),
            offset,
            size,
            ty,
        }
    }

    fn compute_module(device: &Device, push_constants: &[PushConstantDecl]) -> GpuRef<ShaderModule> {
        device
            .create_shader_module(&ShaderModuleDescriptor {
                label: None,
                execution_model: ShaderStage::Compute,
                push_constants,
                bindings: &[],
                used_vertex_attributes: VertexAttributeMask::EMPTY,
            })
            .unwrap()
    }

    #[test]
    fn push_constant_ranges_take_the_declared_type() {
        let device = device();
        let module = compute_module(
            &device,
            &[
                decl("count", 0, 1, PushConstantType::UInt),
                decl("color", 2, 4, PushConstantType::Float),
                decl("unused", 8, 0, PushConstantType::Int),
            ],
        );
        let info = PushConstantInfo::from_module(&module);

        assert_eq!(info.mask(), 0b11_1101);
        assert_eq!(info.slot_type(0), Some(PushConstantType::UInt));
        assert_eq!(info.slot_type(1), None);
        for slot in 2..6 {
            assert_eq!(info.slot_type(slot), Some(PushConstantType::Float));
        }
        assert_eq!(info.slot_type(8), None);
    }

    #[test]
    fn overlapping_push_constants_keep_the_last_declaration() {
        let device = device();
        let module = compute_module(
            &device,
            &[
                decl("a", 0, 4, PushConstantType::Float),
                decl("b", 2, 2, PushConstantType::Int),
            ],
        );
        let info = PushConstantInfo::from_module(&module);
        assert_eq!(info.slot_type(1), Some(PushConstantType::Float));
        assert_eq!(info.slot_type(2), Some(PushConstantType::Int));
        assert_eq!(info.slot_type(3), Some(PushConstantType::Int));
    }

    #[test]
    fn compute_pipeline_gets_default_layout_and_input_state() {
        let device = device();
        let module = compute_module(&device, &[decl("n", 0, 1, PushConstantType::UInt)]);

        let mut builder = device.create_pipeline_builder();
        builder.set_stage(ShaderStage::Compute, &module, "main").unwrap();
        let pipeline = builder.finish().unwrap();

        assert!(pipeline.is_compute());
        assert_eq!(pipeline.layout().bind_groups_layouts_mask(), 0);
        assert!(pipeline.input_state().attributes_set_mask().is_empty());
        assert_eq!(
            pipeline.push_constants(ShaderStage::Compute).slot_type(0),
            Some(PushConstantType::UInt)
        );
        assert_eq!(pipeline.push_constants(ShaderStage::Vertex).mask(), 0);
        assert!(pipeline
            .stage(ShaderStage::Compute)
            .unwrap()
            .module
            .ptr_eq(&module));
    }

    #[test]
    fn wrong_entry_point_poisons_the_builder() {
        let device = device();
        let module = compute_module(&device, &[]);

        let mut builder = device.create_pipeline_builder();
        assert_eq!(
            builder.set_stage(ShaderStage::Compute, &module, "cs_main"),
            Err(PipelineError::InvalidEntryPoint("cs_main".to_string()))
        );
        assert!(builder.stage_info(ShaderStage::Compute).is_none());
        assert_eq!(
            builder.set_stage(ShaderStage::Compute, &module, "main"),
            Err(PipelineError::BuilderPoisoned)
        );
        assert_eq!(builder.finish().unwrap_err(), PipelineError::BuilderPoisoned);
        assert_eq!(device.stats().errors_reported, 1);
    }
}
