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
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingMismatch,
    BindingType, Builder, BuilderSlot, ErrorKind, GpuRef, InputStepMode, ObjectKind, Pipeline,
    PipelineError, PipelineLayout, PushConstantDecl, PushConstantType, ShaderBinding,
    ShaderModule, ShaderStage, ShaderStageFlags, VertexAttributeMask, VertexFormat, ENTRY_POINT,
};
use common::{null_device, plain_shader, shader};

#[test]
fn test_only_graphics_or_compute_stage_masks_are_accepted() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let vertex = plain_shader(&device, ShaderStage::Vertex)?;
    let fragment = plain_shader(&device, ShaderStage::Fragment)?;
    let compute = plain_shader(&device, ShaderStage::Compute)?;

    let module_for = |stage: ShaderStage| match stage {
        ShaderStage::Vertex => &vertex,
        ShaderStage::Fragment => &fragment,
        ShaderStage::Compute => &compute,
    };

    // Every subset of the three stages.
    for bits in 0..=ShaderStageFlags::ALL.bits() {
        let requested = ShaderStageFlags::from_bits_retain(bits);
        let accepted =
            requested == ShaderStageFlags::GRAPHICS || requested == ShaderStageFlags::COMPUTE;

        // --- 2. ACT ---
        let mut builder = device.create_pipeline_builder();
        for stage in requested.stages() {
            builder.set_stage(stage, module_for(stage), ENTRY_POINT)?;
        }
        let mask = builder.stage_mask();
        assert_eq!(mask, requested);
        let result = builder.finish();

        // --- 3. ASSERT ---
        assert_eq!(
            result.is_ok(),
            accepted,
            "Stage mask {mask:?} was not handled as expected"
        );
        if let Err(err) = result {
            assert_eq!(err, PipelineError::InvalidStageCombination(mask));
            assert_eq!(err.kind(), ErrorKind::Composition);
        }
    }
    Ok(())
}

#[test]
fn test_stage_with_wrong_execution_model_stays_unset() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let fragment = plain_shader(&device, ShaderStage::Fragment)?;
    let mut builder = device.create_pipeline_builder();

    // --- 2. ACT ---
    let err = builder
        .set_stage(ShaderStage::Vertex, &fragment, ENTRY_POINT)
        .unwrap_err();

    // --- 3. ASSERT ---
    assert_eq!(
        err,
        PipelineError::ExecutionModelMismatch {
            stage: ShaderStage::Vertex,
            module: ShaderStage::Fragment,
        }
    );
    assert!(
        builder.stage_info(ShaderStage::Vertex).is_none(),
        "A rejected module must not be assigned to the stage"
    );
    assert!(builder.stage_mask().is_empty());
    assert_eq!(
        builder.finish().unwrap_err(),
        PipelineError::BuilderPoisoned,
        "A failed stage assignment poisons the builder"
    );
    Ok(())
}

#[test]
fn test_entry_point_must_be_main() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let compute = plain_shader(&device, ShaderStage::Compute)?;
    let mut builder = device.create_pipeline_builder();

    // --- 2. ACT ---
    let err = builder
        .set_stage(ShaderStage::Compute, &compute, "cs_main")
        .unwrap_err();

    // --- 3. ASSERT ---
    assert_eq!(err, PipelineError::InvalidEntryPoint("cs_main".to_owned()));
    assert!(builder.stage_mask().is_empty());
    Ok(())
}

#[test]
fn test_stage_cannot_be_set_twice() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let first = plain_shader(&device, ShaderStage::Compute)?;
    let second = plain_shader(&device, ShaderStage::Compute)?;
    let mut builder = device.create_pipeline_builder();
    builder.set_stage(ShaderStage::Compute, &first, ENTRY_POINT)?;

    // --- 2. ACT ---
    let err = builder
        .set_stage(ShaderStage::Compute, &second, ENTRY_POINT)
        .unwrap_err();

    // --- 3. ASSERT ---
    assert_eq!(err, PipelineError::StageAlreadySet(ShaderStage::Compute));
    let kept = builder
        .stage_info(ShaderStage::Compute)
        .expect("The first module should stay assigned");
    assert!(kept.module.ptr_eq(&first));
    Ok(())
}

#[test]
fn test_vertex_attributes_must_be_provided_by_the_input_state() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let fragment = plain_shader(&device, ShaderStage::Fragment)?;
    let uses_0_and_1 = shader(
        &device,
        ShaderStage::Vertex,
        &[],
        &[],
        VertexAttributeMask::from_locations(&[0, 1]),
    )?;
    let uses_0 = shader(
        &device,
        ShaderStage::Vertex,
        &[],
        &[],
        VertexAttributeMask::from_locations(&[0]),
    )?;

    let mut input_state = device.create_input_state_builder();
    input_state.set_input(0, 20, InputStepMode::Vertex)?;
    input_state.set_attribute(0, 0, VertexFormat::Float32x3, 0)?;
    input_state.set_attribute(2, 0, VertexFormat::Float32x2, 12)?;
    let input_state = input_state.finish()?;

    let build = |vertex: &GpuRef<ShaderModule>| -> Result<GpuRef<Pipeline>, PipelineError> {
        let mut builder = device.create_pipeline_builder();
        builder.set_stage(ShaderStage::Vertex, vertex, ENTRY_POINT)?;
        builder.set_stage(ShaderStage::Fragment, &fragment, ENTRY_POINT)?;
        builder.set_input_state(&input_state)?;
        builder.finish()
    };

    // --- 2. ACT ---
    let superset = build(&uses_0_and_1);
    let subset = build(&uses_0);

    // --- 3. ASSERT ---
    assert_eq!(
        superset.unwrap_err(),
        PipelineError::MissingVertexAttributes {
            missing: VertexAttributeMask::from_locations(&[1]),
        },
        "Attribute 1 is read by the shader but absent from the input state"
    );
    let pipeline = subset?;
    assert!(
        pipeline.input_state().ptr_eq(&input_state),
        "Extra input state attributes are allowed"
    );
    Ok(())
}

#[test]
fn test_bindings_must_match_the_pipeline_layout() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let reads_uniform = [ShaderBinding {
        group: 0,
        binding: 1,
        ty: BindingType::UniformBuffer,
    }];
    let compute = shader(
        &device,
        ShaderStage::Compute,
        &[],
        &reads_uniform,
        VertexAttributeMask::EMPTY,
    )?;

    let bgl = |visibility, ty| {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("test_bgl"),
            entries: &[BindGroupLayoutEntry {
                binding: 1,
                visibility,
                ty,
            }],
        })
    };
    let layout_with = |group_layout: GpuRef<BindGroupLayout>| -> Result<GpuRef<PipelineLayout>> {
        let mut builder = device.create_pipeline_layout_builder();
        builder.set_bind_group_layout(0, &group_layout)?;
        Ok(builder.finish()?)
    };
    let matching = layout_with(bgl(ShaderStageFlags::COMPUTE, BindingType::UniformBuffer)?)?;
    let invisible = layout_with(bgl(ShaderStageFlags::GRAPHICS, BindingType::UniformBuffer)?)?;
    let wrong_type = layout_with(bgl(ShaderStageFlags::ALL, BindingType::StorageBuffer)?)?;

    type PipelineResult = Result<GpuRef<Pipeline>, PipelineError>;
    let build = |layout: Option<&GpuRef<PipelineLayout>>| -> PipelineResult {
        let mut builder = device.create_pipeline_builder();
        builder.set_stage(ShaderStage::Compute, &compute, ENTRY_POINT)?;
        if let Some(layout) = layout {
            builder.set_layout(layout)?;
        }
        builder.finish()
    };

    // --- 2. ACT ---
    let results = [
        build(None),
        build(Some(&invisible)),
        build(Some(&wrong_type)),
    ];
    let ok = build(Some(&matching));

    // --- 3. ASSERT ---
    let expected = [
        BindingMismatch::Missing {
            group: 0,
            binding: 1,
        },
        BindingMismatch::Invisible {
            group: 0,
            binding: 1,
        },
        BindingMismatch::WrongType {
            group: 0,
            binding: 1,
            shader: BindingType::UniformBuffer,
            layout: BindingType::StorageBuffer,
        },
    ];
    for (result, mismatch) in results.into_iter().zip(expected) {
        assert_eq!(
            result.unwrap_err(),
            PipelineError::IncompatibleLayout {
                stage: ShaderStage::Compute,
                mismatch,
            }
        );
    }
    let pipeline = ok?;
    assert!(pipeline.is_compute());
    assert!(pipeline.layout().ptr_eq(&matching));
    Ok(())
}

#[test]
fn test_push_constants_are_collected_per_stage() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let decl = |name: &str, offset, size, ty| PushConstantDecl {
        name: name.to_owned(),
        offset,
        size,
        ty,
    };
    let vertex = shader(
        &device,
        ShaderStage::Vertex,
        &[
            decl("scale", 0, 2, PushConstantType::Float),
            decl("index", 1, 1, PushConstantType::UInt),
            decl("unused", 8, 0, PushConstantType::Int),
        ],
        &[],
        VertexAttributeMask::EMPTY,
    )?;
    let fragment = shader(
        &device,
        ShaderStage::Fragment,
        &[decl("tint", 4, 3, PushConstantType::Int)],
        &[],
        VertexAttributeMask::EMPTY,
    )?;

    let mut builder = device.create_pipeline_builder();
    builder.set_stage(ShaderStage::Vertex, &vertex, ENTRY_POINT)?;
    builder.set_stage(ShaderStage::Fragment, &fragment, ENTRY_POINT)?;

    // --- 2. ACT ---
    let pipeline = builder.finish()?;

    // --- 3. ASSERT ---
    let vertex_info = pipeline.push_constants(ShaderStage::Vertex);
    assert_eq!(vertex_info.mask(), 0b11, "Zero-size constants claim no slot");
    assert_eq!(vertex_info.slot_type(0), Some(PushConstantType::Float));
    assert_eq!(
        vertex_info.slot_type(1),
        Some(PushConstantType::UInt),
        "The constant declared last wins an overlapping slot"
    );
    assert_eq!(vertex_info.slot_type(8), None);

    let fragment_info = pipeline.push_constants(ShaderStage::Fragment);
    assert_eq!(fragment_info.mask(), 0b111_0000);
    assert_eq!(fragment_info.slot_type(5), Some(PushConstantType::Int));

    assert_eq!(pipeline.push_constants(ShaderStage::Compute).mask(), 0);
    Ok(())
}

#[test]
fn test_builder_slot_creates_a_single_pipeline() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let errors = device.subscribe_errors();
    let compute = plain_shader(&device, ShaderStage::Compute)?;
    let mut slot = BuilderSlot::new(device.create_pipeline_builder());
    slot.get_mut()?
        .set_stage(ShaderStage::Compute, &compute, ENTRY_POINT)?;

    // --- 2. ACT ---
    let first = slot.get_result();
    let second = slot.get_result();

    // --- 3. ASSERT ---
    assert!(first.is_ok(), "The first result should be a pipeline");
    assert_eq!(second.unwrap_err(), PipelineError::BuilderConsumed);
    assert!(slot.was_consumed());
    assert_eq!(
        device.stats().objects.created(ObjectKind::Pipeline),
        1,
        "Asking twice must not create a second pipeline"
    );
    assert_eq!(
        errors.try_recv()?,
        PipelineError::BuilderConsumed.into(),
        "The second request is reported on the error channel"
    );
    Ok(())
}

#[test]
fn test_default_layout_and_input_state_are_empty() -> Result<()> {
    // --- 1. ARRANGE ---
    let (device, _) = null_device()?;
    let vertex = plain_shader(&device, ShaderStage::Vertex)?;
    let fragment = plain_shader(&device, ShaderStage::Fragment)?;
    let mut builder = device.create_pipeline_builder();
    builder.set_stage(ShaderStage::Vertex, &vertex, ENTRY_POINT)?;
    builder.set_stage(ShaderStage::Fragment, &fragment, ENTRY_POINT)?;

    // --- 2. ACT ---
    let pipeline = builder.finish()?;

    // --- 3. ASSERT ---
    assert!(!pipeline.is_compute());
    assert_eq!(pipeline.stage_mask(), ShaderStageFlags::GRAPHICS);
    assert_eq!(pipeline.layout().bind_groups_layouts_mask(), 0);
    assert!(pipeline.input_state().attributes_set_mask().is_empty());
    assert!(pipeline
        .stage(ShaderStage::Vertex)
        .is_some_and(|info| info.entry_point == ENTRY_POINT));
    Ok(())
}
