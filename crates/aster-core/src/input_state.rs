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

//! Defines the vertex input description of a graphics pipeline.

use crate::builder::{Builder, BuilderBase};
use crate::device::Device;
use crate::enums::{InputStepMode, VertexFormat};
use crate::error::ResourceError;
use crate::flags::VertexAttributeMask;
use crate::object::{GpuObject, GpuRef, ObjectKind, TrackedObject};
use crate::{MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_INPUTS};

const ATTRIBUTE_COUNT: usize = MAX_VERTEX_ATTRIBUTES as usize;
const INPUT_COUNT: usize = MAX_VERTEX_INPUTS as usize;

/// A vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInput {
    /// The distance in bytes between two elements.
    pub stride: u32,
    /// How often the slot advances.
    pub step_mode: InputStepMode,
}

/// A vertex attribute read from one of the input slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// The slot the attribute is read from.
    pub input_slot: u32,
    /// The memory format of the attribute.
    pub format: VertexFormat,
    /// The offset of the attribute within an element, in bytes.
    pub offset: u32,
}

/// Describes how vertex attributes are fetched from vertex buffers.
#[derive(Debug)]
pub struct InputState {
    tracked: TrackedObject,
    inputs: [Option<VertexInput>; INPUT_COUNT],
    attributes: [Option<VertexAttribute>; ATTRIBUTE_COUNT],
    attributes_set_mask: VertexAttributeMask,
}

impl GpuObject for InputState {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl InputState {
    /// The locations of every attribute the input state provides.
    pub fn attributes_set_mask(&self) -> VertexAttributeMask {
        self.attributes_set_mask
    }

    /// Returns the attribute at `location`.
    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes
            .get(location as usize)
            .and_then(Option::as_ref)
    }

    /// Returns the input at `slot`.
    pub fn input(&self, slot: u32) -> Option<&VertexInput> {
        self.inputs.get(slot as usize).and_then(Option::as_ref)
    }

    /// A bitmask of the declared input slots.
    pub fn inputs_set_mask(&self) -> u32 {
        self.inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| input.is_some())
            .fold(0, |mask, (slot, _)| mask | 1 << slot)
    }
}

/// Accumulates the inputs and attributes of an [`InputState`].
#[derive(Debug)]
pub struct InputStateBuilder {
    base: BuilderBase,
    inputs: [Option<VertexInput>; INPUT_COUNT],
    attributes: [Option<VertexAttribute>; ATTRIBUTE_COUNT],
}

impl InputStateBuilder {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            base: BuilderBase::new(device),
            inputs: [None; INPUT_COUNT],
            attributes: [None; ATTRIBUTE_COUNT],
        }
    }

    /// Declares the vertex buffer slot `slot`.
    pub fn set_input(
        &mut self,
        slot: u32,
        stride: u32,
        step_mode: InputStepMode,
    ) -> Result<(), ResourceError> {
        self.base.check(ResourceError::BuilderPoisoned)?;
        let Some(input) = self.inputs.get_mut(slot as usize) else {
            return Err(self.base.fail(ResourceError::InputSlotOutOfRange(slot)));
        };
        if input.is_some() {
            return Err(self.base.fail(ResourceError::InputSetTwice(slot)));
        }
        *input = Some(VertexInput { stride, step_mode });
        Ok(())
    }

    /// Declares the attribute at `location`, read from `input_slot`.
    pub fn set_attribute(
        &mut self,
        location: u32,
        input_slot: u32,
        format: VertexFormat,
        offset: u32,
    ) -> Result<(), ResourceError> {
        self.base.check(ResourceError::BuilderPoisoned)?;
        if input_slot >= MAX_VERTEX_INPUTS {
            return Err(self
                .base
                .fail(ResourceError::InputSlotOutOfRange(input_slot)));
        }
        let Some(attribute) = self.attributes.get_mut(location as usize) else {
            return Err(self.base.fail(ResourceError::AttributeOutOfRange(location)));
        };
        if attribute.is_some() {
            return Err(self.base.fail(ResourceError::AttributeSetTwice(location)));
        }
        *attribute = Some(VertexAttribute {
            input_slot,
            format,
            offset,
        });
        Ok(())
    }

    /// Builds the input state without validation. Used for the device default.
    pub(crate) fn build(self) -> GpuRef<InputState> {
        let attributes_set_mask = (0..MAX_VERTEX_ATTRIBUTES)
            .filter(|location| self.attributes[*location as usize].is_some())
            .fold(VertexAttributeMask::EMPTY, VertexAttributeMask::with);
        GpuRef::new(InputState {
            tracked: self.base.device().register(ObjectKind::InputState),
            inputs: self.inputs,
            attributes: self.attributes,
            attributes_set_mask,
        })
    }
}

impl Builder for InputStateBuilder {
    type Output = GpuRef<InputState>;
    type Error = ResourceError;

    fn device(&self) -> &Device {
        self.base.device()
    }

    fn finish(mut self) -> Result<GpuRef<InputState>, ResourceError> {
        self.base.check(ResourceError::BuilderPoisoned)?;

        let undeclared = self.attributes.iter().enumerate().find_map(|(location, attribute)| {
            attribute
                .filter(|attribute| self.inputs[attribute.input_slot as usize].is_none())
                .map(|attribute| (location as u32, attribute.input_slot))
        });
        if let Some((location, slot)) = undeclared {
            return Err(self
                .base
                .fail(ResourceError::AttributeInputNotDeclared { location, slot }));
        }

        Ok(self.build())
    }

    fn consumed_error() -> ResourceError {
        ResourceError::BuilderConsumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::config::DeviceConfig;

    fn device() -> Device {
        Device::new(DeviceConfig::default(), NullBackend::new()).unwrap()
    }

    #[test]
    fn attribute_mask_tracks_locations() {
        let device = device();
        let mut builder = device.create_input_state_builder();
        builder.set_input(0, 20, InputStepMode::Vertex).unwrap();
        builder
            .set_attribute(0, 0, VertexFormat::Float32x3, 0)
            .unwrap();
        builder
            .set_attribute(3, 0, VertexFormat::Float32x2, 12)
            .unwrap();
        let state = builder.finish().unwrap();

        assert_eq!(state.attributes_set_mask(), VertexAttributeMask::from_bits(0b1001));
        assert_eq!(state.inputs_set_mask(), 0b1);
        assert_eq!(state.attribute(3).unwrap().offset, 12);
        assert!(state.attribute(1).is_none());
    }

    #[test]
    fn attribute_on_undeclared_slot_is_rejected() {
        let device = device();
        let mut builder = device.create_input_state_builder();
        builder
            .set_attribute(1, 2, VertexFormat::Float32, 0)
            .unwrap();
        assert_eq!(
            builder.finish().unwrap_err(),
            ResourceError::AttributeInputNotDeclared {
                location: 1,
                slot: 2
            }
        );
    }

    #[test]
    fn limits_and_duplicates_poison_the_builder() {
        let device = device();
        let mut builder = device.create_input_state_builder();
        assert_eq!(
            builder.set_attribute(MAX_VERTEX_ATTRIBUTES, 0, VertexFormat::Float32, 0),
            Err(ResourceError::AttributeOutOfRange(MAX_VERTEX_ATTRIBUTES))
        );
        assert_eq!(
            builder.set_input(0, 4, InputStepMode::Instance),
            Err(ResourceError::BuilderPoisoned)
        );

        let mut builder = device.create_input_state_builder();
        builder.set_input(1, 4, InputStepMode::Instance).unwrap();
        assert_eq!(
            builder.set_input(1, 8, InputStepMode::Vertex),
            Err(ResourceError::InputSetTwice(1))
        );
    }
}
