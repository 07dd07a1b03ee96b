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

//! Defines pipeline layouts and their builder.

use crate::binding::BindGroupLayout;
use crate::builder::{Builder, BuilderBase};
use crate::device::Device;
use crate::error::ResourceError;
use crate::object::{GpuObject, GpuRef, ObjectKind, TrackedObject};
use crate::MAX_BIND_GROUPS;

const GROUP_COUNT: usize = MAX_BIND_GROUPS as usize;

/// The bind group layouts a pipeline is built against.
#[derive(Debug)]
pub struct PipelineLayout {
    tracked: TrackedObject,
    bind_group_layouts: [Option<GpuRef<BindGroupLayout>>; GROUP_COUNT],
}

impl GpuObject for PipelineLayout {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl PipelineLayout {
    /// Returns the layout of bind group `group`, if one was set.
    pub fn bind_group_layout(&self, group: u32) -> Option<&GpuRef<BindGroupLayout>> {
        self.bind_group_layouts
            .get(group as usize)
            .and_then(Option::as_ref)
    }

    /// A bitmask of the groups that have a layout.
    pub fn bind_groups_layouts_mask(&self) -> u32 {
        self.bind_group_layouts
            .iter()
            .enumerate()
            .filter(|(_, layout)| layout.is_some())
            .fold(0, |mask, (group, _)| mask | 1 << group)
    }
}

/// Accumulates the bind group layouts of a [`PipelineLayout`].
#[derive(Debug)]
pub struct PipelineLayoutBuilder {
    base: BuilderBase,
    bind_group_layouts: [Option<GpuRef<BindGroupLayout>>; GROUP_COUNT],
}

impl PipelineLayoutBuilder {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            base: BuilderBase::new(device),
            bind_group_layouts: Default::default(),
        }
    }

    /// Sets the layout of bind group `group`. Each group may be set once.
    pub fn set_bind_group_layout(
        &mut self,
        group: u32,
        layout: &GpuRef<BindGroupLayout>,
    ) -> Result<(), ResourceError> {
        self.base.check(ResourceError::BuilderPoisoned)?;
        let Some(slot) = self.bind_group_layouts.get_mut(group as usize) else {
            return Err(self
                .base
                .fail(ResourceError::BindGroupIndexOutOfRange(group)));
        };
        if slot.is_some() {
            return Err(self.base.fail(ResourceError::BindGroupLayoutSetTwice(group)));
        }
        *slot = Some(layout.clone());
        Ok(())
    }

    /// Builds the layout without validation. Used for the device default.
    pub(crate) fn build(self) -> GpuRef<PipelineLayout> {
        let Self {
            base,
            bind_group_layouts,
        } = self;
        GpuRef::new(PipelineLayout {
            tracked: base.device().register(ObjectKind::PipelineLayout),
            bind_group_layouts,
        })
    }
}

impl Builder for PipelineLayoutBuilder {
    type Output = GpuRef<PipelineLayout>;
    type Error = ResourceError;

    fn device(&self) -> &Device {
        self.base.device()
    }

    fn finish(self) -> Result<GpuRef<PipelineLayout>, ResourceError> {
        self.base.check(ResourceError::BuilderPoisoned)?;
        Ok(self.build())
    }

    fn consumed_error() -> ResourceError {
        ResourceError::BuilderConsumed
    }
}
