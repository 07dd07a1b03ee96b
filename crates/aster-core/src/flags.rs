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

//! Flag sets over shader stages and vertex attribute locations.

use super::enums::ShaderStage;
use crate::aster_bitflags;
use crate::MAX_VERTEX_ATTRIBUTES;

aster_bitflags! {
    /// Flags representing a set of shader stages.
    ///
    /// Used as the stage mask of a pipeline, as the visibility of a bind group
    /// layout entry, and as the target of a push-constant update.
    pub struct ShaderStageFlags: u32 {
        /// Vertex shader stage.
        const VERTEX = 1 << 0;
        /// Fragment shader stage.
        const FRAGMENT = 1 << 1;
        /// Compute shader stage.
        const COMPUTE = 1 << 2;
    }
}

impl ShaderStageFlags {
    /// The graphics stages (vertex + fragment).
    pub const GRAPHICS: Self = Self::VERTEX.union(Self::FRAGMENT);
    /// All stages.
    pub const ALL: Self = Self::GRAPHICS.union(Self::COMPUTE);

    /// Creates flags from a single shader stage.
    pub const fn from_stage(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => Self::VERTEX,
            ShaderStage::Fragment => Self::FRAGMENT,
            ShaderStage::Compute => Self::COMPUTE,
        }
    }

    /// Checks if these flags contain a specific stage.
    pub const fn contains_stage(&self, stage: ShaderStage) -> bool {
        self.contains(Self::from_stage(stage))
    }

    /// Iterates the stages contained in the set, in bit order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL
            .into_iter()
            .filter(move |stage| self.contains_stage(*stage))
    }
}

impl From<ShaderStage> for ShaderStageFlags {
    fn from(stage: ShaderStage) -> Self {
        Self::from_stage(stage)
    }
}

/// A set of vertex attribute locations, one bit per location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexAttributeMask(u32);

impl VertexAttributeMask {
    /// No attribute.
    pub const EMPTY: Self = Self(0);

    /// Creates a mask from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Creates a mask from a list of attribute locations.
    ///
    /// Locations past the 32-bit range are ignored.
    pub fn from_locations(locations: &[u32]) -> Self {
        locations
            .iter()
            .fold(Self::EMPTY, |mask, &location| mask.with(location))
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns a copy of the mask with `location` added.
    #[must_use]
    pub const fn with(self, location: u32) -> Self {
        match 1u32.checked_shl(location) {
            Some(bit) => Self(self.0 | bit),
            None => self,
        }
    }

    /// Returns `true` if `location` is part of the mask.
    pub const fn contains(&self, location: u32) -> bool {
        match 1u32.checked_shl(location) {
            Some(bit) => self.0 & bit != 0,
            None => false,
        }
    }

    /// Returns `true` if no location is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns the locations of `self` that are absent from `provided`.
    #[must_use]
    pub const fn missing_from(self, provided: Self) -> Self {
        Self(self.0 & !provided.0)
    }

    /// Returns `true` if some location lies past [`MAX_VERTEX_ATTRIBUTES`].
    pub const fn exceeds_limit(&self) -> bool {
        (self.0 >> MAX_VERTEX_ATTRIBUTES) != 0
    }

    /// Iterates the locations in the mask in increasing order.
    pub fn locations(self) -> impl Iterator<Item = u32> {
        (0..u32::BITS).filter(move |location| self.contains(*location))
    }
}
