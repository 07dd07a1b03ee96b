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

//! Defines textures and their builder.

use super::{is_usage_possible, UsageBits, UsageState};
use crate::aster_bitflags;
use crate::builder::{Builder, BuilderBase};
use crate::device::Device;
use crate::enums::{TextureDimension, TextureFormat};
use crate::error::ResourceError;
use crate::object::{GpuObject, GpuRef, ObjectKind, TrackedObject};
use std::sync::{Mutex, MutexGuard, PoisonError};

aster_bitflags! {
    /// A set of flags describing the usages of a [`Texture`].
    pub struct TextureUsage: u32 {
        /// The texture can be the source of a copy operation.
        const TRANSFER_SRC = 1 << 0;
        /// The texture can be the destination of a copy operation.
        const TRANSFER_DST = 1 << 1;
        /// The texture can be sampled in a shader.
        const SAMPLED = 1 << 2;
        /// The texture can be bound as a storage texture.
        const STORAGE = 1 << 3;
        /// The texture can be rendered to.
        const COLOR_ATTACHMENT = 1 << 4;
    }
}

impl UsageBits for TextureUsage {
    const READ_ONLY: Self = Self::TRANSFER_SRC.union(Self::SAMPLED);

    fn to_bits(self) -> u32 {
        self.bits()
    }
}

/// The size of a texture or of one of its mip levels, in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth (or layer count) in texels.
    pub depth: u32,
}

impl Extent3d {
    /// Returns the size of mip level `level`. Every axis is at least 1.
    pub fn mip_level_size(&self, level: u32) -> Extent3d {
        let shrink = |size: u32| size.checked_shr(level).unwrap_or(0).max(1);
        Extent3d {
            width: shrink(self.width),
            height: shrink(self.height),
            depth: shrink(self.depth),
        }
    }

    /// The number of texels covered by the extent.
    pub fn texel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.depth)
    }
}

/// A GPU texture.
#[derive(Debug)]
pub struct Texture {
    tracked: TrackedObject,
    device: Device,
    dimension: TextureDimension,
    format: TextureFormat,
    extent: Extent3d,
    mip_levels: u32,
    state: Mutex<UsageState<TextureUsage>>,
}

impl GpuObject for Texture {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl Texture {
    /// The dimensionality of the texture.
    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    /// The texel format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// The size of mip level 0.
    pub fn extent(&self) -> Extent3d {
        self.extent
    }

    /// The number of mip levels.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// The usages the texture may ever be transitioned to.
    pub fn allowed_usage(&self) -> TextureUsage {
        self.state().allowed
    }

    /// The current usage of the texture.
    pub fn usage(&self) -> TextureUsage {
        self.state().current
    }

    /// Returns `true` once the usage of the texture is pinned.
    pub fn is_frozen(&self) -> bool {
        self.state().frozen
    }

    /// Returns `true` if the texture is frozen with a usage that intersects `usage`.
    pub fn has_frozen_usage(&self, usage: TextureUsage) -> bool {
        self.state().has_frozen_usage(usage)
    }

    /// Returns `true` if `usage` is allowed by `allowed` and is either read-only
    /// or a single usage.
    pub fn is_usage_possible(allowed: TextureUsage, usage: TextureUsage) -> bool {
        is_usage_possible(allowed, usage)
    }

    /// Returns `true` if the texture is not frozen and `usage` is possible.
    pub fn is_transition_possible(&self, usage: TextureUsage) -> bool {
        self.state().is_transition_possible(usage)
    }

    /// Changes the current usage of the texture.
    pub fn transition_usage(&self, usage: TextureUsage) -> Result<(), ResourceError> {
        if !self.state().transition(usage) {
            return Err(self
                .device
                .report(ResourceError::FrozenOrUsageNotAllowed(self.id())));
        }
        log::trace!("Texture {} transitioned to {usage:?}", self.id());
        Ok(())
    }

    /// Pins the usage of the texture for the rest of its life.
    pub fn freeze_usage(&self, usage: TextureUsage) -> Result<(), ResourceError> {
        if !self.state().freeze(usage) {
            return Err(self
                .device
                .report(ResourceError::FrozenOrUsageNotAllowed(self.id())));
        }
        log::debug!("Texture {} frozen as {usage:?}", self.id());
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, UsageState<TextureUsage>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

const TEXTURE_PROPERTY_DIMENSION: u8 = 0x1;
const TEXTURE_PROPERTY_EXTENT: u8 = 0x2;
const TEXTURE_PROPERTY_FORMAT: u8 = 0x4;
const TEXTURE_PROPERTY_MIP_LEVELS: u8 = 0x8;
const TEXTURE_PROPERTY_ALLOWED_USAGE: u8 = 0x10;
const TEXTURE_PROPERTY_INITIAL_USAGE: u8 = 0x20;

/// Accumulates the properties of a [`Texture`].
#[derive(Debug)]
pub struct TextureBuilder {
    base: BuilderBase,
    dimension: TextureDimension,
    extent: Extent3d,
    format: TextureFormat,
    mip_levels: u32,
    allowed_usage: TextureUsage,
    initial_usage: TextureUsage,
    properties_set: u8,
}

impl TextureBuilder {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            base: BuilderBase::new(device),
            dimension: TextureDimension::default(),
            extent: Extent3d {
                width: 0,
                height: 0,
                depth: 0,
            },
            format: TextureFormat::Rgba8Unorm,
            mip_levels: 1,
            allowed_usage: TextureUsage::EMPTY,
            initial_usage: TextureUsage::EMPTY,
            properties_set: 0,
        }
    }

    /// Sets the dimensionality. Defaults to 2D.
    pub fn set_dimension(&mut self, dimension: TextureDimension) -> Result<(), ResourceError> {
        self.claim_property(TEXTURE_PROPERTY_DIMENSION, "dimension")?;
        self.dimension = dimension;
        Ok(())
    }

    /// Sets the size of mip level 0.
    pub fn set_extent(&mut self, width: u32, height: u32, depth: u32) -> Result<(), ResourceError> {
        self.claim_property(TEXTURE_PROPERTY_EXTENT, "extent")?;
        self.extent = Extent3d {
            width,
            height,
            depth,
        };
        Ok(())
    }

    /// Sets the texel format.
    pub fn set_format(&mut self, format: TextureFormat) -> Result<(), ResourceError> {
        self.claim_property(TEXTURE_PROPERTY_FORMAT, "format")?;
        self.format = format;
        Ok(())
    }

    /// Sets the number of mip levels. Defaults to 1.
    pub fn set_mip_levels(&mut self, mip_levels: u32) -> Result<(), ResourceError> {
        self.claim_property(TEXTURE_PROPERTY_MIP_LEVELS, "mipLevels")?;
        if mip_levels == 0 {
            return Err(self.base.fail(ResourceError::ZeroMipLevels));
        }
        self.mip_levels = mip_levels;
        Ok(())
    }

    /// Sets the usages the texture may ever be transitioned to.
    pub fn set_allowed_usage(&mut self, usage: TextureUsage) -> Result<(), ResourceError> {
        self.claim_property(TEXTURE_PROPERTY_ALLOWED_USAGE, "allowedUsage")?;
        self.allowed_usage = usage;
        Ok(())
    }

    /// Sets the usage the texture starts in. Defaults to no usage.
    pub fn set_initial_usage(&mut self, usage: TextureUsage) -> Result<(), ResourceError> {
        self.claim_property(TEXTURE_PROPERTY_INITIAL_USAGE, "initialUsage")?;
        self.initial_usage = usage;
        Ok(())
    }

    fn claim_property(&mut self, bit: u8, property: &'static str) -> Result<(), ResourceError> {
        self.base.check(ResourceError::BuilderPoisoned)?;
        if self.properties_set & bit != 0 {
            return Err(self.base.fail(ResourceError::PropertySetTwice {
                object: "texture",
                property,
            }));
        }
        self.properties_set |= bit;
        Ok(())
    }
}

fn extent_fits_dimension(dimension: TextureDimension, extent: Extent3d) -> bool {
    if extent.width == 0 || extent.height == 0 || extent.depth == 0 {
        return false;
    }
    match dimension {
        TextureDimension::D1 => extent.height == 1 && extent.depth == 1,
        TextureDimension::D2 => extent.depth == 1,
        TextureDimension::D3 => true,
    }
}

impl Builder for TextureBuilder {
    type Output = GpuRef<Texture>;
    type Error = ResourceError;

    fn device(&self) -> &Device {
        self.base.device()
    }

    fn finish(self) -> Result<GpuRef<Texture>, ResourceError> {
        let Self {
            mut base,
            dimension,
            extent,
            format,
            mip_levels,
            allowed_usage,
            initial_usage,
            properties_set,
        } = self;
        base.check(ResourceError::BuilderPoisoned)?;

        for (bit, property) in [
            (TEXTURE_PROPERTY_EXTENT, "extent"),
            (TEXTURE_PROPERTY_FORMAT, "format"),
            (TEXTURE_PROPERTY_ALLOWED_USAGE, "allowedUsage"),
        ] {
            if properties_set & bit == 0 {
                return Err(base.fail(ResourceError::MissingProperty {
                    object: "texture",
                    property,
                }));
            }
        }

        if !extent_fits_dimension(dimension, extent) {
            return Err(base.fail(ResourceError::InvalidExtent {
                dimension,
                width: extent.width,
                height: extent.height,
                depth: extent.depth,
            }));
        }

        if !Texture::is_usage_possible(allowed_usage, initial_usage) {
            return Err(base.fail(ResourceError::InitialUsageNotAllowed { object: "texture" }));
        }

        let device = base.into_device();
        let texture = Texture {
            tracked: device.register(ObjectKind::Texture),
            dimension,
            format,
            extent,
            mip_levels,
            state: Mutex::new(UsageState::new(allowed_usage, initial_usage)),
            device,
        };
        log::debug!(
            "Created {dimension:?} texture {} ({}x{}x{}, {format:?}, {mip_levels} mips)",
            texture.id(),
            extent.width,
            extent.height,
            extent.depth
        );
        Ok(GpuRef::new(texture))
    }

    fn consumed_error() -> ResourceError {
        ResourceError::BuilderConsumed
    }
}
