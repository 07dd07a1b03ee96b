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

//! Defines GPU buffers, buffer views and their builders.

use super::{is_usage_possible, UsageBits, UsageState};
use crate::aster_bitflags;
use crate::builder::{BuilderBase, Builder};
use crate::device::Device;
use crate::error::ResourceError;
use crate::object::{GpuObject, GpuRef, ObjectKind, TrackedObject};
use std::sync::{Mutex, MutexGuard, PoisonError};

aster_bitflags! {
    /// A set of flags describing the usages of a [`Buffer`].
    pub struct BufferUsage: u32 {
        /// The buffer can be written from the CPU.
        const MAPPED = 1 << 0;
        /// The buffer can be the source of a copy operation.
        const TRANSFER_SRC = 1 << 1;
        /// The buffer can be the destination of a copy operation.
        const TRANSFER_DST = 1 << 2;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 3;
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 4;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 5;
        /// The buffer can be bound as a storage buffer.
        const STORAGE = 1 << 6;
    }
}

impl UsageBits for BufferUsage {
    const READ_ONLY: Self = Self::TRANSFER_SRC
        .union(Self::INDEX)
        .union(Self::VERTEX)
        .union(Self::UNIFORM);

    fn to_bits(self) -> u32 {
        self.bits()
    }
}

/// A linear GPU buffer.
#[derive(Debug)]
pub struct Buffer {
    tracked: TrackedObject,
    device: Device,
    size: u32,
    state: Mutex<UsageState<BufferUsage>>,
}

impl GpuObject for Buffer {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl Buffer {
    /// The size of the buffer in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The usages the buffer may ever be transitioned to.
    pub fn allowed_usage(&self) -> BufferUsage {
        self.state().allowed
    }

    /// The current usage of the buffer.
    pub fn usage(&self) -> BufferUsage {
        self.state().current
    }

    /// Returns `true` once the usage of the buffer is pinned.
    pub fn is_frozen(&self) -> bool {
        self.state().frozen
    }

    /// Returns `true` if the buffer is frozen with a usage that intersects `usage`.
    pub fn has_frozen_usage(&self, usage: BufferUsage) -> bool {
        self.state().has_frozen_usage(usage)
    }

    /// Returns `true` if `usage` is allowed by `allowed` and is either read-only
    /// or a single usage.
    pub fn is_usage_possible(allowed: BufferUsage, usage: BufferUsage) -> bool {
        is_usage_possible(allowed, usage)
    }

    /// Returns `true` if the buffer is not frozen and `usage` is possible.
    pub fn is_transition_possible(&self, usage: BufferUsage) -> bool {
        self.state().is_transition_possible(usage)
    }

    /// Changes the current usage of the buffer.
    pub fn transition_usage(&self, usage: BufferUsage) -> Result<(), ResourceError> {
        if !self.state().transition(usage) {
            return Err(self
                .device
                .report(ResourceError::FrozenOrUsageNotAllowed(self.id())));
        }
        log::trace!("Buffer {} transitioned to {usage:?}", self.id());
        Ok(())
    }

    /// Pins the usage of the buffer for the rest of its life.
    pub fn freeze_usage(&self, usage: BufferUsage) -> Result<(), ResourceError> {
        if !self.state().freeze(usage) {
            return Err(self
                .device
                .report(ResourceError::FrozenOrUsageNotAllowed(self.id())));
        }
        log::debug!("Buffer {} frozen as {usage:?}", self.id());
        Ok(())
    }

    /// Writes `data` into the buffer, starting at word `start`.
    ///
    /// The buffer must currently be in the [`BufferUsage::MAPPED`] usage.
    pub fn set_sub_data(&self, start: u32, data: &[u32]) -> Result<(), ResourceError> {
        let end_bytes = (u64::from(start) + data.len() as u64) * 4;
        if end_bytes > u64::from(self.size) {
            return Err(self.device.report(ResourceError::SubDataOutOfRange {
                start,
                count: data.len(),
                size: self.size,
            }));
        }

        if !self.usage().contains(BufferUsage::MAPPED) {
            return Err(self
                .device
                .report(ResourceError::BufferNotMapped(self.id())));
        }

        self.device
            .backend()
            .write_buffer(self, start, data)
            .map_err(|e| self.device.report(ResourceError::from(e)))
    }

    fn state(&self) -> MutexGuard<'_, UsageState<BufferUsage>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

const BUFFER_PROPERTY_ALLOWED_USAGE: u8 = 0x1;
const BUFFER_PROPERTY_INITIAL_USAGE: u8 = 0x2;
const BUFFER_PROPERTY_SIZE: u8 = 0x4;

/// Accumulates the properties of a [`Buffer`].
#[derive(Debug)]
pub struct BufferBuilder {
    base: BuilderBase,
    allowed_usage: BufferUsage,
    initial_usage: BufferUsage,
    size: u32,
    properties_set: u8,
}

impl BufferBuilder {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            base: BuilderBase::new(device),
            allowed_usage: BufferUsage::EMPTY,
            initial_usage: BufferUsage::EMPTY,
            size: 0,
            properties_set: 0,
        }
    }

    /// Sets the usages the buffer may ever be transitioned to.
    pub fn set_allowed_usage(&mut self, usage: BufferUsage) -> Result<(), ResourceError> {
        self.claim_property(BUFFER_PROPERTY_ALLOWED_USAGE, "allowedUsage")?;
        self.allowed_usage = usage;
        Ok(())
    }

    /// Sets the usage the buffer starts in. Defaults to no usage.
    pub fn set_initial_usage(&mut self, usage: BufferUsage) -> Result<(), ResourceError> {
        self.claim_property(BUFFER_PROPERTY_INITIAL_USAGE, "initialUsage")?;
        self.initial_usage = usage;
        Ok(())
    }

    /// Sets the size of the buffer in bytes.
    pub fn set_size(&mut self, size: u32) -> Result<(), ResourceError> {
        self.claim_property(BUFFER_PROPERTY_SIZE, "size")?;
        self.size = size;
        Ok(())
    }

    fn claim_property(&mut self, bit: u8, property: &'static str) -> Result<(), ResourceError> {
        self.base.check(ResourceError::BuilderPoisoned)?;
        if self.properties_set & bit != 0 {
            return Err(self.base.fail(ResourceError::PropertySetTwice {
                object: "buffer",
                property,
            }));
        }
        self.properties_set |= bit;
        Ok(())
    }
}

impl Builder for BufferBuilder {
    type Output = GpuRef<Buffer>;
    type Error = ResourceError;

    fn device(&self) -> &Device {
        self.base.device()
    }

    fn finish(self) -> Result<GpuRef<Buffer>, ResourceError> {
        let Self {
            mut base,
            allowed_usage,
            initial_usage,
            size,
            properties_set,
        } = self;
        base.check(ResourceError::BuilderPoisoned)?;

        for (bit, property) in [
            (BUFFER_PROPERTY_ALLOWED_USAGE, "allowedUsage"),
            (BUFFER_PROPERTY_SIZE, "size"),
        ] {
            if properties_set & bit == 0 {
                return Err(base.fail(ResourceError::MissingProperty {
                    object: "buffer",
                    property,
                }));
            }
        }

        if !Buffer::is_usage_possible(allowed_usage, initial_usage) {
            return Err(base.fail(ResourceError::InitialUsageNotAllowed { object: "buffer" }));
        }

        let device = base.into_device();
        let buffer = Buffer {
            tracked: device.register(ObjectKind::Buffer),
            size,
            state: Mutex::new(UsageState::new(allowed_usage, initial_usage)),
            device,
        };
        log::debug!(
            "Created buffer {} ({size} bytes, allowed {allowed_usage:?})",
            buffer.id()
        );
        Ok(GpuRef::new(buffer))
    }

    fn consumed_error() -> ResourceError {
        ResourceError::BuilderConsumed
    }
}

/// A sub-range of a buffer. The view keeps its buffer alive.
#[derive(Debug)]
pub struct BufferView {
    tracked: TrackedObject,
    buffer: GpuRef<Buffer>,
    offset: u32,
    size: u32,
}

impl GpuObject for BufferView {
    fn tracked(&self) -> &TrackedObject {
        &self.tracked
    }
}

impl BufferView {
    /// The viewed buffer.
    pub fn buffer(&self) -> &GpuRef<Buffer> {
        &self.buffer
    }

    /// The offset of the view in bytes.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The size of the view in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Accumulates the extent of a [`BufferView`].
#[derive(Debug)]
pub struct BufferViewBuilder {
    base: BuilderBase,
    buffer: GpuRef<Buffer>,
    extent: Option<(u32, u32)>,
}

impl BufferViewBuilder {
    pub(crate) fn new(device: Device, buffer: GpuRef<Buffer>) -> Self {
        Self {
            base: BuilderBase::new(device),
            buffer,
            extent: None,
        }
    }

    /// Sets the byte range `[offset, offset + size)` the view covers.
    pub fn set_extent(&mut self, offset: u32, size: u32) -> Result<(), ResourceError> {
        self.base.check(ResourceError::BuilderPoisoned)?;
        if self.extent.is_some() {
            return Err(self.base.fail(ResourceError::PropertySetTwice {
                object: "buffer view",
                property: "extent",
            }));
        }

        let view_end = u64::from(offset) + u64::from(size);
        if view_end > u64::from(self.buffer.size()) {
            let buffer_size = self.buffer.size();
            return Err(self.base.fail(ResourceError::ViewOutOfBounds {
                offset,
                size,
                buffer_size,
            }));
        }

        self.extent = Some((offset, size));
        Ok(())
    }
}

impl Builder for BufferViewBuilder {
    type Output = GpuRef<BufferView>;
    type Error = ResourceError;

    fn device(&self) -> &Device {
        self.base.device()
    }

    fn finish(self) -> Result<GpuRef<BufferView>, ResourceError> {
        let Self {
            mut base,
            buffer,
            extent,
        } = self;
        base.check(ResourceError::BuilderPoisoned)?;

        let Some((offset, size)) = extent else {
            return Err(base.fail(ResourceError::MissingProperty {
                object: "buffer view",
                property: "extent",
            }));
        };

        let device = base.into_device();
        Ok(GpuRef::new(BufferView {
            tracked: device.register(ObjectKind::BufferView),
            buffer,
            offset,
            size,
        }))
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

    fn buffer(device: &Device, allowed: BufferUsage, initial: BufferUsage) -> GpuRef<Buffer> {
        let mut builder = device.create_buffer_builder();
        builder.set_allowed_usage(allowed).unwrap();
        builder.set_initial_usage(initial).unwrap();
        builder.set_size(16).unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn property_set_twice_poisons_the_builder() {
        let device = device();
        let mut builder = device.create_buffer_builder();
        builder.set_size(4).unwrap();
        assert_eq!(
            builder.set_size(8),
            Err(ResourceError::PropertySetTwice {
                object: "buffer",
                property: "size"
            })
        );
        assert_eq!(
            builder.set_allowed_usage(BufferUsage::VERTEX),
            Err(ResourceError::BuilderPoisoned)
        );
        assert_eq!(builder.finish().unwrap_err(), ResourceError::BuilderPoisoned);
        assert_eq!(device.stats().errors_reported, 1);
    }

    #[test]
    fn missing_size_is_rejected() {
        let device = device();
        let mut builder = device.create_buffer_builder();
        builder.set_allowed_usage(BufferUsage::VERTEX).unwrap();
        assert_eq!(
            builder.finish().unwrap_err(),
            ResourceError::MissingProperty {
                object: "buffer",
                property: "size"
            }
        );
    }

    #[test]
    fn initial_usage_must_be_allowed() {
        let device = device();
        let mut builder = device.create_buffer_builder();
        builder.set_allowed_usage(BufferUsage::VERTEX).unwrap();
        builder.set_initial_usage(BufferUsage::INDEX).unwrap();
        builder.set_size(4).unwrap();
        assert_eq!(
            builder.finish().unwrap_err(),
            ResourceError::InitialUsageNotAllowed { object: "buffer" }
        );
    }

    #[test]
    fn freezing_pins_the_usage() {
        let device = device();
        let buffer = buffer(
            &device,
            BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST,
            BufferUsage::TRANSFER_DST,
        );

        buffer.freeze_usage(BufferUsage::UNIFORM).unwrap();
        assert!(buffer.is_frozen());
        assert_eq!(buffer.allowed_usage(), BufferUsage::UNIFORM);
        assert!(buffer.has_frozen_usage(BufferUsage::UNIFORM));
        assert_eq!(
            buffer.transition_usage(BufferUsage::TRANSFER_DST),
            Err(ResourceError::FrozenOrUsageNotAllowed(buffer.id()))
        );
    }

    #[test]
    fn sub_data_needs_mapped_usage_and_range() {
        let device = device();
        let buffer = buffer(
            &device,
            BufferUsage::MAPPED | BufferUsage::VERTEX,
            BufferUsage::VERTEX,
        );

        assert_eq!(
            buffer.set_sub_data(0, &[1, 2]),
            Err(ResourceError::BufferNotMapped(buffer.id()))
        );

        buffer.transition_usage(BufferUsage::MAPPED).unwrap();
        assert_eq!(
            buffer.set_sub_data(3, &[1, 2]),
            Err(ResourceError::SubDataOutOfRange {
                start: 3,
                count: 2,
                size: 16
            })
        );
        buffer.set_sub_data(2, &[7, 8]).unwrap();
    }

    #[test]
    fn view_extent_is_bounds_checked() {
        let device = device();
        let buffer = buffer(&device, BufferUsage::UNIFORM, BufferUsage::UNIFORM);

        let mut builder = device.create_buffer_view_builder(&buffer);
        assert_eq!(
            builder.set_extent(8, 12),
            Err(ResourceError::ViewOutOfBounds {
                offset: 8,
                size: 12,
                buffer_size: 16
            })
        );

        let mut builder = device.create_buffer_view_builder(&buffer);
        builder.set_extent(4, 12).unwrap();
        let view = builder.finish().unwrap();
        assert_eq!((view.offset(), view.size()), (4, 12));
        assert!(view.buffer().ptr_eq(&buffer));
        assert_eq!(buffer.ref_count(), 2);
    }

    #[test]
    fn view_extent_overflow_is_rejected() {
        let device = device();
        let buffer = buffer(&device, BufferUsage::UNIFORM, BufferUsage::UNIFORM);
        let mut builder = device.create_buffer_view_builder(&buffer);
        assert!(builder.set_extent(u32::MAX, 2).is_err());
    }
}
