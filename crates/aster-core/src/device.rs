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

//! The device: factory for every object and sink for every reported error.

use crate::backend::Backend;
use crate::binding::{BindGroup, BindGroupDescriptor, BindGroupLayout, BindGroupLayoutDescriptor};
use crate::command::buffer::{CommandBuffer, CommandBufferDescriptor};
use crate::command::CommandBufferBuilder;
use crate::config::DeviceConfig;
use crate::error::{CommandBufferError, DeviceError, PipelineError, ResourceError};
use crate::error_bus::ErrorBus;
use crate::input_state::InputStateBuilder;
use crate::layout::PipelineLayoutBuilder;
use crate::object::{GpuObject, GpuRef, ObjectKind, ObjectStats, ObjectTracker, TrackedObject};
use crate::pipeline::{Pipeline, PipelineBuilder, PipelineDescriptor};
use crate::queue::Queue;
use crate::resource::{Buffer, BufferBuilder, BufferViewBuilder, TextureBuilder};
use crate::shader::{ShaderModule, ShaderModuleDescriptor};
use std::sync::Arc;

#[derive(Debug)]
struct DeviceShared {
    config: DeviceConfig,
    backend: Box<dyn Backend>,
    tracker: Arc<ObjectTracker>,
    errors: ErrorBus,
}

/// A snapshot of the counters of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    /// Live and created objects per kind.
    pub objects: ObjectStats,
    /// The number of errors reported since the device was created.
    pub errors_reported: u64,
}

/// A handle to a device. Cloning the handle is cheap and shares the device.
///
/// Every object created by the device keeps a handle to it, so the device
/// lives as long as any of its objects.
#[derive(Debug, Clone)]
pub struct Device {
    shared: Arc<DeviceShared>,
}

impl Device {
    /// Creates a device driving `backend`.
    /// ## Arguments
    /// * `config` - The device settings. Its `backend` must match `backend`.
    /// * `backend` - The backend recorded work is handed to.
    /// ## Errors
    /// * `DeviceError::Config` - If the configuration is invalid.
    /// * `DeviceError::BackendMismatch` - If the backend is not the configured one.
    pub fn new<B: Backend>(config: DeviceConfig, backend: B) -> Result<Self, DeviceError> {
        config.validate()?;

        let provided = backend.backend_type();
        if provided != config.backend {
            return Err(DeviceError::BackendMismatch {
                configured: config.backend,
                provided,
            });
        }

        log::info!(
            "Initialized {:?} device '{}' (command stream limit: {} bytes)",
            config.backend,
            config.label.as_deref().unwrap_or("unlabeled"),
            config.max_command_stream_bytes
        );

        Ok(Self {
            shared: Arc::new(DeviceShared {
                config,
                backend: Box::new(backend),
                tracker: Arc::new(ObjectTracker::default()),
                errors: ErrorBus::new(),
            }),
        })
    }

    /// The settings the device was created with.
    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }

    /// The backend recorded work is handed to.
    pub fn backend(&self) -> &dyn Backend {
        self.shared.backend.as_ref()
    }

    /// Returns a receiver for every error reported from now on.
    ///
    /// Errors are also returned by the call that detected them; the channel is
    /// for observers that want them in one place.
    pub fn subscribe_errors(&self) -> flume::Receiver<DeviceError> {
        self.shared.errors.subscribe()
    }

    /// Takes a snapshot of the device counters.
    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            objects: self.shared.tracker.snapshot(),
            errors_reported: self.shared.errors.reported(),
        }
    }

    /// Returns the queue work is submitted to.
    pub fn queue(&self) -> Queue {
        Queue::new(self.clone())
    }

    /// Returns `true` if both handles share the same device.
    pub fn ptr_eq(&self, other: &Device) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Starts describing a buffer.
    pub fn create_buffer_builder(&self) -> BufferBuilder {
        BufferBuilder::new(self.clone())
    }

    /// Starts describing a view into `buffer`.
    pub fn create_buffer_view_builder(&self, buffer: &GpuRef<Buffer>) -> BufferViewBuilder {
        BufferViewBuilder::new(self.clone(), buffer.clone())
    }

    /// Starts describing a texture.
    pub fn create_texture_builder(&self) -> TextureBuilder {
        TextureBuilder::new(self.clone())
    }

    /// Creates a shader module from its reflection data.
    /// ## Errors
    /// * `ResourceError` - If a push constant, binding or vertex attribute is out of range.
    pub fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor<'_>,
    ) -> Result<GpuRef<ShaderModule>, ResourceError> {
        let module = ShaderModule::new(self, descriptor).map_err(|e| self.report(e))?;
        log::debug!(
            "Created {:?} shader module {} '{}'",
            module.execution_model(),
            module.id(),
            module.label().unwrap_or("unlabeled")
        );
        Ok(GpuRef::new(module))
    }

    /// Creates a bind group layout.
    /// ## Errors
    /// * `ResourceError` - If a binding is out of range or declared twice.
    pub fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor<'_>,
    ) -> Result<GpuRef<BindGroupLayout>, ResourceError> {
        BindGroupLayout::new(self, descriptor)
            .map(GpuRef::new)
            .map_err(|e| self.report(e))
    }

    /// Creates a bind group.
    /// ## Errors
    /// * `ResourceError` - If the entries do not match the layout.
    pub fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor<'_>,
    ) -> Result<GpuRef<BindGroup>, ResourceError> {
        BindGroup::new(self, descriptor)
            .map(GpuRef::new)
            .map_err(|e| self.report(e))
    }

    /// Starts describing a pipeline layout.
    pub fn create_pipeline_layout_builder(&self) -> PipelineLayoutBuilder {
        PipelineLayoutBuilder::new(self.clone())
    }

    /// Starts describing an input state.
    pub fn create_input_state_builder(&self) -> InputStateBuilder {
        InputStateBuilder::new(self.clone())
    }

    /// Starts describing a pipeline.
    pub fn create_pipeline_builder(&self) -> PipelineBuilder {
        PipelineBuilder::new(self.clone())
    }

    /// Starts recording a command buffer.
    pub fn create_command_buffer_builder(&self) -> CommandBufferBuilder {
        CommandBufferBuilder::new(self.clone())
    }

    /// Logs `error`, counts it and forwards it to the error subscribers.
    /// Returns the error for the caller to propagate.
    pub(crate) fn report<E>(&self, error: E) -> E
    where
        E: Clone + Into<DeviceError>,
    {
        self.shared.errors.publish(error.clone().into());
        error
    }

    pub(crate) fn register(&self, kind: ObjectKind) -> TrackedObject {
        self.shared.tracker.register(kind)
    }

    pub(crate) fn create_pipeline(
        &self,
        descriptor: PipelineDescriptor,
    ) -> Result<GpuRef<Pipeline>, PipelineError> {
        let pipeline = Pipeline::new(self, descriptor).map_err(|e| self.report(e))?;
        log::debug!(
            "Created pipeline {} with stages {:?}",
            pipeline.id(),
            pipeline.stage_mask()
        );
        Ok(GpuRef::new(pipeline))
    }

    pub(crate) fn create_command_buffer(
        &self,
        descriptor: CommandBufferDescriptor,
    ) -> Result<GpuRef<CommandBuffer>, CommandBufferError> {
        let command_buffer = CommandBuffer::new(self, descriptor).map_err(|e| self.report(e))?;
        log::debug!(
            "Created command buffer {} ({} buffers and {} textures transitioned)",
            command_buffer.id(),
            command_buffer.transitioned_buffer_count(),
            command_buffer.transitioned_texture_count()
        );
        Ok(GpuRef::new(command_buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::enums::BackendType;
    use crate::error::ErrorKind;

    #[test]
    fn backend_must_match_the_configuration() {
        let config = DeviceConfig {
            backend: BackendType::Metal,
            ..DeviceConfig::default()
        };
        let err = Device::new(config, NullBackend::new()).unwrap_err();
        assert_eq!(
            err,
            DeviceError::BackendMismatch {
                configured: BackendType::Metal,
                provided: BackendType::Null
            }
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = DeviceConfig {
            max_command_stream_bytes: 0,
            ..DeviceConfig::default()
        };
        assert!(matches!(
            Device::new(config, NullBackend::new()),
            Err(DeviceError::Config(_))
        ));
    }

    #[test]
    fn reported_errors_reach_every_subscriber() {
        let device = Device::new(DeviceConfig::default(), NullBackend::new()).unwrap();
        let first = device.subscribe_errors();
        let second = device.subscribe_errors();

        let returned = device.report(PipelineError::BuilderConsumed);
        assert_eq!(returned, PipelineError::BuilderConsumed);

        let expected = DeviceError::Pipeline(PipelineError::BuilderConsumed);
        assert_eq!(first.try_recv().unwrap(), expected);
        assert_eq!(second.try_recv().unwrap(), expected);
        assert_eq!(device.stats().errors_reported, 1);
    }

    #[test]
    fn clones_share_the_device() {
        let device = Device::new(DeviceConfig::default(), NullBackend::new()).unwrap();
        let clone = device.clone();
        assert!(device.ptr_eq(&clone));

        let _builder = clone.create_pipeline_layout_builder();
        let errors = device.subscribe_errors();
        clone.report(ResourceError::BuilderConsumed);
        assert_eq!(errors.len(), 1);
    }
}
