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

//! Device configuration.

use crate::enums::BackendType;
use crate::error::DeviceError;
use serde::{Deserialize, Serialize};

/// The smallest accepted command-stream ceiling: one record header.
const MIN_COMMAND_STREAM_BYTES: usize = 8;

/// Settings a [`Device`](crate::Device) is initialized with.
///
/// This is the only place a backend is selected; nothing in the runtime keeps
/// global backend state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// An optional debug label for the device.
    pub label: Option<String>,
    /// The backend the device expects to drive.
    pub backend: BackendType,
    /// The maximum size in bytes of a single command stream.
    pub max_command_stream_bytes: usize,
    /// If `true`, the queue re-validates resource usages right before execution.
    pub validate_on_submit: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            label: None,
            backend: BackendType::Null,
            max_command_stream_bytes: 64 * 1024 * 1024,
            validate_on_submit: true,
        }
    }
}

impl DeviceConfig {
    /// Parses a configuration from JSON. Missing fields take their default value.
    pub fn from_json_str(json: &str) -> Result<Self, DeviceError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DeviceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values can be used by a device.
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.max_command_stream_bytes < MIN_COMMAND_STREAM_BYTES {
            return Err(DeviceError::Config(format!(
                "max_command_stream_bytes must be at least {MIN_COMMAND_STREAM_BYTES}, got {}",
                self.max_command_stream_bytes
            )));
        }
        Ok(())
    }
}
