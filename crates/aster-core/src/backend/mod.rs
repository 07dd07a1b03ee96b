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

//! The contract between the runtime and the code that drives a GPU API.

mod null;

pub use self::null::NullBackend;

use crate::command::{CommandBuffer, CommandStream};
use crate::enums::BackendType;
use crate::error::BackendError;
use crate::resource::Buffer;
use std::fmt::Debug;

/// Translates validated work for a driver.
///
/// The runtime only calls a backend with work that passed validation: buffer
/// writes are in range, and command streams were checked against the usage
/// rules of every resource they touch.
pub trait Backend: Send + Sync + Debug + 'static {
    /// The driver family of the backend.
    fn backend_type(&self) -> BackendType;

    /// Writes `data` into `buffer`, starting at word `start`.
    /// ## Arguments
    /// * `buffer` - The destination buffer. It is in the mapped usage.
    /// * `start` - The first 32-bit word written.
    /// * `data` - The words to write.
    /// ## Errors
    /// * `BackendError` - If the driver rejects the write.
    fn write_buffer(&self, buffer: &Buffer, start: u32, data: &[u32]) -> Result<(), BackendError>;

    /// Executes the recorded stream of `command_buffer`.
    ///
    /// The backend must apply the usage transitions of the stream before the
    /// commands that follow them.
    /// ## Arguments
    /// * `command_buffer` - The command buffer, used to resolve object ids.
    /// * `stream` - The stream acquired from `command_buffer`.
    /// ## Errors
    /// * `BackendError` - If a resource is gone or the driver fails.
    fn execute(
        &self,
        command_buffer: &CommandBuffer,
        stream: &CommandStream,
    ) -> Result<(), BackendError>;
}
