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

//! Buffers, buffer views and textures, and the usage rules they share.
//!
//! A resource has an *allowed* usage fixed at creation and a *current* usage
//! that changes through transitions. Freezing pins both, after which no
//! transition is possible.

pub mod buffer;
pub mod texture;

pub use self::buffer::*;
pub use self::texture::*;

use std::fmt;

/// Usage flag sets that follow the transition rules of this module.
pub(crate) trait UsageBits: Copy + PartialEq + fmt::Debug {
    /// The usages that only read from the resource.
    const READ_ONLY: Self;

    fn to_bits(self) -> u32;
}

/// A usage is possible if it is allowed and either only reads from the
/// resource or consists of a single usage.
pub(crate) fn is_usage_possible<U: UsageBits>(allowed: U, usage: U) -> bool {
    let (allowed, usage) = (allowed.to_bits(), usage.to_bits());
    let read_only_bits = U::READ_ONLY.to_bits();

    let is_allowed = usage & allowed == usage;
    let read_only = usage & read_only_bits == usage;
    let single_use = usage & usage.wrapping_sub(1) == 0;
    is_allowed && (read_only || single_use)
}

/// The mutable usage state of a resource.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UsageState<U> {
    pub(crate) allowed: U,
    pub(crate) current: U,
    pub(crate) frozen: bool,
}

impl<U: UsageBits> UsageState<U> {
    pub(crate) fn new(allowed: U, current: U) -> Self {
        Self {
            allowed,
            current,
            frozen: false,
        }
    }

    pub(crate) fn is_transition_possible(&self, usage: U) -> bool {
        !self.frozen && is_usage_possible(self.allowed, usage)
    }

    pub(crate) fn has_frozen_usage(&self, usage: U) -> bool {
        self.frozen && usage.to_bits() & self.allowed.to_bits() != 0
    }

    /// Applies a transition. Returns `false` and leaves the state untouched if
    /// the transition is not possible.
    pub(crate) fn transition(&mut self, usage: U) -> bool {
        if !self.is_transition_possible(usage) {
            return false;
        }
        self.current = usage;
        true
    }

    /// Pins the usage. Returns `false` and leaves the state untouched if the
    /// usage is not reachable.
    pub(crate) fn freeze(&mut self, usage: U) -> bool {
        if !self.is_transition_possible(usage) {
            return false;
        }
        self.allowed = usage;
        self.current = usage;
        self.frozen = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_combinations_are_possible() {
        let allowed = BufferUsage::VERTEX | BufferUsage::INDEX | BufferUsage::TRANSFER_DST;
        assert!(is_usage_possible(allowed, BufferUsage::VERTEX | BufferUsage::INDEX));
        assert!(is_usage_possible(allowed, BufferUsage::TRANSFER_DST));
        assert!(is_usage_possible(allowed, BufferUsage::EMPTY));
    }

    #[test]
    fn writable_combinations_are_not_possible() {
        let allowed = BufferUsage::VERTEX | BufferUsage::TRANSFER_DST;
        assert!(!is_usage_possible(
            allowed,
            BufferUsage::VERTEX | BufferUsage::TRANSFER_DST
        ));
    }

    #[test]
    fn disallowed_usage_is_not_possible() {
        assert!(!is_usage_possible(BufferUsage::VERTEX, BufferUsage::INDEX));
    }

    #[test]
    fn frozen_state_refuses_transitions() {
        let mut state = UsageState::new(
            TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
            TextureUsage::TRANSFER_DST,
        );
        assert!(state.transition(TextureUsage::SAMPLED));
        assert!(state.freeze(TextureUsage::SAMPLED));
        assert!(state.has_frozen_usage(TextureUsage::SAMPLED));
        assert!(!state.has_frozen_usage(TextureUsage::TRANSFER_DST));
        assert!(!state.transition(TextureUsage::TRANSFER_DST));
        assert_eq!(state.current, TextureUsage::SAMPLED);
    }
}
