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

//! The shared-ownership model behind every GPU-visible object.
//!
//! Objects are handed out as [`GpuRef`] handles. Cloning (or calling
//! [`GpuRef::retain`]) adds an owner, dropping (or calling
//! [`GpuRef::release`]) removes one, and the object is destroyed exactly when
//! the last strong owner goes away. Counting is atomic, so the last reference
//! may be released from any thread.
//!
//! Users that only need to *observe* an object, such as a command buffer
//! pointing at the buffers it copies from, hold a [`WeakGpuRef`] instead. A weak
//! reference never keeps an object alive and can never bring a destroyed
//! object back.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// A device-unique identifier for a GPU-visible object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of a GPU-visible object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A linear GPU buffer.
    Buffer,
    /// A sub-range of a buffer.
    BufferView,
    /// A texture.
    Texture,
    /// The shape of a bind group.
    BindGroupLayout,
    /// A set of bound resources.
    BindGroup,
    /// The bind group layouts of a pipeline.
    PipelineLayout,
    /// The vertex input description of a pipeline.
    InputState,
    /// A shader module with its reflection data.
    ShaderModule,
    /// A graphics or compute pipeline.
    Pipeline,
    /// A validated recording of GPU work.
    CommandBuffer,
}

impl ObjectKind {
    /// The number of object kinds.
    pub const COUNT: usize = 10;

    /// Every object kind, in index order.
    pub const ALL: [ObjectKind; Self::COUNT] = [
        ObjectKind::Buffer,
        ObjectKind::BufferView,
        ObjectKind::Texture,
        ObjectKind::BindGroupLayout,
        ObjectKind::BindGroup,
        ObjectKind::PipelineLayout,
        ObjectKind::InputState,
        ObjectKind::ShaderModule,
        ObjectKind::Pipeline,
        ObjectKind::CommandBuffer,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Buffer => "buffer",
            ObjectKind::BufferView => "buffer view",
            ObjectKind::Texture => "texture",
            ObjectKind::BindGroupLayout => "bind group layout",
            ObjectKind::BindGroup => "bind group",
            ObjectKind::PipelineLayout => "pipeline layout",
            ObjectKind::InputState => "input state",
            ObjectKind::ShaderModule => "shader module",
            ObjectKind::Pipeline => "pipeline",
            ObjectKind::CommandBuffer => "command buffer",
        };
        f.write_str(name)
    }
}

/// Hands out object ids and counts live objects per kind.
#[derive(Debug, Default)]
pub struct ObjectTracker {
    next_id: AtomicU64,
    live: [AtomicUsize; ObjectKind::COUNT],
    created: [AtomicU64; ObjectKind::COUNT],
}

impl ObjectTracker {
    /// Registers a new object of the given kind.
    pub(crate) fn register(self: &Arc<Self>, kind: ObjectKind) -> TrackedObject {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.live[kind.index()].fetch_add(1, Ordering::AcqRel);
        self.created[kind.index()].fetch_add(1, Ordering::Relaxed);
        log::trace!("Created {kind} {id}");
        TrackedObject {
            id,
            kind,
            tracker: Arc::clone(self),
        }
    }

    /// Takes a snapshot of the counters.
    pub fn snapshot(&self) -> ObjectStats {
        let mut stats = ObjectStats::default();
        for kind in ObjectKind::ALL {
            stats.live[kind.index()] = self.live[kind.index()].load(Ordering::Acquire);
            stats.created[kind.index()] = self.created[kind.index()].load(Ordering::Relaxed);
        }
        stats
    }
}

/// A snapshot of the object counters of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectStats {
    live: [usize; ObjectKind::COUNT],
    created: [u64; ObjectKind::COUNT],
}

impl ObjectStats {
    /// The number of objects of `kind` that are currently alive.
    pub fn live(&self, kind: ObjectKind) -> usize {
        self.live[kind.index()]
    }

    /// The number of objects of `kind` ever created.
    pub fn created(&self, kind: ObjectKind) -> u64 {
        self.created[kind.index()]
    }

    /// The number of live objects of every kind.
    pub fn total_live(&self) -> usize {
        self.live.iter().sum()
    }
}

/// The identity of an object, registered with its device's tracker.
///
/// Dropping it marks the object as destroyed.
#[derive(Debug)]
pub struct TrackedObject {
    id: ObjectId,
    kind: ObjectKind,
    tracker: Arc<ObjectTracker>,
}

impl TrackedObject {
    /// The id of the object.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The kind of the object.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }
}

impl Drop for TrackedObject {
    fn drop(&mut self) {
        self.tracker.live[self.kind.index()].fetch_sub(1, Ordering::AcqRel);
        log::debug!("Destroyed {} {}", self.kind, self.id);
    }
}

/// Implemented by every object that can be shared through a [`GpuRef`].
pub trait GpuObject: Send + Sync + 'static {
    /// The tracking record of the object.
    fn tracked(&self) -> &TrackedObject;

    /// The device-unique id of the object.
    fn id(&self) -> ObjectId {
        self.tracked().id()
    }

    /// The kind of the object.
    fn kind(&self) -> ObjectKind {
        self.tracked().kind()
    }
}

/// A strong, thread-safe, reference-counted handle to a GPU object.
pub struct GpuRef<T: GpuObject>(Arc<T>);

impl<T: GpuObject> GpuRef<T> {
    pub(crate) fn new(object: T) -> Self {
        Self(Arc::new(object))
    }

    /// Adds an owner and returns its handle.
    #[must_use]
    pub fn retain(&self) -> Self {
        Self(Arc::clone(&self.0))
    }

    /// Removes this owner.
    ///
    /// Returns `true` if this was the last strong reference, in which case the
    /// object has been destroyed by the time the call returns.
    pub fn release(self) -> bool {
        Arc::into_inner(self.0).is_some()
    }

    /// The current number of strong owners.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Creates a non-owning reference to the object.
    pub fn downgrade(&self) -> WeakGpuRef<T> {
        WeakGpuRef(Arc::downgrade(&self.0))
    }

    /// Returns `true` if both handles point to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: GpuObject> Clone for GpuRef<T> {
    fn clone(&self) -> Self {
        self.retain()
    }
}

impl<T: GpuObject> Deref for GpuRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: GpuObject> fmt::Debug for GpuRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuRef({} {})", self.0.kind(), self.0.id())
    }
}

/// A non-owning reference to a GPU object.
pub struct WeakGpuRef<T: GpuObject>(Weak<T>);

impl<T: GpuObject> WeakGpuRef<T> {
    /// Returns a strong handle if the object is still alive.
    pub fn upgrade(&self) -> Option<GpuRef<T>> {
        self.0.upgrade().map(GpuRef)
    }

    /// Returns `true` while at least one strong owner exists.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl<T: GpuObject> Clone for WeakGpuRef<T> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

impl<T: GpuObject> fmt::Debug for WeakGpuRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(strong) => write!(f, "WeakGpuRef({} {})", strong.kind(), strong.id()),
            None => f.write_str("WeakGpuRef(<destroyed>)"),
        }
    }
}
