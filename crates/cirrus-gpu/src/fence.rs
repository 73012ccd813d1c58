//! Fences: host-observable monotonic completion counters scoped to one queue.
//!
//! A fence handle is either `Valid` (non-owning ids resolved through the
//! device registry) or `Error` (returned when fence creation fails, so callers
//! keep object-as-error-carrier ergonomics instead of branching on `Option`).
//! Accessors on the `Error` variant return designated defaults.

use crate::device::Device;
use crate::queue::QueueId;

/// Non-owning fence handle id, resolved through the device registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceDescriptor {
    pub initial_value: u64,
}

impl Default for FenceDescriptor {
    fn default() -> Self {
        Self { initial_value: 0 }
    }
}

/// Registry-side fence state.
///
/// `signaled_value` is the host-visible *request* recorded by `Signal`;
/// `completed_value` only advances when the fence tracker observes device
/// completion. A consumer that needs "has the work really finished" must look
/// at `completed_value` (or the drained `FenceCompleted` events), never at the
/// signaled value alone.
#[derive(Debug)]
pub(crate) struct FenceState {
    pub queue: QueueId,
    pub signaled_value: u64,
    pub completed_value: u64,
}

impl FenceState {
    pub(crate) fn new(queue: QueueId, descriptor: &FenceDescriptor) -> Self {
        Self {
            queue,
            signaled_value: descriptor.initial_value,
            completed_value: descriptor.initial_value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceHandle {
    Valid { fence: FenceId, queue: QueueId },
    Error,
}

/// Host-observable monotonic completion counter owned by one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    handle: FenceHandle,
}

impl Fence {
    pub(crate) fn valid(fence: FenceId, queue: QueueId) -> Self {
        Self {
            handle: FenceHandle::Valid { fence, queue },
        }
    }

    /// The permanently invalid fence returned when creation fails.
    pub const fn error() -> Self {
        Self {
            handle: FenceHandle::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.handle, FenceHandle::Error)
    }

    pub fn id(&self) -> Option<FenceId> {
        match self.handle {
            FenceHandle::Valid { fence, .. } => Some(fence),
            FenceHandle::Error => None,
        }
    }

    pub(crate) fn parts(&self) -> Option<(FenceId, QueueId)> {
        match self.handle {
            FenceHandle::Valid { fence, queue } => Some((fence, queue)),
            FenceHandle::Error => None,
        }
    }

    /// The last value requested by `Signal` (or the initial value).
    ///
    /// Returns 0 for error-tagged or destroyed fences.
    pub fn signaled_value(&self, device: &Device) -> u64 {
        self.id()
            .and_then(|id| device.fence_state(id))
            .map(|s| s.signaled_value)
            .unwrap_or(0)
    }

    /// The highest value the device has actually confirmed complete.
    ///
    /// Returns 0 for error-tagged or destroyed fences.
    pub fn completed_value(&self, device: &Device) -> u64 {
        self.id()
            .and_then(|id| device.fence_state(id))
            .map(|s| s.completed_value)
            .unwrap_or(0)
    }
}
