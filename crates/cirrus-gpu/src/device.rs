//! Device orchestration: object registries, submission serials, the error
//! channel, and the flush/tick cadence that drives asynchronous completion.
//!
//! The device serializes all access itself; the core performs no internal
//! locking and expects one logical owner thread per device. GPU completion is
//! observed out of band: the embedder calls [`Device::tick`] with the serial
//! the backend reports complete (per frame, or per explicit flush), and drains
//! the returned events.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::backend::{QueueBackend, QueueOp};
use crate::buffer::{Buffer, BufferDescriptor, BufferId, BufferMapState};
use crate::command_buffer::CommandBuffer;
use crate::error::{DeviceError, QueueError};
use crate::fence::{Fence, FenceDescriptor, FenceId, FenceState};
use crate::queue::{Queue, QueueId};
use crate::staging::{StagingPool, UploadHandle};
use crate::texture::{Texture, TextureDescriptor, TextureId};
use crate::tracker::{ErrorScopeId, ErrorScopeTracker, FenceSignalTracker};

/// Strictly increasing point in a device's total submission order. Never
/// reused; serial N complete implies all serials ≤ N complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SubmissionSerial(pub u64);

impl SubmissionSerial {
    pub const ZERO: Self = Self(0);

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SubmissionSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion-side event drained from [`Device::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device confirmed completion of a requested fence value.
    FenceCompleted { fence: FenceId, value: u64 },
    /// All work submitted while this error scope was active has completed; the
    /// scope may be finalized.
    ErrorScopeRetired { scope: ErrorScopeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub validation_enabled: bool,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            validation_enabled: true,
        }
    }
}

// Queue ids are process-unique so a fence can never pass the same-queue check
// against a queue belonging to another device.
static NEXT_QUEUE_ID: AtomicU32 = AtomicU32::new(0);

pub struct Device {
    alive: bool,
    validation_enabled: bool,
    queue: QueueId,

    buffers: HashMap<BufferId, Buffer>,
    next_buffer: u32,
    textures: HashMap<TextureId, Texture>,
    next_texture: u32,
    fences: HashMap<FenceId, FenceState>,
    next_fence: u32,

    staging: StagingPool,
    fence_tracker: FenceSignalTracker,
    scope_tracker: ErrorScopeTracker,
    backend: Box<dyn QueueBackend>,

    /// Work accumulated since the last flush (queue writes), dispatched ahead
    /// of the next submission's command buffers.
    pending_ops: Vec<QueueOp>,
    /// Serial the next flush will carry.
    pending_serial: SubmissionSerial,
    last_submitted: SubmissionSerial,
    completed: SubmissionSerial,

    current_scope: ErrorScopeId,
    errors: VecDeque<DeviceError>,
}

impl Device {
    pub fn new(backend: Box<dyn QueueBackend>, desc: &DeviceDescriptor) -> Self {
        Self {
            alive: true,
            validation_enabled: desc.validation_enabled,
            queue: QueueId(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed)),
            buffers: HashMap::new(),
            next_buffer: 0,
            textures: HashMap::new(),
            next_texture: 0,
            fences: HashMap::new(),
            next_fence: 0,
            staging: StagingPool::new(),
            fence_tracker: FenceSignalTracker::new(),
            scope_tracker: ErrorScopeTracker::new(),
            backend,
            pending_ops: Vec::new(),
            pending_serial: SubmissionSerial(1),
            last_submitted: SubmissionSerial::ZERO,
            completed: SubmissionSerial::ZERO,
            current_scope: ErrorScopeId(0),
            errors: VecDeque::new(),
        }
    }

    /// The device's queue. One queue per device, created with it.
    pub fn queue(&self) -> Queue {
        Queue::valid(self.queue)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    /// Transition to the lost state: every queue operation becomes a silent
    /// no-op. Unflushed pending work is dropped and the backend is reset;
    /// there is no backend left to receive it.
    pub fn lose(&mut self) {
        if !self.alive {
            return;
        }
        tracing::debug!("device lost");
        self.alive = false;
        self.pending_ops.clear();
        self.backend.reset();
    }

    pub(crate) fn validate_is_alive(&self) -> Result<(), QueueError> {
        if self.alive {
            Ok(())
        } else {
            Err(QueueError::DeviceLost)
        }
    }

    // Serials.

    /// The serial the next flush will be assigned.
    pub fn pending_serial(&self) -> SubmissionSerial {
        self.pending_serial
    }

    pub fn last_submitted_serial(&self) -> SubmissionSerial {
        self.last_submitted
    }

    pub fn completed_serial(&self) -> SubmissionSerial {
        self.completed
    }

    // Resources.

    pub fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferId {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(id, Buffer::new(desc));
        id
    }

    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(&id)
    }

    pub fn destroy_buffer(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffers.get_mut(&id) {
            buffer.destroy();
        }
    }

    /// Hook for the mapping path: a map request was issued but its callback
    /// has not fired.
    pub fn buffer_map_async(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffers.get_mut(&id) {
            buffer.set_map_state(BufferMapState::MapPending);
        }
    }

    /// Hook for the mapping path: the map callback fired, the buffer is now
    /// host-mapped.
    pub fn buffer_map_complete(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffers.get_mut(&id) {
            buffer.set_map_state(BufferMapState::Mapped);
        }
    }

    pub fn buffer_unmap(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffers.get_mut(&id) {
            buffer.set_map_state(BufferMapState::Unmapped);
        }
    }

    pub fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(id, Texture::new(desc));
        id
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn destroy_texture(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.get_mut(&id) {
            texture.destroy();
        }
    }

    pub(crate) fn validate_buffer(&self, id: BufferId) -> Result<&Buffer, QueueError> {
        self.buffers.get(&id).ok_or(QueueError::UnknownBuffer(id))
    }

    pub(crate) fn validate_texture(&self, id: TextureId) -> Result<&Texture, QueueError> {
        self.textures
            .get(&id)
            .ok_or(QueueError::UnknownTexture(id))
    }

    // Fences.

    pub(crate) fn register_fence(
        &mut self,
        queue: QueueId,
        descriptor: &FenceDescriptor,
    ) -> FenceId {
        let id = FenceId(self.next_fence);
        self.next_fence += 1;
        self.fences.insert(id, FenceState::new(queue, descriptor));
        id
    }

    pub(crate) fn fence_state(&self, id: FenceId) -> Option<&FenceState> {
        self.fences.get(&id)
    }

    pub(crate) fn set_fence_signaled_value(&mut self, id: FenceId, value: u64) {
        if let Some(state) = self.fences.get_mut(&id) {
            debug_assert!(value > state.signaled_value);
            state.signaled_value = value;
        }
    }

    /// Drop the fence's registry state. Never blocks on outstanding signal
    /// requests; the tracker keeps the minimal `(fence, value)` bookkeeping it
    /// needs, so completion events for this fence still drain.
    pub fn destroy_fence(&mut self, fence: &Fence) {
        if let Some(id) = fence.id() {
            self.fences.remove(&id);
        }
    }

    /// The descriptor an absent `create_fence` descriptor inherits.
    pub fn default_fence_descriptor(&self) -> FenceDescriptor {
        FenceDescriptor::default()
    }

    // Error scopes.

    pub fn current_error_scope(&self) -> ErrorScopeId {
        self.current_scope
    }

    /// Set the active error scope. The push/pop stack itself lives with the
    /// embedder; the queue only records which scope was active at submission.
    pub fn enter_error_scope(&mut self, scope: ErrorScopeId) {
        self.current_scope = scope;
    }

    pub(crate) fn track_scope_until_last_submit(&mut self, scope: ErrorScopeId) {
        self.scope_tracker.track(self.last_submitted, scope);
    }

    pub(crate) fn track_fence_until_last_submit(&mut self, fence: FenceId, value: u64) {
        self.fence_tracker.track(self.last_submitted, fence, value);
    }

    // Error channel.

    /// Record an internal failure on the error channel. Device-lost is a
    /// documented silent drop, never a channel entry.
    pub(crate) fn consume_error(&mut self, err: QueueError) {
        if matches!(err, QueueError::DeviceLost) {
            return;
        }
        tracing::debug!(error = %err, "queue operation rejected");
        self.errors.push_back(DeviceError::from(err));
    }

    /// Pop the oldest unobserved device error, if any.
    pub fn pop_error(&mut self) -> Option<DeviceError> {
        self.errors.pop_front()
    }

    // Submission.

    pub(crate) fn stage_upload(
        &mut self,
        serial: SubmissionSerial,
        data: &[u8],
    ) -> Result<UploadHandle, QueueError> {
        let size = data.len() as u64;
        let (handle, slice) = self
            .staging
            .allocate(size, serial)
            .ok_or(QueueError::StagingExhausted { size })?;
        slice.copy_from_slice(data);
        Ok(handle)
    }

    pub(crate) fn enqueue_op(&mut self, op: QueueOp) {
        self.pending_ops.push(op);
    }

    /// Flush accumulated pending work (queue writes) without a submission.
    /// Failures surface on the error channel. No-op when nothing is pending.
    pub fn flush(&mut self) {
        if !self.alive || self.pending_ops.is_empty() {
            return;
        }
        if let Err(err) = self.flush_with(Vec::new()) {
            self.consume_error(err);
        }
    }

    /// Dispatch one submission: pending queue writes first, then the given
    /// command buffers, all under the pending serial.
    pub(crate) fn dispatch_submit(
        &mut self,
        command_buffers: Vec<CommandBuffer>,
    ) -> Result<(), QueueError> {
        let extra = command_buffers
            .iter()
            .map(|cb| QueueOp::ExecuteCommandBuffer {
                label: cb.label().map(str::to_owned),
            })
            .collect();
        self.flush_with(extra)
    }

    fn flush_with(&mut self, extra: Vec<QueueOp>) -> Result<(), QueueError> {
        let serial = self.pending_serial;
        let mut ops = std::mem::take(&mut self.pending_ops);
        ops.extend(extra);

        // A dispatch failure must leave nothing in the stream; the ops are
        // dropped and the serial is not consumed.
        self.backend
            .submit(serial, &self.staging, &ops)
            .map_err(QueueError::Backend)?;

        self.last_submitted = serial;
        self.pending_serial = serial.next();
        Ok(())
    }

    // Completion.

    /// The device reporting GPU progress: all submissions with serial ≤
    /// `completed` have finished executing. Reclaims staging memory, drains
    /// both trackers, and returns the resulting events in order.
    pub fn tick(&mut self, completed: SubmissionSerial) -> Vec<DeviceEvent> {
        // The device cannot complete work that was never submitted.
        let completed = completed.min(self.last_submitted);
        if completed > self.completed {
            self.completed = completed;
        }

        self.staging.reclaim(self.completed);

        let mut events = Vec::new();
        for signal in self.fence_tracker.advance(self.completed) {
            if let Some(state) = self.fences.get_mut(&signal.fence) {
                state.completed_value = state.completed_value.max(signal.value);
            }
            events.push(DeviceEvent::FenceCompleted {
                fence: signal.fence,
                value: signal.value,
            });
        }
        for scope in self.scope_tracker.advance(self.completed) {
            events.push(DeviceEvent::ErrorScopeRetired { scope });
        }
        events
    }

    /// Staging chunks still owned by in-flight (not yet completed) serials.
    pub fn staging_chunks_in_flight(&self) -> usize {
        self.staging.chunk_count()
    }

    /// Read back buffer bytes through the backend. `None` for unknown buffers,
    /// out-of-range reads, or backends without read support.
    pub fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Option<Vec<u8>> {
        let buffer = self.buffers.get(&id)?;
        let end = offset.checked_add(size)?;
        if end > buffer.size() {
            return None;
        }
        self.backend.read_buffer(id, offset, size)
    }
}
