//! The queue: the serialization point where recorded work is validated,
//! dispatched to the backend in caller order, and wired into completion
//! tracking.
//!
//! All four public operations are fire-and-forget: nothing is returned to the
//! caller, validation failures land on the device error channel, and a lost
//! device drops calls silently. Submission order is total and
//! caller-determined; the queue never reorders.

use bytemuck::Pod;

use crate::backend::QueueOp;
use crate::buffer::{BufferId, BufferUsages};
use crate::command_buffer::CommandBuffer;
use crate::device::Device;
use crate::error::{QueueError, UsageScope};
use crate::fence::{Fence, FenceDescriptor, FenceId};
use crate::staging::COPY_ALIGNMENT;
use crate::texture::{TextureId, TextureUsages};

/// Non-owning queue handle id. Process-unique, so fences can only ever match
/// the queue that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueHandle {
    Valid(QueueId),
    Error,
}

/// Serialization point accepting recorded GPU work for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Queue {
    handle: QueueHandle,
}

impl Queue {
    pub(crate) fn valid(id: QueueId) -> Self {
        Self {
            handle: QueueHandle::Valid(id),
        }
    }

    /// The permanently invalid queue. Every operation on it records a
    /// validation error and does nothing.
    pub const fn error() -> Self {
        Self {
            handle: QueueHandle::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.handle, QueueHandle::Error)
    }

    pub fn id(&self) -> Option<QueueId> {
        match self.handle {
            QueueHandle::Valid(id) => Some(id),
            QueueHandle::Error => None,
        }
    }

    fn validate_handle(&self) -> Result<QueueId, QueueError> {
        self.id().ok_or(QueueError::InvalidQueue)
    }

    /// Submit recorded work units, in array order.
    ///
    /// Command buffers are consumed whether or not validation passes; on any
    /// precondition failure the batch is rejected whole and nothing reaches
    /// the backend. Work staged by earlier `write_buffer` calls flushes ahead
    /// of the command buffers under the same serial.
    pub fn submit(&self, device: &mut Device, command_buffers: Vec<CommandBuffer>) {
        if device.validate_is_alive().is_err() {
            // No backend left to receive the work; documented silent drop.
            return;
        }

        if device.validation_enabled() {
            if let Err(err) = self.validate_submit(device, &command_buffers) {
                device.consume_error(err);
                return;
            }
        }
        debug_assert!(!self.is_error());

        tracing::debug!(
            serial = %device.pending_serial(),
            count = command_buffers.len(),
            "queue submit"
        );
        if let Err(err) = device.dispatch_submit(command_buffers) {
            device.consume_error(err);
            return;
        }

        let scope = device.current_error_scope();
        device.track_scope_until_last_submit(scope);
    }

    /// Record a new target value for `fence` and arrange for device-side
    /// completion to propagate once all currently-submitted work finishes.
    ///
    /// The signaled value is updated immediately on success, so callers can
    /// observe the *request* before the GPU has caught up; true completion is
    /// reported by `Device::tick`.
    pub fn signal(&self, device: &mut Device, fence: &Fence, value: u64) {
        if device.validate_is_alive().is_err() {
            return;
        }

        let fence_id = match self.validate_signal(device, fence, value) {
            Ok(id) => id,
            Err(err) => {
                device.consume_error(err);
                return;
            }
        };
        debug_assert!(!self.is_error());

        tracing::debug!(fence = ?fence_id, value, "fence signal requested");
        device.set_fence_signaled_value(fence_id, value);
        device.track_fence_until_last_submit(fence_id, value);

        // A signal is itself a serialization point; the active error scope
        // outlives it the same way it outlives a submit.
        let scope = device.current_error_scope();
        device.track_scope_until_last_submit(scope);
    }

    /// Create a fence owned by this queue.
    ///
    /// On validation failure this returns [`Fence::error`] rather than
    /// panicking or returning `Option`, so the caller can keep threading the
    /// handle through. An absent descriptor inherits the device's default
    /// descriptor.
    pub fn create_fence(&self, device: &mut Device, descriptor: Option<&FenceDescriptor>) -> Fence {
        if device.validate_is_alive().is_err() {
            return Fence::error();
        }

        let queue = match self.validate_create_fence(descriptor) {
            Ok(queue) => queue,
            Err(err) => {
                device.consume_error(err);
                return Fence::error();
            }
        };

        let descriptor = descriptor
            .copied()
            .unwrap_or_else(|| device.default_fence_descriptor());
        let id = device.register_fence(queue, &descriptor);
        Fence::valid(id, queue)
    }

    /// Write `data` into `buffer` at `offset` without blocking on the GPU.
    ///
    /// The bytes are copied into staging before this returns; the caller may
    /// reuse `data` immediately. The device-side copy is enqueued as pending
    /// queue work and flushes with the next submission (or `Device::flush`).
    /// `offset` and `data.len()` must be multiples of 4; an empty write
    /// validates trivially and enqueues nothing.
    pub fn write_buffer(&self, device: &mut Device, buffer: BufferId, offset: u64, data: &[u8]) {
        if device.validate_is_alive().is_err() {
            return;
        }
        if let Err(err) = self.write_buffer_impl(device, buffer, offset, data) {
            device.consume_error(err);
        }
    }

    /// Typed convenience over [`Self::write_buffer`] for POD slices.
    pub fn write_buffer_slice<T: Pod>(
        &self,
        device: &mut Device,
        buffer: BufferId,
        offset: u64,
        data: &[T],
    ) {
        self.write_buffer(device, buffer, offset, bytemuck::cast_slice(data));
    }

    fn write_buffer_impl(
        &self,
        device: &mut Device,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), QueueError> {
        self.validate_write_buffer(device, buffer, offset, data.len() as u64)?;
        debug_assert!(!self.is_error());

        if data.is_empty() {
            return Ok(());
        }

        let serial = device.pending_serial();
        let handle = device.stage_upload(serial, data)?;
        tracing::trace!(
            buffer = ?buffer,
            offset,
            size = data.len(),
            serial = %serial,
            "queue write staged"
        );
        device.enqueue_op(QueueOp::CopyStagingToBuffer {
            staging: handle.staging,
            staging_offset: handle.offset,
            buffer,
            buffer_offset: offset,
            size: data.len() as u64,
        });
        Ok(())
    }

    // Validation. All of these inspect device state without mutating it;
    // rejection picks out the offending resource and where it appeared.

    fn validate_submit(
        &self,
        device: &Device,
        command_buffers: &[CommandBuffer],
    ) -> Result<(), QueueError> {
        self.validate_handle()?;

        for cb in command_buffers {
            let usage = cb.resource_usage();

            for pass in &usage.per_pass {
                for &buffer in &pass.buffers {
                    validate_buffer_use(device, buffer, UsageScope::PerPass)?;
                }
                for texture_use in &pass.textures {
                    validate_texture_use(
                        device,
                        texture_use.texture,
                        texture_use.usage,
                        UsageScope::PerPass,
                    )?;
                }
            }

            for &buffer in &usage.top_level_buffers {
                validate_buffer_use(device, buffer, UsageScope::TopLevel)?;
            }
            for texture_use in &usage.top_level_textures {
                validate_texture_use(
                    device,
                    texture_use.texture,
                    texture_use.usage,
                    UsageScope::TopLevel,
                )?;
            }
        }

        Ok(())
    }

    fn validate_signal(
        &self,
        device: &Device,
        fence: &Fence,
        value: u64,
    ) -> Result<FenceId, QueueError> {
        let queue = self.validate_handle()?;

        let (fence_id, fence_queue) = fence.parts().ok_or(QueueError::InvalidFence)?;
        if fence_queue != queue {
            return Err(QueueError::FenceWrongQueue);
        }
        let state = device.fence_state(fence_id).ok_or(QueueError::InvalidFence)?;
        debug_assert_eq!(state.queue, queue);

        if value <= state.signaled_value {
            return Err(QueueError::NonIncreasingSignalValue {
                value,
                signaled: state.signaled_value,
            });
        }
        Ok(fence_id)
    }

    fn validate_create_fence(
        &self,
        descriptor: Option<&FenceDescriptor>,
    ) -> Result<QueueId, QueueError> {
        let queue = self.validate_handle()?;
        if let Some(descriptor) = descriptor {
            // Signal values are strictly increasing, so a fence starting at
            // the maximum could never be signaled.
            if descriptor.initial_value == u64::MAX {
                return Err(QueueError::UnsignalableFenceInitialValue(
                    descriptor.initial_value,
                ));
            }
        }
        Ok(queue)
    }

    fn validate_write_buffer(
        &self,
        device: &Device,
        buffer: BufferId,
        offset: u64,
        size: u64,
    ) -> Result<(), QueueError> {
        self.validate_handle()?;
        let state = device.validate_buffer(buffer)?;

        if offset % COPY_ALIGNMENT != 0 {
            return Err(QueueError::UnalignedWriteOffset(offset));
        }
        if size % COPY_ALIGNMENT != 0 {
            return Err(QueueError::UnalignedWriteSize(size));
        }

        let buffer_size = state.size();
        if offset > buffer_size || size > buffer_size - offset {
            return Err(QueueError::WriteOutOfRange {
                offset,
                size,
                buffer_size,
            });
        }

        if !state.usage().contains(BufferUsages::COPY_DST) {
            return Err(QueueError::MissingCopyDstUsage(buffer));
        }

        state
            .validate_can_use_on_queue_now()
            .map_err(|blocker| QueueError::BufferNotUsable {
                buffer,
                scope: UsageScope::QueueWrite,
                blocker,
            })
    }
}

fn validate_buffer_use(
    device: &Device,
    buffer: BufferId,
    scope: UsageScope,
) -> Result<(), QueueError> {
    let state = device.validate_buffer(buffer)?;
    state
        .validate_can_use_on_queue_now()
        .map_err(|blocker| QueueError::BufferNotUsable {
            buffer,
            scope,
            blocker,
        })
}

fn validate_texture_use(
    device: &Device,
    texture: TextureId,
    used: TextureUsages,
    scope: UsageScope,
) -> Result<(), QueueError> {
    let state = device.validate_texture(texture)?;
    state
        .validate_can_use_in_submit_now(used)
        .map_err(|blocker| QueueError::TextureNotUsable {
            texture,
            scope,
            blocker,
        })
}
