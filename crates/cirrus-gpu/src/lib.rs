//! `cirrus-gpu` is the command-submission and host/device-synchronization core
//! of a WebGPU-style runtime.
//!
//! The crate accepts finished, pre-recorded units of GPU work, validates that
//! every resource they touch is safe to use at submission time, hands the work
//! to a [`backend::QueueBackend`] in caller order, and tracks when that work
//! has actually completed on the device, together with the host-visible side
//! effects queued alongside it (fence signals, error scopes, staging
//! reclamation).
//!
//! The main types:
//! - [`Device`]: object registries, submission serials, the error channel,
//!   and the flush/tick completion cadence.
//! - [`Queue`]: `submit` / `signal` / `create_fence` / `write_buffer`.
//! - [`Fence`]: host-observable monotonic completion counter.
//! - [`StagingPool`]: serial-tagged staging memory backing `write_buffer`.
//!
//! Calls are expected from a single logical owner thread per device; the core
//! performs no internal locking. GPU execution is asynchronous relative to
//! every call: completion is observed by periodically calling
//! [`Device::tick`] and draining the returned [`DeviceEvent`]s.

#![deny(unsafe_code)]

pub mod backend;

mod buffer;
mod command_buffer;
mod device;
mod error;
mod fence;
mod queue;
mod staging;
mod texture;
mod tracker;

pub use backend::{QueueBackend, QueueOp, SoftwareBackend};
pub use buffer::{Buffer, BufferDescriptor, BufferId, BufferMapState, BufferUseBlocker, BufferUsages};
pub use command_buffer::{CommandBuffer, CommandBufferResourceUsage, PassResourceUsage, TextureUse};
pub use device::{Device, DeviceDescriptor, DeviceEvent, SubmissionSerial};
pub use error::{DeviceError, DeviceErrorKind, QueueError, UsageScope};
pub use fence::{Fence, FenceDescriptor, FenceId};
pub use queue::{Queue, QueueId};
pub use staging::{StagingId, StagingPool, UploadHandle, COPY_ALIGNMENT, MAX_STAGING_ALLOCATION};
pub use texture::{Texture, TextureDescriptor, TextureId, TextureUseBlocker, TextureUsages};
pub use tracker::{ErrorScopeId, ErrorScopeTracker, FenceSignal, FenceSignalTracker};
