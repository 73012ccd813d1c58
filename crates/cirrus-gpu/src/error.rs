//! Error taxonomy.
//!
//! Internally every fallible queue operation propagates [`QueueError`] with
//! `?`. At the public boundary nothing is returned to the caller: failures are
//! converted into a [`DeviceError`] on the device's error channel, and a lost
//! device drops calls silently.

use std::fmt;

use thiserror::Error;

use crate::buffer::{BufferId, BufferUseBlocker};
use crate::texture::{TextureId, TextureUseBlocker};

/// Where in a submission the offending resource appeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageScope {
    /// Referenced inside a bounded render/compute pass.
    PerPass,
    /// Referenced outside any pass (direct copies and the like).
    TopLevel,
    /// Referenced by a queue write.
    QueueWrite,
}

impl fmt::Display for UsageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageScope::PerPass => write!(f, "per-pass usage"),
            UsageScope::TopLevel => write!(f, "top-level usage"),
            UsageScope::QueueWrite => write!(f, "queue write"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("device lost")]
    DeviceLost,

    #[error("queue handle is invalid")]
    InvalidQueue,
    #[error("fence handle is invalid")]
    InvalidFence,
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("fence must be signaled on the queue that created it")]
    FenceWrongQueue,
    #[error("signal value {value} is not greater than the fence's signaled value {signaled}")]
    NonIncreasingSignalValue { value: u64, signaled: u64 },
    #[error("fence initial value {0} leaves no signalable values")]
    UnsignalableFenceInitialValue(u64),

    #[error("write offset {0} is not a multiple of 4")]
    UnalignedWriteOffset(u64),
    #[error("write size {0} is not a multiple of 4")]
    UnalignedWriteSize(u64),
    #[error("write out of bounds: offset {offset} + size {size} exceeds buffer size {buffer_size}")]
    WriteOutOfRange {
        offset: u64,
        size: u64,
        buffer_size: u64,
    },
    #[error("buffer {0:?} is missing the COPY_DST usage")]
    MissingCopyDstUsage(BufferId),
    #[error("staging allocation of {size} bytes failed")]
    StagingExhausted { size: u64 },

    #[error("buffer {buffer:?} ({scope}): {blocker}")]
    BufferNotUsable {
        buffer: BufferId,
        scope: UsageScope,
        blocker: BufferUseBlocker,
    },
    #[error("texture {texture:?} ({scope}): {blocker}")]
    TextureNotUsable {
        texture: TextureId,
        scope: UsageScope,
        blocker: TextureUseBlocker,
    },

    #[error("backend dispatch failed: {0}")]
    Backend(String),
}

impl QueueError {
    pub fn kind(&self) -> DeviceErrorKind {
        match self {
            QueueError::BufferNotUsable { .. } | QueueError::TextureNotUsable { .. } => {
                DeviceErrorKind::ResourceState
            }
            QueueError::Backend(_) => DeviceErrorKind::Backend,
            _ => DeviceErrorKind::Validation,
        }
    }
}

/// Category of an error surfaced on the device error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// Malformed call; the device remains usable.
    Validation,
    /// A referenced resource is not currently usable; the device remains
    /// usable.
    ResourceState,
    /// Backend dispatch failure after successful validation.
    Backend,
}

/// An error recorded on the device, observable via `Device::pop_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

impl From<QueueError> for DeviceError {
    fn from(err: QueueError) -> Self {
        DeviceError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
