//! Buffer entity: size, declared usage, map state, and the "usable on the
//! queue now" check consulted at submission time.

use thiserror::Error;

bitflags::bitflags! {
    /// Declared capabilities of a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsages: u32 {
        const MAP_READ = 1 << 0;
        const MAP_WRITE = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const UNIFORM = 1 << 6;
        const STORAGE = 1 << 7;
    }
}

/// Non-owning buffer handle, resolved through the device registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Host mapping state. A buffer that is mapped (or waiting on a map callback)
/// must not be touched by device-side work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferMapState {
    #[default]
    Unmapped,
    /// A map request was made; its callback has not fired yet.
    MapPending,
    /// Host-mapped for writing.
    Mapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub size: u64,
    pub usage: BufferUsages,
}

/// Why a buffer cannot be used by the queue right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferUseBlocker {
    #[error("buffer is destroyed")]
    Destroyed,
    #[error("buffer is host-mapped")]
    Mapped,
    #[error("buffer has a pending map request")]
    MapPending,
}

#[derive(Debug)]
pub struct Buffer {
    size: u64,
    usage: BufferUsages,
    map_state: BufferMapState,
    destroyed: bool,
}

impl Buffer {
    pub(crate) fn new(desc: &BufferDescriptor) -> Self {
        Self {
            size: desc.size,
            usage: desc.usage,
            map_state: BufferMapState::Unmapped,
            destroyed: false,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsages {
        self.usage
    }

    pub fn map_state(&self) -> BufferMapState {
        self.map_state
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn set_map_state(&mut self, state: BufferMapState) {
        self.map_state = state;
    }

    pub(crate) fn destroy(&mut self) {
        self.destroyed = true;
    }

    /// The submission-time check: the queue may only touch buffers that are
    /// not destroyed, not host-mapped, and not awaiting a map callback.
    pub(crate) fn validate_can_use_on_queue_now(&self) -> Result<(), BufferUseBlocker> {
        if self.destroyed {
            return Err(BufferUseBlocker::Destroyed);
        }
        match self.map_state {
            BufferMapState::Unmapped => Ok(()),
            BufferMapState::Mapped => Err(BufferUseBlocker::Mapped),
            BufferMapState::MapPending => Err(BufferUseBlocker::MapPending),
        }
    }
}
