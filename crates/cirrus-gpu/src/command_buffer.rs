//! Recorded work units and their resource usage summaries.
//!
//! Recording itself happens elsewhere; by the time a command buffer reaches
//! the queue it is immutable and carries only what submission validation
//! needs: which buffers and textures it touches, partitioned into per-pass and
//! top-level usage. `Queue::submit` consumes command buffers by value, so a
//! work unit cannot be submitted twice.

use crate::buffer::BufferId;
use crate::texture::{TextureId, TextureUsages};

/// One texture reference together with how the work unit uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUse {
    pub texture: TextureId,
    pub usage: TextureUsages,
}

/// Resources touched inside one bounded render/compute pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassResourceUsage {
    pub buffers: Vec<BufferId>,
    pub textures: Vec<TextureUse>,
}

/// Complete usage summary of a recorded work unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBufferResourceUsage {
    pub per_pass: Vec<PassResourceUsage>,
    /// Buffers touched outside any pass (e.g. direct copies).
    pub top_level_buffers: Vec<BufferId>,
    /// Textures touched outside any pass.
    pub top_level_textures: Vec<TextureUse>,
}

/// An immutable, pre-recorded batch of GPU operations.
#[derive(Debug)]
pub struct CommandBuffer {
    label: Option<String>,
    usage: CommandBufferResourceUsage,
}

impl CommandBuffer {
    pub fn new(label: Option<&str>, usage: CommandBufferResourceUsage) -> Self {
        Self {
            label: label.map(str::to_owned),
            usage,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn resource_usage(&self) -> &CommandBufferResourceUsage {
        &self.usage
    }
}
