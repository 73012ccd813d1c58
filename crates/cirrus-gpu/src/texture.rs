//! Texture entity: declared usage plus the "usable in submit now" check.

use thiserror::Error;

bitflags::bitflags! {
    /// Declared capabilities of a texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsages: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// Non-owning texture handle, resolved through the device registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub usage: TextureUsages,
}

/// Why a texture cannot be used in a submission right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TextureUseBlocker {
    #[error("texture is destroyed")]
    Destroyed,
    #[error("texture usage {declared:?} does not allow {used:?}")]
    UsageMismatch {
        declared: TextureUsages,
        used: TextureUsages,
    },
}

#[derive(Debug)]
pub struct Texture {
    usage: TextureUsages,
    destroyed: bool,
}

impl Texture {
    pub(crate) fn new(desc: &TextureDescriptor) -> Self {
        Self {
            usage: desc.usage,
            destroyed: false,
        }
    }

    pub fn usage(&self) -> TextureUsages {
        self.usage
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn destroy(&mut self) {
        self.destroyed = true;
    }

    /// The submission-time check: not destroyed, and every usage the work unit
    /// exercises must be covered by the declared usage flags.
    pub(crate) fn validate_can_use_in_submit_now(
        &self,
        used: TextureUsages,
    ) -> Result<(), TextureUseBlocker> {
        if self.destroyed {
            return Err(TextureUseBlocker::Destroyed);
        }
        if !self.usage.contains(used) {
            return Err(TextureUseBlocker::UsageMismatch {
                declared: self.usage,
                used,
            });
        }
        Ok(())
    }
}
