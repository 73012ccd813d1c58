//! Serial-tagged staging memory for host→device uploads.
//!
//! `write_buffer` needs a host-writable region it can fill synchronously while
//! the device-side copy out of that region happens later, whenever the tagged
//! submission serial is flushed and completes. The pool hands out sub-ranges of
//! fixed-size chunks and reclaims whole chunks once the device reports their
//! serial complete.

use crate::device::SubmissionSerial;

/// Required alignment (bytes) for queue write offsets/sizes and staging copies.
pub const COPY_ALIGNMENT: u64 = 4;

/// Upper bound for a single staging allocation. Requests above this fail
/// cleanly instead of trying to grab an absurd host allocation.
pub const MAX_STAGING_ALLOCATION: u64 = 1 << 30;

const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024;

/// Round `value` up to the nearest multiple of `alignment`.
///
/// `alignment` must be > 0.
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment > 0);

    let add = alignment - 1;
    match value.checked_add(add) {
        Some(v) => v / alignment * alignment,
        None => u64::MAX / alignment * alignment,
    }
}

/// Identifies one staging chunk (the device-side source of an upload copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StagingId(pub u32);

/// Where one upload landed: which staging chunk, and at what byte offset.
///
/// Valid only for the duration of the `write_buffer` call that produced it;
/// the backing memory belongs to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadHandle {
    pub staging: StagingId,
    pub offset: u64,
}

#[derive(Debug)]
struct StagingChunk {
    id: StagingId,
    serial: SubmissionSerial,
    bytes: Vec<u8>,
    cursor: u64,
}

impl StagingChunk {
    fn remaining(&self) -> u64 {
        self.bytes.len() as u64 - self.cursor
    }
}

/// Pool of staging chunks, each tagged with the submission serial whose
/// completion releases it.
#[derive(Debug, Default)]
pub struct StagingPool {
    chunks: Vec<StagingChunk>,
    next_id: u32,
}

impl StagingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `size` bytes tagged with `serial`.
    ///
    /// Returns the handle plus the host-writable slice for exactly `size`
    /// bytes. The cursor advances by the copy-aligned size, so consecutive
    /// allocations always start on a [`COPY_ALIGNMENT`] boundary.
    ///
    /// Returns `None` when `size` exceeds [`MAX_STAGING_ALLOCATION`].
    pub fn allocate(
        &mut self,
        size: u64,
        serial: SubmissionSerial,
    ) -> Option<(UploadHandle, &mut [u8])> {
        if size > MAX_STAGING_ALLOCATION {
            return None;
        }
        let padded = align_up(size, COPY_ALIGNMENT);

        let idx = match self
            .chunks
            .iter()
            .position(|c| c.serial == serial && c.remaining() >= padded)
        {
            Some(idx) => idx,
            None => {
                let capacity = padded.max(DEFAULT_CHUNK_SIZE);
                let id = StagingId(self.next_id);
                self.next_id += 1;
                self.chunks.push(StagingChunk {
                    id,
                    serial,
                    bytes: vec![0u8; capacity as usize],
                    cursor: 0,
                });
                self.chunks.len() - 1
            }
        };

        let chunk = &mut self.chunks[idx];
        let offset = chunk.cursor;
        chunk.cursor += padded;

        let handle = UploadHandle {
            staging: chunk.id,
            offset,
        };
        let slice = &mut chunk.bytes[offset as usize..(offset + size) as usize];
        Some((handle, slice))
    }

    /// Read back an allocated range. Used by backends to source staging copies.
    ///
    /// Returns `None` for unknown chunks or ranges extending past the
    /// allocated portion of a chunk.
    pub fn read(&self, staging: StagingId, offset: u64, size: u64) -> Option<&[u8]> {
        let chunk = self.chunks.iter().find(|c| c.id == staging)?;
        let end = offset.checked_add(size)?;
        if end > chunk.cursor {
            return None;
        }
        chunk.bytes.get(offset as usize..end as usize)
    }

    /// Release every chunk whose tagged serial is now complete.
    pub fn reclaim(&mut self, completed: SubmissionSerial) {
        self.chunks.retain(|c| c.serial > completed);
    }

    /// Number of live (not yet reclaimed) chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
