//! Backend boundary.
//!
//! The queue core is backend-agnostic: it validates and orders work, then
//! hands each flushed submission to a [`QueueBackend`]. In production that is
//! a native-API encoder; for tests we provide [`SoftwareBackend`], a
//! deterministic in-memory implementation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::buffer::BufferId;
use crate::device::SubmissionSerial;
use crate::staging::{StagingId, StagingPool};

/// One element of the serialized command stream handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOp {
    /// Copy bytes out of a staging chunk into a destination buffer.
    CopyStagingToBuffer {
        staging: StagingId,
        staging_offset: u64,
        buffer: BufferId,
        buffer_offset: u64,
        size: u64,
    },
    /// Execute one recorded work unit.
    ExecuteCommandBuffer { label: Option<String> },
}

/// Boundary between the queue core and native command encoding.
///
/// Implementations receive each flushed submission as a serial plus an ordered
/// op list; ops must be observed in exactly that order. If `submit` reports
/// failure, nothing from that submission may be retained: the core surfaces
/// the failure on the device error channel and the stream must look as if the
/// submission never happened.
pub trait QueueBackend {
    /// Drop all backend state (resources, outstanding work).
    fn reset(&mut self);

    /// Dispatch one submission. `staging` resolves the source ranges of
    /// `CopyStagingToBuffer` ops.
    ///
    /// Return `Err` only for fatal dispatch failures.
    fn submit(
        &mut self,
        serial: SubmissionSerial,
        staging: &StagingPool,
        ops: &[QueueOp],
    ) -> Result<(), String>;

    /// Device read-back path: the bytes of `buffer` at `[offset, offset +
    /// size)` as the backend currently sees them, or `None` if the backend
    /// cannot service reads for that buffer.
    fn read_buffer(&self, buffer: BufferId, offset: u64, size: u64) -> Option<Vec<u8>>;
}

#[derive(Debug, Default)]
struct SoftwareState {
    /// Destination buffer contents, grown on demand; unwritten bytes read as
    /// zero.
    buffers: HashMap<BufferId, Vec<u8>>,
    submissions: Vec<(SubmissionSerial, Vec<QueueOp>)>,
}

/// Deterministic in-memory backend.
///
/// Executes staging copies against plain byte vectors and logs every
/// submission. Clones share state, so a test can keep an inspection handle
/// after the device takes ownership of the boxed backend.
#[derive(Debug, Clone, Default)]
pub struct SoftwareBackend {
    state: Rc<RefCell<SoftwareState>>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every submission dispatched so far, in order.
    pub fn submissions(&self) -> Vec<(SubmissionSerial, Vec<QueueOp>)> {
        self.state.borrow().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.borrow().submissions.len()
    }

    /// Raw contents of a destination buffer, if any copy has targeted it.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }
}

impl QueueBackend for SoftwareBackend {
    fn reset(&mut self) {
        *self.state.borrow_mut() = SoftwareState::default();
    }

    fn submit(
        &mut self,
        serial: SubmissionSerial,
        staging: &StagingPool,
        ops: &[QueueOp],
    ) -> Result<(), String> {
        // Resolve every staging source before touching destination state, so a
        // failed submission leaves nothing behind.
        let mut copies = Vec::new();
        for op in ops {
            if let QueueOp::CopyStagingToBuffer {
                staging: src,
                staging_offset,
                buffer,
                buffer_offset,
                size,
            } = op
            {
                let bytes = staging.read(*src, *staging_offset, *size).ok_or_else(|| {
                    format!("staging range {src:?}+{staging_offset}..{size} is not allocated")
                })?;
                copies.push((*buffer, *buffer_offset, bytes.to_vec()));
            }
        }

        let mut state = self.state.borrow_mut();
        for (buffer, buffer_offset, bytes) in copies {
            let dst = state.buffers.entry(buffer).or_default();
            let end = buffer_offset as usize + bytes.len();
            if dst.len() < end {
                dst.resize(end, 0);
            }
            dst[buffer_offset as usize..end].copy_from_slice(&bytes);
        }
        state.submissions.push((serial, ops.to_vec()));
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferId, offset: u64, size: u64) -> Option<Vec<u8>> {
        let state = self.state.borrow();
        let mut out = vec![0u8; size as usize];
        if let Some(contents) = state.buffers.get(&buffer) {
            let start = (offset as usize).min(contents.len());
            let end = ((offset + size) as usize).min(contents.len());
            out[..end - start].copy_from_slice(&contents[start..end]);
        }
        Some(out)
    }
}
