//! Deferred completion tracking, keyed by submission serial.
//!
//! Two append-only registries replace callback plumbing: fence signals and
//! error scopes are recorded against the serial that was outstanding when the
//! request was made, and drained in order by a single
//! `advance(completed_serial)` call the device makes on its own cadence.

use std::collections::VecDeque;

use crate::device::SubmissionSerial;
use crate::fence::FenceId;

/// Handle of a deferred error-collection context. Push/pop semantics live
/// elsewhere; the queue only arranges for the active scope to be retired once
/// the work submitted while it was active completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorScopeId(pub u64);

/// A fence value whose device-side completion is now confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceSignal {
    pub fence: FenceId,
    pub value: u64,
}

/// Tracks requested fence values until the GPU work outstanding at request
/// time completes.
///
/// Entries are appended in serial order (serials are monotonic per device), so
/// draining is a prefix pop. Entries deliberately hold only `(fence id,
/// value)`: destroying a fence does not disturb the tracker, and the
/// completion still drains cleanly afterwards.
#[derive(Debug, Default)]
pub struct FenceSignalTracker {
    entries: VecDeque<(SubmissionSerial, FenceSignal)>,
}

impl FenceSignalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, serial: SubmissionSerial, fence: FenceId, value: u64) {
        debug_assert!(self.entries.back().map_or(true, |(s, _)| *s <= serial));
        self.entries.push_back((serial, FenceSignal { fence, value }));
    }

    /// Drain every entry whose serial is now complete, in request order.
    pub fn advance(&mut self, completed: SubmissionSerial) -> Vec<FenceSignal> {
        let mut out = Vec::new();
        while let Some((serial, _)) = self.entries.front() {
            if *serial > completed {
                break;
            }
            let (_, signal) = self.entries.pop_front().unwrap();
            out.push(signal);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tracks error scopes until the work submitted while they were active
/// completes.
#[derive(Debug, Default)]
pub struct ErrorScopeTracker {
    entries: VecDeque<(SubmissionSerial, ErrorScopeId)>,
}

impl ErrorScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, serial: SubmissionSerial, scope: ErrorScopeId) {
        debug_assert!(self.entries.back().map_or(true, |(s, _)| *s <= serial));
        self.entries.push_back((serial, scope));
    }

    /// Drain every scope whose serial is now complete, in registration order.
    pub fn advance(&mut self, completed: SubmissionSerial) -> Vec<ErrorScopeId> {
        let mut out = Vec::new();
        while let Some((serial, _)) = self.entries.front() {
            if *serial > completed {
                break;
            }
            let (_, scope) = self.entries.pop_front().unwrap();
            out.push(scope);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
